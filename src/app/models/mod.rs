pub mod diesel_ulid;
pub mod credential;
pub mod deletion_request;
pub mod bulk_operation;

pub use diesel_ulid::DieselUlid;
pub use credential::*;
pub use deletion_request::{DeletionRequest, DeletionRequestState, DeletionPriority, NewDeletionRequest};
pub use bulk_operation::{
    BulkOperation, BulkOperationKind, BulkOperationState, NewBulkOperation,
    BulkOperationError, NewBulkOperationError,
};
