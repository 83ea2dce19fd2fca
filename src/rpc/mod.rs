pub mod circuit_breaker;
pub mod client;
pub mod pool;
pub mod retry;
pub mod signer;
pub mod transport;
pub mod types;

pub use client::{BwsClient, EnrollOutcome, ServiceHealth, TemplateDeleteOutcome, VerifyOutcome};
pub use transport::{BwsTransport, HttpBwsTransport, TransportError};
