// @generated manually — deletion requests and bulk operations are the only
// tables this crate owns (spec §3.3); everything else lives behind the host's
// CredentialStore.

diesel::table! {
    deletion_requests (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 255]
        realm -> Varchar,
        #[max_length = 255]
        user_id -> Varchar,
        #[max_length = 20]
        state -> Varchar,
        #[max_length = 20]
        priority -> Varchar,
        reason -> Nullable<Text>,
        #[max_length = 255]
        requested_by -> Varchar,
        #[max_length = 255]
        decided_by -> Nullable<Varchar>,
        decision_note -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    bulk_operations (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 255]
        realm -> Varchar,
        #[max_length = 20]
        kind -> Varchar,
        #[max_length = 20]
        state -> Varchar,
        #[max_length = 255]
        submitted_by -> Varchar,
        total -> Int4,
        processed -> Int4,
        succeeded -> Int4,
        failed -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    bulk_operation_errors (id) {
        #[max_length = 26]
        id -> Bpchar,
        #[max_length = 26]
        bulk_operation_id -> Bpchar,
        item_index -> Int4,
        #[max_length = 255]
        user_id -> Varchar,
        reason -> Text,
        retryable -> Bool,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(bulk_operation_errors -> bulk_operations (bulk_operation_id));

diesel::allow_tables_to_appear_in_same_query!(
    deletion_requests,
    bulk_operations,
    bulk_operation_errors,
);
