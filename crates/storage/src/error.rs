/// All errors that can be returned by a RecordStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No record is stored under the given request id.
    #[error("record not found: {request_id}")]
    RecordNotFound { request_id: String },

    /// A value is stored under the request id but does not parse as a
    /// generation record.
    #[error("malformed record {request_id}: {message}")]
    MalformedRecord { request_id: String, message: String },

    /// The store (or the index in front of it) cannot be reached right now.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True for errors that concern a single record rather than the store as
    /// a whole. A reconstruction pass skips these and carries on.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            StorageError::RecordNotFound { .. } | StorageError::MalformedRecord { .. }
        )
    }
}
