use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{GenerationRecord, InputAssociation};

/// Read access to the generation request store and its input-URL index.
///
/// A `RecordStore` fronts two backing systems: a key/value store holding one
/// JSON record per request id, and a relational index mapping input image
/// URLs to the requests made against them. The admin surface only reads;
/// nothing here mutates either system.
///
/// ## Ordering
///
/// `list_distinct_input_associations` and `request_ids_for_input` return rows
/// in index order, oldest first. Callers that want "most recent first"
/// reverse the result themselves.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single store can be
/// shared behind an `Arc` by the chain cache and concurrent fetch tasks.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Every distinct (input url, request id) row of the index.
    async fn list_distinct_input_associations(
        &self,
    ) -> Result<Vec<InputAssociation>, StorageError>;

    /// Number of distinct request ids in the index.
    ///
    /// Cheap by contract: the chain cache calls this on every read.
    async fn count_distinct_requests(&self) -> Result<u64, StorageError>;

    /// Fetch one full record.
    ///
    /// Returns `Err(StorageError::RecordNotFound)` if nothing is stored under
    /// `request_id`, and `Err(StorageError::MalformedRecord)` if the stored
    /// value does not parse.
    async fn get_record(&self, request_id: &str) -> Result<GenerationRecord, StorageError>;

    /// Request ids made against one input URL, in index order.
    async fn request_ids_for_input(&self, input_url: &str) -> Result<Vec<String>, StorageError>;
}
