pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{InMemoryRecordStore, RecordSnapshot};
pub use record::{GenerationRecord, ImageResult, InputAssociation, RecordInput, RecordResults};
pub use traits::RecordStore;
