//! Byte-level persistence for the Obscura image service.
//!
//! Objects are written as ordered chunk sequences terminated by a single
//! empty, final chunk, and read back the same way. The write half keeps a map
//! of open handles that is deliberately not synchronized; callers are
//! expected to drive all writes from one task.

pub mod chunk;
pub mod file;
pub mod traits;

pub use chunk::Chunk;
pub use file::FileStore;
pub use traits::{ObjectReader, ObjectSource, ObjectStore, StorageError, StorageResult};
