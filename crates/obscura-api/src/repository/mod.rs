//! Repository actors.
//!
//! Each repository is a single consumer task plus a cloneable handle. All
//! observable mutations of a repository's state happen in the order its
//! consumer processes commands, which is what lets the caches and the
//! open-handle map live without locks.

pub mod data;
pub mod enrichment;
pub mod objects;

pub use data::DataRepository;
pub use enrichment::EnrichmentWorker;
pub use objects::ObjectsRepository;
