//! Persistent job metadata store (SQLite via sqlx).
//!
//! One row per content source, keyed by `QueuedOperation::location_key()`,
//! holding the serialized operation and its lifecycle state. A crashed
//! process can find its jobs again because the key never depends on the job id.

mod db;
mod ops;

pub use db::OperationStore;
pub(crate) use db::unix_timestamp;
pub use ops::StoredOperation;

#[cfg(test)]
pub(crate) use db::open_memory;
