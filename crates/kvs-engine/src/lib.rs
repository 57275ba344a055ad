//! KVS boundary contract and a file-backed reference engine.
//!
//! The harness only talks to [`KvsBackend`] / [`KvsHandle`]; [`FileBackend`]
//! is the engine the `kvs-scenarios` binary ships with.

pub mod file;
pub mod traits;

pub use file::{DEFAULT_SNAPSHOT_MAX_COUNT, FileBackend, FileKvs};
pub use traits::{InstanceId, KvsBackend, KvsHandle, OpenOptions, SnapshotId};
