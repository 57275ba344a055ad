use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use kvs_error::Result;
use kvs_types::KvsValue;

/// Identity of a logical store within a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot address. `0` is the live (most recently flushed) state, `1..=N`
/// are rotated history, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(pub usize);

impl SnapshotId {
    pub const LIVE: Self = Self(0);

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a backend needs to open one handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    pub instance_id: InstanceId,
    /// `Some(true)`: defaults must exist. `Some(false)`: defaults are not
    /// loaded. `None`: loaded when present.
    pub need_defaults: Option<bool>,
    /// `Some(true)`: a previously flushed store must exist.
    pub need_kvs: Option<bool>,
    /// Storage directory; the current working directory when unset.
    pub dir: Option<PathBuf>,
    /// Rotation ceiling; the backend's default when unset.
    pub snapshot_max_count: Option<usize>,
}

impl OpenOptions {
    #[must_use]
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            need_defaults: None,
            need_kvs: None,
            dir: None,
            snapshot_max_count: None,
        }
    }

    #[must_use]
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn snapshot_max_count(mut self, max: usize) -> Self {
        self.snapshot_max_count = Some(max);
        self
    }

    #[must_use]
    pub fn need_defaults(mut self, need: bool) -> Self {
        self.need_defaults = Some(need);
        self
    }

    #[must_use]
    pub fn need_kvs(mut self, need: bool) -> Self {
        self.need_kvs = Some(need);
        self
    }
}

/// A KVS engine that can open handles.
///
/// Handles opened for the same `(instance_id, dir)` observe each other's
/// flushed state; unflushed writes stay private to the handle that made them.
pub trait KvsBackend: Send + Sync {
    /// Short backend name for logging.
    fn name(&self) -> &'static str;

    /// Open a handle. Fails with `KvsOperation` if the engine cannot
    /// initialize (e.g. directory missing and not creatable).
    fn open(&self, options: &OpenOptions) -> Result<Box<dyn KvsHandle>>;
}

/// An open store.
///
/// All operations are synchronous. Dropping the handle releases it without
/// flushing.
pub trait KvsHandle {
    fn instance_id(&self) -> InstanceId;

    /// Store `value` under `key`, overwriting any previous value.
    ///
    /// Fails with `KeyRejected` / `ValueRejected` when the key or value
    /// breaks the acceptance rules.
    fn set(&mut self, key: &str, value: KvsValue) -> Result<()>;

    /// Explicit value for `key`, falling back to its default.
    fn get(&self, key: &str) -> Result<KvsValue>;

    /// Default value for `key`, ignoring any explicit value.
    fn get_default(&self, key: &str) -> Result<KvsValue>;

    /// True iff `key` has no explicit value and a default exists.
    fn has_default(&self, key: &str) -> Result<bool>;

    /// Remove the explicit value for `key`.
    fn remove_key(&mut self, key: &str) -> Result<()>;

    /// Drop every explicit value.
    fn reset(&mut self) -> Result<()>;

    /// Drop the explicit value for `key`; the key must have a default.
    fn reset_key(&mut self, key: &str) -> Result<()>;

    /// Keys holding an explicit value.
    fn all_keys(&self) -> Result<BTreeSet<String>>;

    /// Durably commit pending writes and rotate snapshots.
    fn flush(&mut self) -> Result<()>;

    /// Number of historical snapshots currently retained.
    fn snapshot_count(&self) -> Result<usize>;

    /// Rotation ceiling.
    fn snapshot_max_count(&self) -> usize;

    /// Replace live state with historical snapshot `id` (`1..=count`).
    fn restore(&mut self, id: SnapshotId) -> Result<()>;

    /// Data artifact backing snapshot `id`.
    fn kvs_filename(&self, id: SnapshotId) -> Result<PathBuf>;

    /// Hash artifact backing snapshot `id`.
    fn hash_filename(&self, id: SnapshotId) -> Result<PathBuf>;

    /// Whether the hash artifact of snapshot `id` matches its data artifact.
    fn verify_snapshot(&self, id: SnapshotId) -> Result<bool>;
}
