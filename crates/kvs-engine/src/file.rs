//! File-backed reference engine.
//!
//! Layout inside the storage directory, per instance `N`:
//!
//! ```text
//! kvs_N_default.json      tagged defaults (optional, read-only)
//! kvs_N_0.json / .hash    live state as of the last flush
//! kvs_N_1.json / .hash    state live before the last flush
//! ...
//! kvs_N_M.json / .hash    oldest retained snapshot
//! ```
//!
//! A flush with pending writes shifts `i -> i+1` (dropping `M`), moves `0`
//! to `1` (an empty store if `0` never existed) and writes the new `0`.
//! The first flush therefore yields one snapshot. Hash files carry the
//! lowercase hex SHA-256 of the JSON bytes.
//!
//! No fsync, no atomic rename, no cross-process locking.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use kvs_error::{KvsError, Result};
use kvs_types::{
    KvsMap, KvsValue, decode_tagged_map, encode_tagged_map, key_violation, value_violation,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::traits::{InstanceId, KvsBackend, KvsHandle, OpenOptions, SnapshotId};

/// Rotation ceiling when the caller does not configure one.
pub const DEFAULT_SNAPSHOT_MAX_COUNT: usize = 3;

/// Backend opening [`FileKvs`] handles.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBackend;

impl KvsBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn open(&self, options: &OpenOptions) -> Result<Box<dyn KvsHandle>> {
        Ok(Box::new(FileKvs::open(options)?))
    }
}

/// One open store over a directory.
#[derive(Debug)]
pub struct FileKvs {
    instance_id: InstanceId,
    dir: PathBuf,
    max_count: usize,
    live: KvsMap,
    defaults: KvsMap,
    dirty: bool,
}

impl FileKvs {
    pub fn open(options: &OpenOptions) -> Result<Self> {
        let dir = options.dir.clone().unwrap_or_else(|| PathBuf::from("."));
        if !dir.is_dir() {
            fs::create_dir_all(&dir).map_err(|err| {
                KvsError::operation(format!(
                    "cannot create storage directory '{}': {err}",
                    dir.display()
                ))
            })?;
        }

        let instance_id = options.instance_id;
        let max_count = options
            .snapshot_max_count
            .unwrap_or(DEFAULT_SNAPSHOT_MAX_COUNT);

        let defaults_path = defaults_path(&dir, instance_id);
        let defaults = match options.need_defaults {
            Some(false) => KvsMap::new(),
            need => {
                if defaults_path.is_file() {
                    read_map(&defaults_path)?
                } else if need == Some(true) {
                    return Err(KvsError::operation(format!(
                        "defaults required but '{}' is missing",
                        defaults_path.display()
                    )));
                } else {
                    KvsMap::new()
                }
            }
        };

        let live_path = kvs_path(&dir, instance_id, SnapshotId::LIVE);
        let live = if live_path.is_file() {
            let hash_path = hash_path(&dir, instance_id, SnapshotId::LIVE);
            if hash_path.is_file() && !artifact_matches(&live_path, &hash_path)? {
                return Err(KvsError::operation(format!(
                    "hash mismatch for '{}'",
                    live_path.display()
                )));
            }
            read_map(&live_path)?
        } else if options.need_kvs == Some(true) {
            return Err(KvsError::operation(format!(
                "existing store required but '{}' is missing",
                live_path.display()
            )));
        } else {
            KvsMap::new()
        };

        debug!(
            instance_id = instance_id.0,
            dir = %dir.display(),
            max_count,
            keys = live.len(),
            defaults = defaults.len(),
            "kvs opened"
        );

        Ok(Self {
            instance_id,
            dir,
            max_count,
            live,
            defaults,
            dirty: false,
        })
    }

    fn snapshot_exists(&self, id: SnapshotId) -> bool {
        kvs_path(&self.dir, self.instance_id, id).is_file()
    }

    fn artifact(&self, id: SnapshotId, path: PathBuf) -> Result<PathBuf> {
        let count = self.snapshot_count()?;
        if id.get() > count || !path.is_file() {
            return Err(KvsError::FileNotFound { path });
        }
        Ok(path)
    }

    fn rotate(&self) -> Result<()> {
        let (dir, inst) = (&self.dir, self.instance_id);
        if self.max_count == 0 {
            return Ok(());
        }
        // Work is bounded by the retained chain, not by the ceiling.
        let count = self.snapshot_count()?;
        if count == self.max_count {
            remove_if_present(&kvs_path(dir, inst, SnapshotId(count)))?;
            remove_if_present(&hash_path(dir, inst, SnapshotId(count)))?;
        }
        for idx in (1..=count.min(self.max_count - 1)).rev() {
            let (from, to) = (SnapshotId(idx), SnapshotId(idx + 1));
            fs::rename(kvs_path(dir, inst, from), kvs_path(dir, inst, to))?;
            rename_if_present(&hash_path(dir, inst, from), &hash_path(dir, inst, to))?;
        }
        let first = SnapshotId(1);
        if self.snapshot_exists(SnapshotId::LIVE) {
            fs::rename(
                kvs_path(dir, inst, SnapshotId::LIVE),
                kvs_path(dir, inst, first),
            )?;
            rename_if_present(
                &hash_path(dir, inst, SnapshotId::LIVE),
                &hash_path(dir, inst, first),
            )?;
        } else {
            write_map(dir, inst, first, &KvsMap::new())?;
        }
        Ok(())
    }
}

impl KvsHandle for FileKvs {
    fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    fn set(&mut self, key: &str, value: KvsValue) -> Result<()> {
        if key_violation(key).is_some() {
            return Err(KvsError::KeyRejected {
                key: key.to_owned(),
            });
        }
        if let Some(violation) = value_violation(&value) {
            return Err(KvsError::ValueRejected {
                key: key.to_owned(),
                reason: violation.to_string(),
            });
        }
        self.live.insert(key.to_owned(), value);
        self.dirty = true;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<KvsValue> {
        self.live
            .get(key)
            .or_else(|| self.defaults.get(key))
            .cloned()
            .ok_or_else(|| KvsError::KeyNotFound {
                key: key.to_owned(),
            })
    }

    fn get_default(&self, key: &str) -> Result<KvsValue> {
        self.defaults
            .get(key)
            .cloned()
            .ok_or_else(|| KvsError::KeyNotFound {
                key: key.to_owned(),
            })
    }

    fn has_default(&self, key: &str) -> Result<bool> {
        Ok(!self.live.contains_key(key) && self.defaults.contains_key(key))
    }

    fn remove_key(&mut self, key: &str) -> Result<()> {
        if self.live.remove(key).is_none() {
            return Err(KvsError::KeyNotFound {
                key: key.to_owned(),
            });
        }
        self.dirty = true;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        if !self.live.is_empty() {
            self.live.clear();
            self.dirty = true;
        }
        Ok(())
    }

    fn reset_key(&mut self, key: &str) -> Result<()> {
        if !self.defaults.contains_key(key) {
            return Err(KvsError::KeyNotFound {
                key: key.to_owned(),
            });
        }
        if self.live.remove(key).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    fn all_keys(&self) -> Result<BTreeSet<String>> {
        Ok(self.live.keys().cloned().collect())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            debug!(instance_id = self.instance_id.0, "flush skipped, nothing pending");
            return Ok(());
        }
        self.rotate()?;
        write_map(&self.dir, self.instance_id, SnapshotId::LIVE, &self.live)?;
        self.dirty = false;
        debug!(
            instance_id = self.instance_id.0,
            keys = self.live.len(),
            "kvs flushed"
        );
        Ok(())
    }

    fn snapshot_count(&self) -> Result<usize> {
        Ok((1..=self.max_count)
            .take_while(|idx| self.snapshot_exists(SnapshotId(*idx)))
            .count())
    }

    fn snapshot_max_count(&self) -> usize {
        self.max_count
    }

    fn restore(&mut self, id: SnapshotId) -> Result<()> {
        let count = self.snapshot_count()?;
        if id == SnapshotId::LIVE || id.get() > count {
            return Err(KvsError::InvalidSnapshotId { id: id.get() });
        }
        let path = kvs_path(&self.dir, self.instance_id, id);
        let hash = hash_path(&self.dir, self.instance_id, id);
        if hash.is_file() && !artifact_matches(&path, &hash)? {
            warn!(snapshot_id = id.get(), path = %path.display(), "snapshot hash mismatch");
            return Err(KvsError::operation(format!(
                "hash mismatch for '{}'",
                path.display()
            )));
        }
        self.live = read_map(&path)?;
        self.dirty = true;
        Ok(())
    }

    fn kvs_filename(&self, id: SnapshotId) -> Result<PathBuf> {
        self.artifact(id, kvs_path(&self.dir, self.instance_id, id))
    }

    fn hash_filename(&self, id: SnapshotId) -> Result<PathBuf> {
        self.artifact(id, hash_path(&self.dir, self.instance_id, id))
    }

    fn verify_snapshot(&self, id: SnapshotId) -> Result<bool> {
        let data = self.kvs_filename(id)?;
        let hash = self.hash_filename(id)?;
        artifact_matches(&data, &hash)
    }
}

// ---------------------------------------------------------------------------
// Artifact helpers
// ---------------------------------------------------------------------------

fn kvs_path(dir: &Path, instance: InstanceId, id: SnapshotId) -> PathBuf {
    dir.join(format!("kvs_{instance}_{id}.json"))
}

fn hash_path(dir: &Path, instance: InstanceId, id: SnapshotId) -> PathBuf {
    dir.join(format!("kvs_{instance}_{id}.hash"))
}

fn defaults_path(dir: &Path, instance: InstanceId) -> PathBuf {
    dir.join(format!("kvs_{instance}_default.json"))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    format!("{digest:x}")
}

fn read_map(path: &Path) -> Result<KvsMap> {
    let bytes = fs::read(path)?;
    let json: serde_json::Value = serde_json::from_slice(&bytes).map_err(|err| {
        KvsError::Unmapped(format!("'{}' is not valid JSON: {err}", path.display()))
    })?;
    let obj = json.as_object().ok_or_else(|| {
        KvsError::Unmapped(format!("'{}' does not hold an object", path.display()))
    })?;
    decode_tagged_map(obj)
        .map_err(|err| KvsError::Unmapped(format!("'{}': {err}", path.display())))
}

fn write_map(dir: &Path, instance: InstanceId, id: SnapshotId, map: &KvsMap) -> Result<()> {
    let bytes = serde_json::to_vec(&encode_tagged_map(map))
        .map_err(|err| KvsError::operation(format!("failed to serialize store: {err}")))?;
    fs::write(kvs_path(dir, instance, id), &bytes)?;
    fs::write(hash_path(dir, instance, id), sha256_hex(&bytes))?;
    Ok(())
}

fn artifact_matches(data: &Path, hash: &Path) -> Result<bool> {
    let bytes = fs::read(data)?;
    let recorded = fs::read_to_string(hash)?;
    Ok(recorded.trim() == sha256_hex(&bytes))
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

fn rename_if_present(from: &Path, to: &Path) -> Result<()> {
    if from.is_file() {
        fs::rename(from, to)?;
    }
    Ok(())
}
