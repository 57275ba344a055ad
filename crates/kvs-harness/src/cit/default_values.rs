//! Default-value resolution, key removal and resets, and hash verification.
//!
//! Defaults come from the engine (the reference backend reads
//! `kvs_<id>_default.json`). Each record carries `key`, `value_is_default`,
//! `default_value` and `current_value`, the last two rendered as results.

use std::sync::Arc;

use kvs_engine::{KvsBackend, SnapshotId};
use kvs_error::{KvsError, Result};
use kvs_types::KvsValue;
use tracing::info;

use crate::client::KvsSession;
use crate::oracle;
use crate::params::KvsParameters;
use crate::scenario::{Scenario, ScenarioGroup};
use crate::trace::{DEFAULT_VALUES, render_path, render_value};

const KEY: &str = "test_number";
const WRITTEN: f64 = 432.1;
const RESET_KEYS: usize = 5;

#[derive(Debug)]
struct KeyState {
    value_is_default: bool,
    default_value: String,
    current_value: String,
}

fn observe(kvs: &KvsSession, key: &str) -> Result<KeyState> {
    Ok(KeyState {
        value_is_default: kvs.has_default(key)?,
        default_value: render_value(&kvs.get_default(key)),
        current_value: render_value(&kvs.get(key)),
    })
}

fn trace_state(kvs: &KvsSession, key: &str) -> Result<KeyState> {
    let state = observe(kvs, key)?;
    info!(
        target: DEFAULT_VALUES,
        key,
        value_is_default = state.value_is_default,
        default_value = state.default_value.as_str(),
        current_value = state.current_value.as_str()
    );
    Ok(state)
}

/// After a reset or removal the current value must be whatever the default
/// lookup yields, including `Err(KeyNotFound)` when there is none.
fn check_falls_back(key: &str, state: &KeyState) -> Result<()> {
    if state.current_value != state.default_value {
        return Err(KvsError::mismatch(
            format!("{key} after reset"),
            &state.default_value,
            &state.current_value,
        ));
    }
    Ok(())
}

fn reset_key_name(index: usize) -> String {
    format!("{KEY}_{index}")
}

#[allow(clippy::cast_precision_loss)]
fn reset_key_value(index: usize) -> KvsValue {
    KvsValue::F64(WRITTEN * (index as f64 + 1.0))
}

/// Traces the key before and after `set`+`flush`; afterwards `has_default`
/// must be false, on this handle and on a fresh one.
pub struct DefaultValues {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for DefaultValues {
    fn name(&self) -> &str {
        "default_values"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &params)?;
        trace_state(&kvs, KEY)?;

        kvs.set(KEY, KvsValue::F64(WRITTEN))?;
        kvs.flush()?;
        let after = trace_state(&kvs, KEY)?;
        oracle::check_flag("has_default after set+flush", false, after.value_is_default)?;

        let reopened = KvsSession::open(self.backend.as_ref(), &params)?;
        oracle::check_flag(
            "has_default on a new handle after set+flush",
            false,
            reopened.has_default(KEY)?,
        )?;
        oracle::check_value("value on a new handle", &KvsValue::F64(WRITTEN), &reopened.get(KEY)?)
    }
}

/// Set, trace, remove, trace. The removed key falls back to its default.
pub struct RemoveKey {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for RemoveKey {
    fn name(&self) -> &str {
        "remove_key"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &params)?;

        kvs.set(KEY, KvsValue::F64(WRITTEN))?;
        trace_state(&kvs, KEY)?;
        kvs.remove_key(KEY)?;
        let removed = trace_state(&kvs, KEY)?;
        check_falls_back(KEY, &removed)
    }
}

/// Set several keys, `reset()` the store and trace each key.
pub struct ResetAllKeys {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for ResetAllKeys {
    fn name(&self) -> &str {
        "reset_all_keys"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &params)?;

        for index in 0..RESET_KEYS {
            let key = reset_key_name(index);
            kvs.set(&key, reset_key_value(index))?;
            trace_state(&kvs, &key)?;
        }
        kvs.reset()?;

        let mut states = Vec::with_capacity(RESET_KEYS);
        for index in 0..RESET_KEYS {
            let key = reset_key_name(index);
            states.push((trace_state(&kvs, &key)?, key));
        }
        for (state, key) in &states {
            check_falls_back(key, state)?;
        }
        Ok(())
    }
}

/// Set several keys and `reset_key` one of them; only that one falls back.
pub struct ResetSingleKey {
    backend: Arc<dyn KvsBackend>,
}

const RESET_INDEX: usize = 2;

impl Scenario for ResetSingleKey {
    fn name(&self) -> &str {
        "reset_single_key"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &params)?;

        for index in 0..RESET_KEYS {
            kvs.set(&reset_key_name(index), reset_key_value(index))?;
        }
        kvs.reset_key(&reset_key_name(RESET_INDEX))?;

        for index in 0..RESET_KEYS {
            let key = reset_key_name(index);
            let state = trace_state(&kvs, &key)?;
            if index == RESET_INDEX {
                check_falls_back(&key, &state)?;
            } else {
                oracle::check_value(
                    &format!("{key} after resetting {}", reset_key_name(RESET_INDEX)),
                    &reset_key_value(index),
                    &kvs.get(&key)?,
                )?;
            }
        }
        Ok(())
    }
}

/// After `set`+`flush`, traces the live artifact paths and whether the hash
/// artifact matches the data artifact.
pub struct Checksum {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for Checksum {
    fn name(&self) -> &str {
        "checksum"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &params)?;
        kvs.set(KEY, KvsValue::F64(WRITTEN))?;
        kvs.flush()?;

        let kvs_path = kvs.kvs_filename(SnapshotId::LIVE);
        let hash_path = kvs.hash_filename(SnapshotId::LIVE);
        info!(
            target: DEFAULT_VALUES,
            kvs_path = render_path(&kvs_path).as_str(),
            hash_path = render_path(&hash_path).as_str()
        );
        kvs_path?;
        hash_path?;

        let hash_valid = kvs.verify_snapshot(SnapshotId::LIVE)?;
        info!(target: DEFAULT_VALUES, hash_valid);
        oracle::check_flag("hash_valid after flush", true, hash_valid)
    }
}

pub fn group(backend: &Arc<dyn KvsBackend>) -> ScenarioGroup {
    ScenarioGroup::new("default_values")
        .scenario(DefaultValues {
            backend: Arc::clone(backend),
        })
        .scenario(RemoveKey {
            backend: Arc::clone(backend),
        })
        .scenario(ResetAllKeys {
            backend: Arc::clone(backend),
        })
        .scenario(ResetSingleKey {
            backend: Arc::clone(backend),
        })
        .scenario(Checksum {
            backend: Arc::clone(backend),
        })
}
