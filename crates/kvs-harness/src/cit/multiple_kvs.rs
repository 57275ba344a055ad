//! Cross-handle visibility: same identity shares flushed state, different
//! identities stay isolated.

use std::sync::Arc;

use kvs_engine::KvsBackend;
use kvs_error::{KvsError, Result};
use kvs_types::KvsValue;
use tracing::info;

use crate::client::KvsSession;
use crate::oracle;
use crate::params::{KvsParameters, instance_pair};
use crate::scenario::{Scenario, ScenarioGroup};
use crate::trace::MULTIPLE_KVS;

const KEY: &str = "number";
const VALUE_1: f64 = 111.1;
const VALUE_2: f64 = 222.2;

/// Write each value through its own handle, then flush in order. Both
/// handles are open before the first write.
fn write_and_flush(
    backend: &dyn KvsBackend,
    writes: [(&KvsParameters, f64); 2],
) -> Result<()> {
    let mut first = KvsSession::open(backend, writes[0].0)?;
    let mut second = KvsSession::open(backend, writes[1].0)?;
    first.set(KEY, KvsValue::F64(writes[0].1))?;
    second.set(KEY, KvsValue::F64(writes[1].1))?;
    first.flush()?;
    second.flush()
}

/// Reopen `params`, trace what it holds and compare against `expected`.
fn read_back(
    backend: &dyn KvsBackend,
    label: &str,
    params: &KvsParameters,
    expected: f64,
) -> Result<()> {
    let kvs = KvsSession::open(backend, params)?;
    let stored = kvs.get(KEY)?;
    let value_is_default = kvs.has_default(KEY)?;
    let number = stored
        .as_f64()
        .ok_or_else(|| KvsError::mismatch(format!("{label} {KEY}"), "a number", &stored))?;
    info!(
        target: MULTIPLE_KVS,
        instance = label,
        key = KEY,
        value = number,
        value_is_default
    );
    oracle::check_value(
        &format!("{label} {KEY} after flush"),
        &KvsValue::F64(expected),
        &stored,
    )?;
    oracle::check_flag(
        &format!("{label} has_default after flush"),
        false,
        value_is_default,
    )
}

/// Two identities, two values; neither sees the other's write.
pub struct MultipleInstanceIds {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for MultipleInstanceIds {
    fn name(&self) -> &str {
        "multiple_instance_ids"
    }

    fn run(&self, input: &str) -> Result<()> {
        let (params_1, params_2) = instance_pair(input)?;
        let backend = self.backend.as_ref();
        write_and_flush(backend, [(&params_1, VALUE_1), (&params_2, VALUE_2)])?;
        read_back(backend, "kvs1", &params_1, VALUE_1)?;
        read_back(backend, "kvs2", &params_2, VALUE_2)
    }
}

/// Two handles on one identity write the same value.
pub struct SameInstanceIdSameValue {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for SameInstanceIdSameValue {
    fn name(&self) -> &str {
        "same_instance_id_same_value"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let backend = self.backend.as_ref();
        write_and_flush(backend, [(&params, VALUE_1), (&params, VALUE_1)])?;
        read_back(backend, "kvs1", &params, VALUE_1)?;
        read_back(backend, "kvs2", &params, VALUE_1)
    }
}

/// Two handles on one identity write different values; the last flush wins
/// for every later reader.
pub struct SameInstanceIdDiffValue {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for SameInstanceIdDiffValue {
    fn name(&self) -> &str {
        "same_instance_id_diff_value"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let backend = self.backend.as_ref();
        write_and_flush(backend, [(&params, VALUE_1), (&params, VALUE_2)])?;
        read_back(backend, "kvs1", &params, VALUE_2)?;
        read_back(backend, "kvs2", &params, VALUE_2)
    }
}

pub fn group(backend: &Arc<dyn KvsBackend>) -> ScenarioGroup {
    ScenarioGroup::new("multiple_kvs")
        .scenario(MultipleInstanceIds {
            backend: Arc::clone(backend),
        })
        .scenario(SameInstanceIdSameValue {
            backend: Arc::clone(backend),
        })
        .scenario(SameInstanceIdDiffValue {
            backend: Arc::clone(backend),
        })
}
