//! Snapshot rotation: count trajectory, ceiling, restore and artifact paths.
//!
//! Every run writes `counter = i` and flushes, for `i` in `0..count`, and
//! feeds each flush into a [`RotationModel`] seeded from the handle's
//! initial `snapshot_count`.

use std::sync::Arc;

use kvs_engine::KvsBackend;
use kvs_error::{ErrorKind, KvsError, Result};
use kvs_types::KvsValue;
use tracing::{debug, info};

use crate::client::KvsSession;
use crate::oracle::RotationModel;
use crate::params::{KvsParameters, SnapshotPlan};
use crate::scenario::{Scenario, ScenarioGroup};
use crate::trace::{SNAPSHOTS, render_path, render_unit};

const COUNTER: &str = "counter";

fn start_model(kvs: &KvsSession) -> Result<RotationModel<i64>> {
    let initial = kvs.snapshot_count()?;
    Ok(RotationModel::resume(kvs.snapshot_max_count(), initial))
}

/// One write+flush cycle, mirrored into `model`.
fn flush_step(kvs: &mut KvsSession, model: &mut RotationModel<i64>, i: u8) -> Result<()> {
    let value = i64::from(i);
    kvs.set(COUNTER, KvsValue::I64(value))?;
    kvs.flush()?;
    model.record_flush(value);
    debug!(step = i, expected_count = model.expected_count(), "flush step");
    Ok(())
}

/// Traces `snapshot_count` before the first flush and after every flush.
pub struct Count {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for Count {
    fn name(&self) -> &str {
        "count"
    }

    fn run(&self, input: &str) -> Result<()> {
        let plan = SnapshotPlan::from_json(input)?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &plan.params)?;
        let mut model = start_model(&kvs)?;
        info!(target: SNAPSHOTS, snapshot_count = model.expected_count());

        for i in 0..plan.count {
            flush_step(&mut kvs, &mut model, i)?;
            let observed = kvs.snapshot_count()?;
            info!(target: SNAPSHOTS, snapshot_count = observed);
            model.check_count(observed)?;
        }
        Ok(())
    }
}

/// Traces the rotation ceiling.
pub struct MaxCount {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for MaxCount {
    fn name(&self) -> &str {
        "max_count"
    }

    fn run(&self, input: &str) -> Result<()> {
        let params = KvsParameters::from_json(input)?;
        let kvs = KvsSession::open(self.backend.as_ref(), &params)?;
        let max_count = kvs.snapshot_max_count();
        info!(target: SNAPSHOTS, max_count);
        match params.snapshot_max_count {
            Some(configured) if configured != max_count => Err(KvsError::mismatch(
                "snapshot_max_count",
                configured,
                max_count,
            )),
            _ => Ok(()),
        }
    }
}

/// Restores `snapshot_id` after `count` flushes and traces the outcome and
/// the restored counter.
pub struct Restore {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for Restore {
    fn name(&self) -> &str {
        "restore"
    }

    fn run(&self, input: &str) -> Result<()> {
        let plan = SnapshotPlan::from_json(input)?;
        let id = plan.require_snapshot_id()?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &plan.params)?;
        let mut model = start_model(&kvs)?;
        for i in 0..plan.count {
            flush_step(&mut kvs, &mut model, i)?;
        }

        let outcome = kvs.restore(id);
        info!(target: SNAPSHOTS, result = render_unit(&outcome).as_str());
        model.check_restore(id, &outcome)?;
        if outcome.is_err() {
            return Ok(());
        }

        let restored = match kvs.get(COUNTER) {
            Ok(stored) => {
                let value = stored.as_i64().ok_or_else(|| {
                    KvsError::mismatch("restored counter", "an integer", &stored)
                })?;
                info!(target: SNAPSHOTS, value);
                Some(value)
            }
            Err(err) if err.kind() == ErrorKind::KeyNotFound => None,
            Err(err) => return Err(err),
        };
        model.check_restored(id, restored.as_ref())
    }
}

/// Traces data and hash artifact lookups for `snapshot_id` after `count`
/// flushes.
pub struct Paths {
    backend: Arc<dyn KvsBackend>,
}

impl Scenario for Paths {
    fn name(&self) -> &str {
        "paths"
    }

    fn run(&self, input: &str) -> Result<()> {
        let plan = SnapshotPlan::from_json(input)?;
        let id = plan.require_snapshot_id()?;
        let mut kvs = KvsSession::open(self.backend.as_ref(), &plan.params)?;
        let mut model = start_model(&kvs)?;
        for i in 0..plan.count {
            flush_step(&mut kvs, &mut model, i)?;
        }

        let kvs_path = kvs.kvs_filename(id);
        let hash_path = kvs.hash_filename(id);
        info!(
            target: SNAPSHOTS,
            kvs_path = render_path(&kvs_path).as_str(),
            hash_path = render_path(&hash_path).as_str()
        );
        model.check_path("kvs_filename", id, &kvs_path)?;
        model.check_path("hash_filename", id, &hash_path)
    }
}

pub fn group(backend: &Arc<dyn KvsBackend>) -> ScenarioGroup {
    ScenarioGroup::new("snapshots")
        .scenario(Count {
            backend: Arc::clone(backend),
        })
        .scenario(MaxCount {
            backend: Arc::clone(backend),
        })
        .scenario(Restore {
            backend: Arc::clone(backend),
        })
        .scenario(Paths {
            backend: Arc::clone(backend),
        })
}
