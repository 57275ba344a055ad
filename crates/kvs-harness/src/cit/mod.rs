//! Component integration scenarios, grouped by concern.

use std::sync::Arc;

use kvs_engine::KvsBackend;

use crate::scenario::ScenarioGroup;

pub mod default_values;
pub mod multiple_kvs;
pub mod snapshots;
pub mod supported_datatypes;

pub fn group(backend: &Arc<dyn KvsBackend>) -> ScenarioGroup {
    ScenarioGroup::new("cit")
        .group(supported_datatypes::group(backend))
        .group(multiple_kvs::group(backend))
        .group(snapshots::group(backend))
        .group(default_values::group(backend))
}
