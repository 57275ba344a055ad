//! KVS conformance harness.
//!
//! Scenarios drive an engine through the [`kvs_engine::KvsHandle`] contract,
//! emit `tracing` records under the targets in [`trace`], and compare what
//! they observe against the models in [`oracle`]. The whole scenario set is
//! assembled once by [`scenario_tree`].

use std::sync::Arc;

use kvs_engine::KvsBackend;
use kvs_error::Result;

pub mod cit;
pub mod client;
pub mod oracle;
pub mod params;
pub mod scenario;
pub mod trace;

pub use client::KvsSession;
pub use params::{KvsParameters, SnapshotPlan};
pub use scenario::{Scenario, ScenarioGroup, ScenarioTree};

/// Name of the root group. Never part of a scenario path.
pub const ROOT_GROUP: &str = "root";

/// Every scenario, bound to `backend`.
pub fn root_group(backend: &Arc<dyn KvsBackend>) -> ScenarioGroup {
    ScenarioGroup::new(ROOT_GROUP).group(cit::group(backend))
}

/// Frozen tree over [`root_group`].
pub fn scenario_tree(backend: &Arc<dyn KvsBackend>) -> Result<ScenarioTree> {
    ScenarioTree::build(root_group(backend))
}

#[cfg(test)]
mod tests {
    use kvs_engine::FileBackend;

    use super::*;

    #[test]
    fn composition_lists_every_family() {
        let backend: Arc<dyn KvsBackend> = Arc::new(FileBackend);
        let tree = scenario_tree(&backend).unwrap();
        let paths = tree.leaf_paths();
        assert_eq!(paths.len(), 1 + 11 + 3 + 4 + 5);
        assert_eq!(paths[0], "cit.supported_datatypes.keys");
        assert!(paths.contains(&"cit.supported_datatypes.values.str_1025".to_owned()));
        assert!(paths.contains(&"cit.multiple_kvs.same_instance_id_diff_value".to_owned()));
        assert!(paths.contains(&"cit.snapshots.paths".to_owned()));
        assert!(paths.contains(&"cit.default_values.checksum".to_owned()));
        assert_eq!(tree.root_name(), ROOT_GROUP);
    }
}
