//! Scenario composition and dispatch.
//!
//! Groups are assembled once as owned values ([`ScenarioGroup`]) and then
//! frozen into a [`ScenarioTree`], an arena addressed by [`NodeId`]. The tree
//! never changes after construction.

use std::fmt;

use kvs_error::{KvsError, Result};
use tracing::debug;

/// A single runnable unit taking a JSON payload.
pub trait Scenario: Send + Sync {
    /// Path segment under the owning group.
    fn name(&self) -> &str;

    /// Run once against `input`. May flush durable state, so repeated calls
    /// are not guaranteed to behave the same.
    fn run(&self, input: &str) -> Result<()>;
}

/// Builder-side group: owned scenarios and sub-groups, in composition order.
pub struct ScenarioGroup {
    name: String,
    scenarios: Vec<Box<dyn Scenario>>,
    groups: Vec<ScenarioGroup>,
}

impl ScenarioGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: Vec::new(),
            groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn scenario(mut self, scenario: impl Scenario + 'static) -> Self {
        self.scenarios.push(Box::new(scenario));
        self
    }

    #[must_use]
    pub fn group(mut self, group: Self) -> Self {
        self.groups.push(group);
        self
    }
}

impl fmt::Debug for ScenarioGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioGroup")
            .field("name", &self.name)
            .field(
                "scenarios",
                &self.scenarios.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("groups", &self.groups)
            .finish()
    }
}

/// Index of a node inside a [`ScenarioTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

enum NodeKind {
    Group { children: Vec<NodeId> },
    Leaf(Box<dyn Scenario>),
}

struct Node {
    name: String,
    kind: NodeKind,
}

/// Frozen scenario tree. Paths exclude the root name.
pub struct ScenarioTree {
    nodes: Vec<Node>,
}

const ROOT: NodeId = NodeId(0);

impl ScenarioTree {
    /// Freeze `root`. Fails with `DuplicateName` if two siblings share a
    /// name, whether scenario or group.
    pub fn build(root: ScenarioGroup) -> Result<Self> {
        let mut tree = Self { nodes: Vec::new() };
        tree.insert_group(root, "")?;
        Ok(tree)
    }

    fn insert_group(&mut self, group: ScenarioGroup, parent_path: &str) -> Result<NodeId> {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            name: group.name,
            kind: NodeKind::Group {
                children: Vec::new(),
            },
        });
        let path = if id == ROOT {
            String::new()
        } else {
            join(parent_path, &self.nodes[id.0].name)
        };

        let mut children = Vec::with_capacity(group.scenarios.len() + group.groups.len());
        for scenario in group.scenarios {
            let name = scenario.name().to_owned();
            self.check_unique(&children, &path, &name)?;
            let child = NodeId(self.nodes.len());
            self.nodes.push(Node {
                name,
                kind: NodeKind::Leaf(scenario),
            });
            children.push(child);
        }
        for sub in group.groups {
            self.check_unique(&children, &path, &sub.name)?;
            children.push(self.insert_group(sub, &path)?);
        }

        if let NodeKind::Group { children: slot } = &mut self.nodes[id.0].kind {
            *slot = children;
        }
        Ok(id)
    }

    fn check_unique(&self, siblings: &[NodeId], parent: &str, name: &str) -> Result<()> {
        if siblings.iter().any(|sib| self.nodes[sib.0].name == name) {
            return Err(KvsError::DuplicateName {
                parent: parent.to_owned(),
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    /// Resolve a `.`/`/`-separated path to a node, one exact segment per
    /// level.
    pub fn resolve(&self, path: &str) -> Result<NodeId> {
        let not_found = || KvsError::PathNotFound {
            path: path.to_owned(),
        };
        if path.is_empty() {
            return Ok(ROOT);
        }
        let mut current = ROOT;
        for segment in path.split(['.', '/']) {
            let NodeKind::Group { children } = &self.nodes[current.0].kind else {
                return Err(not_found());
            };
            current = children
                .iter()
                .copied()
                .find(|child| self.nodes[child.0].name == segment)
                .ok_or_else(not_found)?;
        }
        Ok(current)
    }

    /// Resolve `path` to a leaf and run it with `input`.
    pub fn run(&self, path: &str, input: &str) -> Result<()> {
        let id = self.resolve(path)?;
        match &self.nodes[id.0].kind {
            NodeKind::Leaf(scenario) => {
                debug!(path, "running scenario");
                scenario.run(input).inspect_err(|err| {
                    let kind = err.kind();
                    debug!(path, %kind, engine = kind.is_engine_kind(), "scenario failed");
                })
            }
            NodeKind::Group { .. } => Err(KvsError::AmbiguousTarget {
                path: path.to_owned(),
            }),
        }
    }

    /// Every runnable path, in composition order.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves(ROOT, "", &mut out);
        out
    }

    fn collect_leaves(&self, id: NodeId, prefix: &str, out: &mut Vec<String>) {
        match &self.nodes[id.0].kind {
            NodeKind::Leaf(_) => out.push(prefix.to_owned()),
            NodeKind::Group { children } => {
                for child in children {
                    let path = join(prefix, &self.nodes[child.0].name);
                    self.collect_leaves(*child, &path, out);
                }
            }
        }
    }

    /// Name of the root group.
    pub fn root_name(&self) -> &str {
        &self.nodes[ROOT.0].name
    }
}

impl fmt::Debug for ScenarioTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioTree")
            .field("root", &self.root_name())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}
