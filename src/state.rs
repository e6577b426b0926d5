//! Local state store tracking provisioned nodes.
//!
//! The state file is a single JSON mapping from logical node label to [`NodeRecord`], and it is
//! treated as the sole authoritative snapshot of what currently exists. It is read at startup and
//! rewritten wholesale after every provisioning or teardown mutation, so an interrupted run
//! leaves whatever nodes were already created on record and re-running is the recovery path.
//!
//! A missing or unparseable state file is treated as "no nodes exist" rather than a fatal error,
//! to keep re-runs resilient.

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Readiness status of a tracked node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Creation was requested but the instance has not reported running yet.
    Provisioning,
    /// The instance is running and has an assigned address.
    Ready,
    /// Creation failed or the instance never became ready; kept tracked for visibility.
    Failed,
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provisioning => write!(f, "provisioning"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Everything tracked about a single provisioned node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Logical name of the node, unique within the store.
    pub label: String,
    /// Cloud instance id, absent when the creation request itself failed.
    pub instance_id: Option<u64>,
    /// Public address, assigned once the provider reports one.
    pub addr: Option<IpAddr>,
    /// Current readiness status.
    pub status: NodeStatus,
}

/// Persistent mapping from logical node label to [`NodeRecord`].
///
/// Records iterate in label order. Saving is atomic (write to a sibling temp file, then rename)
/// so a crash mid-write never corrupts the previous snapshot.
///
/// # Examples
///
/// ```
/// use scale_bench::state::{NodeRecord, NodeStatus, StateStore};
///
/// let dir = std::env::temp_dir().join("scale-bench-doc");
/// std::fs::create_dir_all(&dir).unwrap();
/// let mut store = StateStore::load(dir.join("state.json"));
///
/// store.insert(NodeRecord {
///     label: "scale-bench-0".to_string(),
///     instance_id: Some(42),
///     addr: Some("203.0.113.7".parse().unwrap()),
///     status: NodeStatus::Ready,
/// });
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    nodes: BTreeMap<String, NodeRecord>,
}

impl StateStore {
    /// Loads the store from the given path.
    ///
    /// A missing file yields an empty store. A file that exists but cannot be parsed also yields
    /// an empty store, with a warning, so stale or hand-mangled state never blocks a run.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let nodes = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(nodes) => nodes,
                Err(err) => {
                    log::warn!(
                        "could not parse state file {}: {err}, starting from an empty store",
                        path.display()
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => {
                log::debug!("no state file at {}, starting empty", path.display());
                BTreeMap::new()
            }
        };
        log::debug!("loaded {} node(s) from {}", nodes.len(), path.display());
        Self { path, nodes }
    }

    /// Writes the current snapshot back to disk.
    ///
    /// # Errors
    ///
    /// Fails if the temp file cannot be written or renamed into place. State-file write failures
    /// are fatal for the calling command; nothing downstream can be trusted without them.
    pub fn save(&self) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(&self.nodes)
            .context("could not serialize state store")?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, contents)
            .with_context(|| format!("could not write state file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| {
            format!("could not move state file into place at {}", self.path.display())
        })?;
        log::debug!("wrote {} node(s) to {}", self.nodes.len(), self.path.display());
        Ok(())
    }

    /// Inserts or replaces the record for its label.
    pub fn insert(&mut self, record: NodeRecord) {
        self.nodes.insert(record.label.clone(), record);
    }

    /// Removes and returns the record for the given label.
    pub fn remove(&mut self, label: &str) -> Option<NodeRecord> {
        self.nodes.remove(label)
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Looks up the record for the given label.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&NodeRecord> {
        self.nodes.get(label)
    }

    /// Whether a record exists for the given label.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.nodes.contains_key(label)
    }

    /// All records, in label order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.values()
    }

    /// Number of tracked nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store tracks no nodes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
