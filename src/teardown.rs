//! Best-effort destruction of the node fleet.

use std::{fs, path::Path};

use anyhow::Context;

use crate::{
    provider::{NodeProvider, ProviderError},
    state::StateStore,
};

/// Destroys every tracked node and clears the state store.
///
/// Deletion is best-effort, not atomic: per-node failures are logged and counted but do not halt
/// the rest. The store is cleared afterwards regardless, so stale entries never mask the next
/// run; a node whose deletion request failed may still exist at the provider but is no longer
/// tracked locally. The generated static inventory file is removed along with the nodes it
/// described.
///
/// Returns the number of nodes whose deletion failed.
///
/// # Errors
///
/// Fails on rejected credentials or a network-level verification failure, before touching the
/// store. An authentication error on a later deletion likewise aborts with the store untouched,
/// so a retry will find the same nodes again. Also fails if the cleared store cannot be written.
pub async fn teardown<P: NodeProvider>(
    provider: &P,
    store: &mut StateStore,
    inventory_path: &Path,
) -> anyhow::Result<usize> {
    if store.is_empty() {
        log::info!("no nodes tracked in state, nothing to tear down");
        return Ok(0);
    }

    provider
        .verify_credentials()
        .await
        .context("provider rejected credentials")?;

    log::info!("destroying {} node(s)...", store.len());
    let mut failures = 0;
    for record in store.nodes() {
        match record.instance_id {
            Some(id) => match provider.delete_instance(id).await {
                Ok(()) => log::info!("[{}] destroyed", record.label),
                Err(err @ ProviderError::Auth(_)) => {
                    return Err(anyhow::Error::new(err).context(format!(
                        "[{}] provider rejected credentials mid-run, leaving state untouched",
                        record.label
                    )));
                }
                Err(err) => {
                    failures += 1;
                    log::warn!(
                        "[{}] could not delete instance {id}: {err}, continuing...",
                        record.label
                    );
                }
            },
            None => log::debug!("[{}] no instance id recorded, dropping...", record.label),
        }
    }

    store.clear();
    store.save().context("could not write cleared state file")?;

    if inventory_path.exists() {
        match fs::remove_file(inventory_path) {
            Ok(()) => log::info!("removed static inventory {}", inventory_path.display()),
            Err(err) => log::warn!(
                "could not remove static inventory {}: {err}, continuing...",
                inventory_path.display()
            ),
        }
    }

    if failures > 0 {
        log::warn!("{failures} node(s) could not be deleted and may still exist at the provider");
    }
    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        provider::testing::MockProvider,
        state::{NodeRecord, NodeStatus},
    };

    fn node(label: &str, id: Option<u64>) -> NodeRecord {
        NodeRecord {
            label: label.to_string(),
            instance_id: id,
            addr: id.map(|id| format!("10.0.0.{id}").parse().unwrap()),
            status: NodeStatus::Ready,
        }
    }

    fn tracked_store(dir: &tempfile::TempDir, ids: &[u64]) -> StateStore {
        let mut store = StateStore::load(dir.path().join("state.json"));
        for id in ids {
            store.insert(node(&format!("scale-bench-{id}"), Some(*id)));
        }
        store
    }

    #[tokio::test]
    async fn teardown_destroys_everything_and_clears_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new();
        let mut store = tracked_store(&dir, &[1, 2, 3]);
        let inventory_path = dir.path().join("ansible-inventory");
        fs::write(&inventory_path, "[scale]\n").unwrap();

        let failures = teardown(&provider, &mut store, &inventory_path)
            .await
            .unwrap();

        assert_eq!(failures, 0);
        assert!(store.is_empty());
        assert_eq!(*provider.deleted.lock().unwrap(), vec![1, 2, 3]);
        assert!(!inventory_path.exists());
        assert!(StateStore::load(store.path()).is_empty());
    }

    #[tokio::test]
    async fn per_node_deletion_failures_still_clear_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MockProvider::new();
        provider.fail_delete = vec![2];
        let mut store = tracked_store(&dir, &[1, 2, 3]);

        let failures = teardown(&provider, &mut store, &dir.path().join("inv"))
            .await
            .unwrap();

        assert_eq!(failures, 1);
        assert!(store.is_empty());
        assert_eq!(*provider.deleted.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn auth_failure_aborts_without_clearing_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MockProvider::new();
        provider.auth_ok = false;
        let mut store = tracked_store(&dir, &[1, 2]);

        let result = teardown(&provider, &mut store, &dir.path().join("inv")).await;

        assert!(result.is_err());
        assert_eq!(store.len(), 2);
        assert!(provider.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn auth_failure_mid_teardown_leaves_the_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MockProvider::new();
        provider.fail_delete_auth = true;
        let mut store = tracked_store(&dir, &[1, 2, 3]);

        let result = teardown(&provider, &mut store, &dir.path().join("inv")).await;

        assert!(result.is_err());
        assert_eq!(store.len(), 3);
        assert!(provider.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn records_without_instance_ids_are_dropped_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let provider = MockProvider::new();
        let mut store = StateStore::load(dir.path().join("state.json"));
        store.insert(node("scale-bench-0", None));

        let failures = teardown(&provider, &mut store, &dir.path().join("inv"))
            .await
            .unwrap();

        assert_eq!(failures, 0);
        assert!(store.is_empty());
        assert!(provider.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_store_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MockProvider::new();
        provider.auth_ok = false;
        let mut store = StateStore::load(dir.path().join("state.json"));

        // No provider call should happen, so bad credentials must not matter.
        let failures = teardown(&provider, &mut store, &dir.path().join("inv"))
            .await
            .unwrap();
        assert_eq!(failures, 0);
    }
}
