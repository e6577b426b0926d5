//! Idempotent provisioning of the node fleet.
//!
//! Given a target count, [`provision`] creates only the shortfall: labels already tracked in the
//! state store are reused, growing the set is supported, and shrinking is deliberately not
//! handled here (that is teardown's job). Each new node is created, recorded immediately, and
//! then polled until the provider reports it running with an assigned address, bounded by a
//! timeout. Nodes that fail to come up are marked failed and excluded from the inventory but
//! left tracked for visibility; everything else proceeds (partial-failure tolerant, not
//! transactional).

use std::{
    path::Path,
    time::{Duration, Instant},
};

use anyhow::Context;

use crate::{
    inventory,
    provider::{InstanceStatus, NodeProvider, ProviderError},
    state::{NodeRecord, NodeStatus, StateStore},
};

/// Prefix for every logical node label; node `i` is `scale-bench-{i}`.
pub const NODE_PREFIX: &str = "scale-bench";

/// How long to wait for a single node to report running with an address.
const READY_TIMEOUT: Duration = Duration::from_secs(180);
/// Delay between readiness polls.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Counts summarizing one provisioning run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProvisionSummary {
    /// Tracked nodes that are ready after the run.
    pub ready: usize,
    /// Tracked nodes that are marked failed after the run.
    pub failed: usize,
    /// Instances newly created by this run.
    pub created: usize,
}

/// Ensures `count` nodes are tracked in the store, creating only the shortfall.
///
/// Verifies credentials before any mutation, saves the store after every change so an
/// interrupted run can recover by re-running, and regenerates the static inventory from the
/// store at the end. Nodes left mid-provisioning by a previous interrupted run are resumed
/// rather than skipped.
///
/// # Errors
///
/// Fails on rejected credentials (before anything is created), on an authentication error
/// mid-run, or when the state file or inventory cannot be written. Per-node provider errors and
/// readiness timeouts are contained: the node is marked failed and the run continues.
pub async fn provision<P: NodeProvider>(
    provider: &P,
    store: &mut StateStore,
    count: usize,
    inventory_path: &Path,
) -> anyhow::Result<ProvisionSummary> {
    provider
        .verify_credentials()
        .await
        .context("provider rejected credentials")?;

    log::info!("provisioning {count} node(s)...");
    let mut created = 0;
    for i in 0..count {
        let label = format!("{NODE_PREFIX}-{i}");

        if let Some(record) = store.get(&label).cloned() {
            match (record.status, record.instance_id) {
                (NodeStatus::Provisioning, Some(id)) => {
                    log::info!("[{label}] resuming readiness wait for tracked instance {id}...");
                    let record = wait_until_ready(provider, id, &label)
                        .await
                        .with_context(|| {
                            format!("[{label}] provider rejected credentials mid-run")
                        })?;
                    store.insert(record);
                    store.save()?;
                }
                _ => {
                    let detail = record
                        .addr
                        .map_or_else(|| record.status.to_string(), |addr| addr.to_string());
                    log::info!("[{label}] exists ({detail}), skipping...");
                }
            }
            continue;
        }

        log::info!("[{label}] creating instance...");
        match provider.create_instance(&label).await {
            Ok(instance) => {
                store.insert(NodeRecord {
                    label: label.clone(),
                    instance_id: Some(instance.id),
                    addr: instance.ipv4.first().copied(),
                    status: NodeStatus::Provisioning,
                });
                store.save()?;
                created += 1;

                let record = wait_until_ready(provider, instance.id, &label)
                    .await
                    .with_context(|| format!("[{label}] provider rejected credentials mid-run"))?;
                store.insert(record);
                store.save()?;
            }
            Err(err @ ProviderError::Auth(_)) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("[{label}] provider rejected credentials mid-run")));
            }
            Err(err) => {
                log::warn!("[{label}] could not create instance: {err}, continuing...");
                store.insert(NodeRecord {
                    label: label.clone(),
                    instance_id: None,
                    addr: None,
                    status: NodeStatus::Failed,
                });
                store.save()?;
            }
        }
    }

    inventory::write_static_inventory(inventory_path, store)?;

    let ready = store
        .nodes()
        .filter(|node| node.status == NodeStatus::Ready)
        .count();
    let failed = store
        .nodes()
        .filter(|node| node.status == NodeStatus::Failed)
        .count();
    if failed > 0 {
        log::warn!("{failed} node(s) failed to provision and are excluded from the inventory");
    }
    log::info!("{ready} node(s) ready ({created} created this run)");

    Ok(ProvisionSummary {
        ready,
        failed,
        created,
    })
}

/// Labels a run targeting `count` nodes would create, given the current store.
///
/// This is the dry-run side of [`provision`]: it consults only the store and never talks to the
/// provider, so it is safe to call without credentials.
#[must_use]
pub fn shortfall(store: &StateStore, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("{NODE_PREFIX}-{i}"))
        .filter(|label| !store.contains(label))
        .collect()
}

/// Polls the provider until the instance is running with an address, or the timeout passes.
///
/// Poll errors are logged and retried until the deadline; a node that never becomes ready is
/// returned as failed, keeping whatever address was last seen.
///
/// # Errors
///
/// Returns [`ProviderError::Auth`] immediately when a poll is rejected for credentials; the
/// instance will be found in the provisioning state by the next run.
async fn wait_until_ready<P: NodeProvider>(
    provider: &P,
    id: u64,
    label: &str,
) -> Result<NodeRecord, ProviderError> {
    let deadline = Instant::now() + READY_TIMEOUT;
    let mut last_addr = None;
    loop {
        match provider.get_instance(id).await {
            Ok(instance) => {
                last_addr = instance.ipv4.first().copied();
                if instance.status == InstanceStatus::Running {
                    if let Some(addr) = last_addr {
                        log::info!("[{label}] ready ({addr})");
                        return Ok(NodeRecord {
                            label: label.to_string(),
                            instance_id: Some(id),
                            addr: Some(addr),
                            status: NodeStatus::Ready,
                        });
                    }
                }
                log::debug!("[{label}] instance status: {:?}, waiting...", instance.status);
            }
            Err(err @ ProviderError::Auth(_)) => return Err(err),
            Err(err) => {
                log::warn!("[{label}] could not poll instance status: {err}, retrying...");
            }
        }

        if Instant::now() >= deadline {
            log::warn!(
                "[{label}] timed out after {READY_TIMEOUT:?} waiting for readiness, marking failed"
            );
            return Ok(NodeRecord {
                label: label.to_string(),
                instance_id: Some(id),
                addr: last_addr,
                status: NodeStatus::Failed,
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
