//! Host lists derived from the state store.
//!
//! The direct-SSH framework resolves its hosts dynamically through [`ready_hosts`]; Ansible
//! cannot, so [`write_static_inventory`] renders the same host set into a flat inventory file
//! under a fixed group. The store is authoritative: the static file is regenerated from it on
//! every provisioning and test run rather than trusted when stale.

use std::{fs, net::IpAddr, path::Path};

use anyhow::Context;

use crate::state::{NodeStatus, StateStore};

/// Inventory group every node belongs to.
pub const GROUP: &str = "scale";

/// Remote user both frameworks log in as.
pub const SSH_USER: &str = "root";

/// An addressable, ready node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Host {
    /// Logical node label.
    pub name: String,
    /// Public address to reach it at.
    pub addr: IpAddr,
}

/// The dynamic inventory: every ready node with a known address, in label order.
///
/// Nodes that are still provisioning or marked failed are excluded, matching what the static
/// inventory lists.
#[must_use]
pub fn ready_hosts(store: &StateStore) -> Vec<Host> {
    store
        .nodes()
        .filter(|node| node.status == NodeStatus::Ready)
        .filter_map(|node| {
            Some(Host {
                name: node.label.clone(),
                addr: node.addr?,
            })
        })
        .collect()
}

/// Renders hosts into Ansible's static INI inventory format.
///
/// # Examples
///
/// ```
/// use scale_bench::inventory::{render_static_inventory, Host};
///
/// let hosts = vec![Host {
///     name: "scale-bench-0".to_string(),
///     addr: "203.0.113.7".parse().unwrap(),
/// }];
///
/// assert_eq!(
///     render_static_inventory(&hosts),
///     "[scale]\nscale-bench-0 ansible_host=203.0.113.7 ansible_user=root\n"
/// );
/// ```
#[must_use]
pub fn render_static_inventory(hosts: &[Host]) -> String {
    let mut lines = vec![format!("[{GROUP}]")];
    for host in hosts {
        lines.push(format!(
            "{} ansible_host={} ansible_user={SSH_USER}",
            host.name, host.addr
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

/// Regenerates the static inventory file from the store and returns the host count.
///
/// # Errors
///
/// Fails if the file cannot be written.
pub fn write_static_inventory(path: &Path, store: &StateStore) -> anyhow::Result<usize> {
    let hosts = ready_hosts(store);
    fs::write(path, render_static_inventory(&hosts))
        .with_context(|| format!("could not write static inventory to {}", path.display()))?;
    log::info!(
        "wrote static inventory to {} ({} host(s))",
        path.display(),
        hosts.len()
    );
    Ok(hosts.len())
}
