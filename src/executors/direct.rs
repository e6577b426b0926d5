//! Direct-SSH execution backend.

use anyhow::Context;
use tokio::process::Command;

use crate::{
    inventory::{Host, SSH_USER},
    workloads::Workload,
};

use super::{Executor, Framework};

/// Non-interactive options for every ssh invocation. Hosts are ephemeral, so host-key pinning is
/// pointless churn.
const SSH_OPTS: &[&str] = &[
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "UserKnownHostsFile=/dev/null",
    "-o",
    "ConnectTimeout=10",
    "-o",
    "BatchMode=yes",
    "-o",
    "LogLevel=ERROR",
];

/// Runs workloads by fanning each step out over plain SSH.
///
/// Within a step every host runs the command concurrently; steps themselves execute strictly in
/// sequence, and a failure on any host fails the whole run.
pub struct SshExecutor;

impl Executor for SshExecutor {
    fn framework(&self) -> Framework {
        Framework::Direct
    }

    async fn run(&self, workload: &Workload, hosts: &[Host]) -> anyhow::Result<()> {
        anyhow::ensure!(!hosts.is_empty(), "no hosts to run against");

        for step in &workload.steps {
            log::debug!(
                "[{}] {} on {} host(s)...",
                workload.identifier,
                step.description,
                hosts.len()
            );
            let outcomes = futures::future::join_all(
                hosts.iter().map(|host| run_on_host(host, &step.command)),
            )
            .await;
            let failures: Vec<String> = outcomes
                .into_iter()
                .filter_map(|outcome| outcome.err().map(|err| format!("{err:#}")))
                .collect();
            anyhow::ensure!(
                failures.is_empty(),
                "step {:?} failed on {} host(s): {}",
                step.description,
                failures.len(),
                failures.join("; ")
            );
        }
        Ok(())
    }
}

/// Runs one command on one host and maps a non-zero exit to an error naming the host.
async fn run_on_host(host: &Host, command: &str) -> anyhow::Result<()> {
    let output = Command::new("ssh")
        .args(SSH_OPTS)
        .arg(format!("{SSH_USER}@{}", host.addr))
        .arg(command)
        .output()
        .await
        .with_context(|| format!("could not spawn ssh for {}", host.name))?;
    if output.status.success() {
        return Ok(());
    }
    anyhow::bail!(
        "{}: ssh exited with {}: {}",
        host.name,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )
}

/// Checks SSH reachability of every host concurrently and returns the unreachable ones.
pub async fn ping_all(hosts: &[Host]) -> Vec<Host> {
    log::info!("pinging {} host(s)...", hosts.len());
    let checks = hosts.iter().map(|host| async move {
        match run_on_host(host, "true").await {
            Ok(()) => {
                log::info!("[{}] reachable", host.name);
                None
            }
            Err(err) => {
                log::warn!("[{}] unreachable: {err:#}", host.name);
                Some(host.clone())
            }
        }
    });
    futures::future::join_all(checks)
        .await
        .into_iter()
        .flatten()
        .collect()
}
