//! Ansible execution backend.

use std::path::PathBuf;

use anyhow::Context;
use tokio::process::Command;

use crate::{inventory::Host, workloads::Workload};

use super::{Executor, Framework};

/// Runs workloads by invoking `ansible-playbook` as a subprocess.
///
/// The playbook content is treated as opaque beyond pass/fail and timing; success is a zero exit
/// status. Hosts come from the static inventory file, which the caller regenerates from the
/// state store before any run.
pub struct AnsibleExecutor {
    playbooks_dir: PathBuf,
    inventory_path: PathBuf,
}

impl AnsibleExecutor {
    /// Builds an executor over the given playbooks directory and static inventory file.
    #[must_use]
    pub fn new(playbooks_dir: PathBuf, inventory_path: PathBuf) -> Self {
        Self {
            playbooks_dir,
            inventory_path,
        }
    }
}

impl Executor for AnsibleExecutor {
    fn framework(&self) -> Framework {
        Framework::Ansible
    }

    async fn run(&self, workload: &Workload, hosts: &[Host]) -> anyhow::Result<()> {
        anyhow::ensure!(!hosts.is_empty(), "no hosts to run against");

        let playbook = self.playbooks_dir.join(&workload.playbook);
        anyhow::ensure!(
            playbook.is_file(),
            "playbook {} does not exist",
            playbook.display()
        );

        log::debug!(
            "[{}] running playbook {} against inventory {}...",
            workload.identifier,
            playbook.display(),
            self.inventory_path.display()
        );
        let output = Command::new("ansible-playbook")
            .arg(&playbook)
            .arg("-i")
            .arg(&self.inventory_path)
            .output()
            .await
            .context("could not invoke ansible-playbook (is it installed?)")?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        anyhow::bail!("ansible-playbook exited with {}:\n{tail}", output.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workloads;

    fn host() -> Host {
        Host {
            name: "scale-bench-0".to_string(),
            addr: "10.0.0.1".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn empty_host_set_is_an_error() {
        let executor = AnsibleExecutor::new(PathBuf::from("playbooks"), PathBuf::from("inv"));
        let workload = workloads::find("gather_facts").unwrap();
        assert!(executor.run(&workload, &[]).await.is_err());
    }

    #[tokio::test]
    async fn missing_playbook_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor =
            AnsibleExecutor::new(dir.path().to_path_buf(), dir.path().join("inventory"));
        let workload = workloads::find("gather_facts").unwrap();

        let err = executor.run(&workload, &[host()]).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
