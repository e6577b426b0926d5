//! Orchestration for running workloads through both frameworks.
//!
//! The main entry point is [`execute_all`], which runs every given workload through the Ansible
//! executor and then the direct executor, measuring wall-clock time for each and containing
//! failures to the single workload-framework run they occurred in.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{
    executors::{Executor, Framework},
    inventory::Host,
    workloads::{Identifier, Workload},
};

/// The outcome of one workload run through one framework.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Run {
    /// Which workload ran.
    pub workload_identifier: Identifier,
    /// Which framework ran it.
    pub framework: Framework,
    /// Wall-clock start-to-finish duration, recorded whether or not the run succeeded.
    pub duration: Duration,
    /// Whether every step succeeded on every host.
    pub success: bool,
}

/// Runs one workload through one executor, timing it.
///
/// Failures are logged with workload and framework context and folded into the returned [`Run`];
/// they never propagate.
pub async fn execute_single<E: Executor>(
    executor: &E,
    workload: &Workload,
    hosts: &[Host],
) -> Run {
    let framework = executor.framework();
    log::debug!("[{}] running through {framework}...", workload.identifier);

    let start = Instant::now();
    let result = executor.run(workload, hosts).await;
    let duration = start.elapsed();

    match &result {
        Ok(()) => log::info!(
            "[{}] {framework} finished in {duration:.3?}",
            workload.identifier
        ),
        Err(err) => log::warn!(
            "[{}] {framework} run failed after {duration:.3?}: {err:#}, continuing...",
            workload.identifier
        ),
    }

    Run {
        workload_identifier: workload.identifier.clone(),
        framework,
        duration,
        success: result.is_ok(),
    }
}

/// Runs every workload through both frameworks against the full host set.
///
/// Execution is strictly serial: one workload's two framework runs complete fully before the
/// next workload begins, so the runs never interfere with each other's timings. Per-run failures
/// are contained; the returned list always holds two entries per workload.
pub async fn execute_all<A: Executor, B: Executor>(
    workloads: &[Workload],
    ansible: &A,
    direct: &B,
    hosts: &[Host],
) -> Vec<Run> {
    log::info!(
        "running {} workload(s) on {} host(s) through both frameworks...",
        workloads.len(),
        hosts.len()
    );
    let mut runs = Vec::with_capacity(workloads.len() * 2);
    for workload in workloads {
        runs.push(execute_single(ansible, workload, hosts).await);
        runs.push(execute_single(direct, workload, hosts).await);
    }
    runs
}

/// Runs every workload through a single framework against the full host set.
///
/// Used when one side of the comparison is run in isolation. Execution stays strictly serial and
/// per-run failures are contained, the same as [`execute_all`]; the returned list holds one
/// entry per workload.
pub async fn execute_only<E: Executor>(
    workloads: &[Workload],
    executor: &E,
    hosts: &[Host],
) -> Vec<Run> {
    log::info!(
        "running {} workload(s) on {} host(s) through {} only...",
        workloads.len(),
        hosts.len(),
        executor.framework()
    );
    let mut runs = Vec::with_capacity(workloads.len());
    for workload in workloads {
        runs.push(execute_single(executor, workload, hosts).await);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workloads;

    /// Executor stub that fails for a configured set of workload names.
    struct StubExecutor {
        framework: Framework,
        fail_for: Vec<&'static str>,
    }

    impl Executor for StubExecutor {
        fn framework(&self) -> Framework {
            self.framework
        }

        async fn run(&self, workload: &Workload, _hosts: &[Host]) -> anyhow::Result<()> {
            let name = workload.identifier.to_string();
            if self.fail_for.iter().any(|fail| *fail == name) {
                anyhow::bail!("one host failed a step");
            }
            Ok(())
        }
    }

    fn hosts() -> Vec<Host> {
        vec![Host {
            name: "scale-bench-0".to_string(),
            addr: "10.0.0.1".parse().unwrap(),
        }]
    }

    #[tokio::test]
    async fn both_frameworks_succeed_when_all_hosts_succeed() {
        let selected = vec![workloads::find("gather_facts").unwrap()];
        let ansible = StubExecutor {
            framework: Framework::Ansible,
            fail_for: vec![],
        };
        let direct = StubExecutor {
            framework: Framework::Direct,
            fail_for: vec![],
        };

        let runs = execute_all(&selected, &ansible, &direct, &hosts()).await;

        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|run| run.success));
        assert_eq!(runs[0].framework, Framework::Ansible);
        assert_eq!(runs[1].framework, Framework::Direct);
    }

    #[tokio::test]
    async fn a_framework_failure_does_not_abort_other_runs() {
        let selected = vec![
            workloads::find("gather_facts").unwrap(),
            workloads::find("file_operations").unwrap(),
        ];
        let ansible = StubExecutor {
            framework: Framework::Ansible,
            fail_for: vec!["gather_facts"],
        };
        let direct = StubExecutor {
            framework: Framework::Direct,
            fail_for: vec![],
        };

        let runs = execute_all(&selected, &ansible, &direct, &hosts()).await;

        assert_eq!(runs.len(), 4);
        let failed: Vec<_> = runs.iter().filter(|run| !run.success).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].framework, Framework::Ansible);
        assert_eq!(failed[0].workload_identifier.to_string(), "gather_facts");
    }

    #[tokio::test]
    async fn a_single_framework_can_run_in_isolation() {
        let selected = vec![
            workloads::find("gather_facts").unwrap(),
            workloads::find("file_operations").unwrap(),
        ];
        let direct = StubExecutor {
            framework: Framework::Direct,
            fail_for: vec![],
        };

        let runs = execute_only(&selected, &direct, &hosts()).await;

        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|run| run.framework == Framework::Direct));
        assert!(runs.iter().all(|run| run.success));
    }

    #[tokio::test]
    async fn equivalent_failures_are_reported_by_both_frameworks() {
        let selected = vec![workloads::find("install_package").unwrap()];
        let ansible = StubExecutor {
            framework: Framework::Ansible,
            fail_for: vec!["install_package"],
        };
        let direct = StubExecutor {
            framework: Framework::Direct,
            fail_for: vec!["install_package"],
        };

        let runs = execute_all(&selected, &ansible, &direct, &hosts()).await;
        assert!(runs.iter().all(|run| !run.success));
    }
}
