//! The two interchangeable execution backends.
//!
//! Both frameworks run the same [`crate::workloads::Workload`] against the same host set; only
//! the mechanism differs. [`AnsibleExecutor`] shells out to `ansible-playbook` with the generated
//! static inventory, [`SshExecutor`] fans each step out over plain SSH using the dynamic host
//! list. The [`Executor`] trait is the strategy seam: orchestration in [`crate::runs`] only sees
//! "run this workload, tell me pass/fail".

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{inventory::Host, workloads::Workload};

pub mod ansible;
pub mod direct;

pub use ansible::AnsibleExecutor;
pub use direct::SshExecutor;

/// Which framework produced a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    /// Ansible via `ansible-playbook` and the static inventory.
    Ansible,
    /// The built-in direct-SSH executor using the dynamic inventory.
    Direct,
}

impl Display for Framework {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ansible => write!(f, "ansible"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// An execution backend capable of running a workload against a host set.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// The framework this executor represents.
    fn framework(&self) -> Framework;

    /// Runs the full workload against every given host.
    ///
    /// A failure of any host on any step fails the whole run; steps that are defined as
    /// sequential execute in order.
    ///
    /// # Errors
    ///
    /// Returns an error describing which step (and hosts) failed. Callers record the failure and
    /// move on; nothing here aborts other workloads.
    async fn run(&self, workload: &Workload, hosts: &[Host]) -> anyhow::Result<()>;
}
