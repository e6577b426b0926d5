//! Benchmark harness comparing remote-execution frameworks against fleets of disposable cloud
//! nodes.
//!
//! scale-bench provisions a set of throwaway Linode instances, runs equivalent automation
//! workloads through two independent execution frameworks against the same host set, and reports
//! comparative wall-clock timings. The two frameworks are Ansible (driven through
//! `ansible-playbook` with a generated static inventory) and a built-in direct-SSH executor that
//! resolves its hosts dynamically from the local state store.
//!
//! # Lifecycle
//! The harness is three commands around one piece of shared state, the node state file:
//! - `provision <count>` creates the shortfall of instances, waits for each to come up, and
//!   records them in the state file. Re-running is safe; existing nodes are reused.
//! - `test` runs every registered workload through both frameworks, serially, and prints a
//!   comparison report.
//! - `teardown` destroys every tracked instance and clears the state file.
//!
//! # Usage
//! scale-bench is primarily designed to be used as an executable, but the pieces are modular and
//! can be driven as a library for more granular control over provisioning and execution.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use scale_bench::{provision, Credentials, LinodeProvider, StateStore};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let credentials = Credentials::from_env()?;
//! let provider = LinodeProvider::new(&credentials);
//! let mut store = StateStore::load(".scale-bench-state.json");
//!
//! provision(&provider, &mut store, 3, Path::new("ansible-inventory")).await?;
//! #     Ok(())
//! # }
//! ```
//!
//! Credentials are supplied through the environment: `LINODE_TOKEN` (API token) and
//! `LINODE_ROOT_PASS` (root password for created instances). Both are required before any
//! provider call is made.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]

pub mod executors;
pub mod inventory;
pub mod provider;
pub mod provision;
pub mod report;
pub mod runs;
pub mod state;
pub mod teardown;
pub mod workloads;

pub use executors::{AnsibleExecutor, Executor, Framework, SshExecutor};
pub use provider::{Credentials, LinodeProvider, NodeProvider};
pub use provision::provision;
pub use report::Report;
pub use runs::{execute_all, execute_only};
pub use state::StateStore;
pub use teardown::teardown;
pub use workloads::Workload;
