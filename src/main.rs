use std::path::PathBuf;

use clap::{Parser, Subcommand};

use scale_bench::{
    executors::direct,
    inventory, provision,
    provider::{Credentials, LinodeProvider},
    report, runs, teardown,
    workloads::{self, Workload},
    AnsibleExecutor, Report, SshExecutor, StateStore,
};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to the node state file
    #[arg(long, default_value = ".scale-bench-state.json")]
    state_file: PathBuf,

    /// Path to the generated static Ansible inventory
    #[arg(long, default_value = "ansible-inventory")]
    inventory: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Provision nodes until the tracked set reaches the given count
    Provision {
        /// Number of nodes to provision
        count: usize,

        /// Report what would be created without creating anything
        #[arg(long)]
        check: bool,
    },
    /// Run the comparison workloads through both frameworks
    Test {
        /// Run a single workload by name
        #[arg(long)]
        test: Option<String>,

        /// Write the comparison report to this path as JSON
        #[arg(long)]
        output: Option<PathBuf>,

        /// Directory containing the Ansible playbooks
        #[arg(long, default_value = "playbooks")]
        playbooks: PathBuf,

        /// Run only the Ansible side
        #[arg(long, conflicts_with = "direct_only")]
        ansible_only: bool,

        /// Run only the direct-SSH side
        #[arg(long)]
        direct_only: bool,
    },
    /// Check SSH reachability of every ready node
    Ping,
    /// Destroy every tracked node and clear the state file
    Teardown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    human_panic::setup_panic!();
    env_logger::init();

    let args = Args::parse();
    let mut store = StateStore::load(&args.state_file);

    match args.command {
        Command::Provision { count, check } => {
            if check {
                let missing = provision::shortfall(&store, count);
                for label in &missing {
                    println!("{label} would be created");
                }
                println!(
                    "{} node(s) would be created, {} already tracked",
                    missing.len(),
                    count - missing.len()
                );
            } else {
                let credentials = Credentials::from_env()?;
                let provider = LinodeProvider::new(&credentials);
                let summary = provision(&provider, &mut store, count, &args.inventory).await?;
                println!(
                    "{} node(s) ready, {} failed, {} created this run",
                    summary.ready, summary.failed, summary.created
                );
            }
        }
        Command::Test {
            test,
            output,
            playbooks,
            ansible_only,
            direct_only,
        } => {
            let hosts = inventory::ready_hosts(&store);
            anyhow::ensure!(
                !hosts.is_empty(),
                "no ready nodes in {}, run `scale-bench provision <count>` first",
                args.state_file.display()
            );
            inventory::write_static_inventory(&args.inventory, &store)?;

            let selected: Vec<Workload> = match test {
                Some(name) => vec![workloads::find(&name)?],
                None => workloads::registry(),
            };

            println!(
                "Scale test: {} host(s), {} workload(s)",
                hosts.len(),
                selected.len()
            );
            let ansible = AnsibleExecutor::new(playbooks, args.inventory.clone());
            let runs = if ansible_only {
                runs::execute_only(&selected, &ansible, &hosts).await
            } else if direct_only {
                runs::execute_only(&selected, &SshExecutor, &hosts).await
            } else {
                runs::execute_all(&selected, &ansible, &SshExecutor, &hosts).await
            };

            let report = Report::new(&selected, &runs, hosts.len());
            report::print_results(&report);
            if let Some(path) = output {
                report::record_results(&path, &report)?;
            }
        }
        Command::Ping => {
            let hosts = inventory::ready_hosts(&store);
            anyhow::ensure!(
                !hosts.is_empty(),
                "no ready nodes in {}",
                args.state_file.display()
            );
            let unreachable = direct::ping_all(&hosts).await;
            anyhow::ensure!(
                unreachable.is_empty(),
                "{} of {} host(s) unreachable",
                unreachable.len(),
                hosts.len()
            );
            println!("all {} host(s) reachable", hosts.len());
        }
        Command::Teardown => {
            let credentials = Credentials::from_env()?;
            let provider = LinodeProvider::new(&credentials);
            let failures = teardown(&provider, &mut store, &args.inventory).await?;
            if failures > 0 {
                println!("done, but {failures} node(s) could not be deleted; check the provider");
            } else {
                println!("all nodes destroyed, state cleared");
            }
        }
    }

    Ok(())
}
