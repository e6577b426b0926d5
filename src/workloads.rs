//! The registered comparison workloads.
//!
//! A workload pairs a sequence of discrete per-host operations (run by the direct-SSH executor)
//! with an equivalent Ansible playbook. Both sides must perform the semantically identical
//! operation sequence; that equivalence is a correctness requirement for the comparison, not
//! just a performance nicety. Definitions are static and immutable during a run.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Unique identifier for a workload.
///
/// # Examples
///
/// ```
/// use scale_bench::workloads::Identifier;
///
/// let identifier = Identifier::from("file_operations");
///
/// assert_eq!(identifier.to_string(), "file_operations");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identifier(String);

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Identifier {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Identifier {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One discrete operation, run on every host before the next step begins.
#[derive(Clone, Debug)]
pub struct Step {
    /// Human-readable description for logs.
    pub description: String,
    /// Shell command executed on each host.
    pub command: String,
}

impl Step {
    fn new(description: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            command: command.into(),
        }
    }
}

/// A registered test: a step sequence for the direct executor and the name of the equivalent
/// playbook for Ansible.
#[derive(Clone, Debug)]
pub struct Workload {
    /// Unique identifier for this workload.
    pub identifier: Identifier,
    /// What the workload exercises.
    pub description: String,
    /// Ordered operations for the direct-SSH executor.
    pub steps: Vec<Step>,
    /// File name of the equivalent playbook, relative to the playbooks directory.
    pub playbook: String,
}

/// All registered workloads, in the order they run.
#[must_use]
pub fn registry() -> Vec<Workload> {
    vec![
        gather_facts(),
        file_operations(),
        install_package(),
        copy_and_template(),
    ]
}

/// Looks a workload up by name.
///
/// # Errors
///
/// Fails with the list of known names when no workload matches.
pub fn find(name: &str) -> anyhow::Result<Workload> {
    let all = registry();
    let known = all
        .iter()
        .map(|w| w.identifier.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let target = Identifier::from(name);
    all.into_iter()
        .find(|w| w.identifier == target)
        .ok_or_else(|| anyhow::anyhow!("unknown test {name:?} (known tests: {known})"))
}

fn gather_facts() -> Workload {
    Workload {
        identifier: Identifier::from("gather_facts"),
        description: "Gather system facts from all hosts".to_string(),
        steps: vec![Step::new(
            "collect system facts",
            "uname -a && cat /etc/os-release && free -m && df -h /",
        )],
        playbook: "gather_facts.yml".to_string(),
    }
}

fn file_operations() -> Workload {
    let mut steps = Vec::new();
    for i in 0..5 {
        steps.push(Step::new(
            format!("create /tmp/scale_bench_{i}"),
            format!("touch /tmp/scale_bench_{i}"),
        ));
    }
    for i in 0..5 {
        steps.push(Step::new(
            format!("stat /tmp/scale_bench_{i}"),
            format!("stat /tmp/scale_bench_{i}"),
        ));
    }
    for i in 0..5 {
        steps.push(Step::new(
            format!("remove /tmp/scale_bench_{i}"),
            format!("rm -f /tmp/scale_bench_{i}"),
        ));
    }
    Workload {
        identifier: Identifier::from("file_operations"),
        description: "5x file create/stat/remove on all hosts (15 tasks)".to_string(),
        steps,
        playbook: "file_operations.yml".to_string(),
    }
}

fn install_package() -> Workload {
    Workload {
        identifier: Identifier::from("install_package"),
        description: "Install and remove a small package on all hosts".to_string(),
        steps: vec![
            Step::new("install tree", "dnf install -y tree"),
            Step::new("remove tree", "dnf remove -y tree"),
        ],
        playbook: "install_package.yml".to_string(),
    }
}

fn copy_and_template() -> Workload {
    let mut steps = Vec::new();
    for i in 0..3 {
        steps.push(Step::new(
            format!("write /tmp/scale_bench_config_{i}.conf"),
            format!(
                "printf '# Config {i}\\nworkers = {}\\nport = {}\\n' > /tmp/scale_bench_config_{i}.conf && chmod 0644 /tmp/scale_bench_config_{i}.conf",
                i * 2,
                8080 + i
            ),
        ));
    }
    for i in 0..3 {
        steps.push(Step::new(
            format!("remove /tmp/scale_bench_config_{i}.conf"),
            format!("rm -f /tmp/scale_bench_config_{i}.conf"),
        ));
    }
    Workload {
        identifier: Identifier::from("copy_and_template"),
        description: "Copy 3 config files to all hosts, then clean up".to_string(),
        steps,
        playbook: "copy_and_template.yml".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_holds_the_four_workloads() {
        let names: Vec<String> = registry()
            .iter()
            .map(|w| w.identifier.to_string())
            .collect();
        assert_eq!(
            names,
            [
                "gather_facts",
                "file_operations",
                "install_package",
                "copy_and_template"
            ]
        );
    }

    #[test]
    fn file_operations_expands_to_fifteen_steps() {
        let workload = find("file_operations").unwrap();
        assert_eq!(workload.steps.len(), 15);
    }

    #[test]
    fn every_workload_names_a_playbook_and_at_least_one_step() {
        for workload in registry() {
            assert!(workload.playbook.ends_with(".yml"), "{}", workload.identifier);
            assert!(!workload.steps.is_empty(), "{}", workload.identifier);
        }
    }

    #[test]
    fn find_rejects_unknown_names() {
        let err = find("no_such_test").unwrap_err().to_string();
        assert!(err.contains("unknown test"));
        assert!(err.contains("file_operations"));
    }
}
