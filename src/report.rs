//! Aggregation and output of comparison results.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    executors::Framework,
    runs::Run,
    workloads::Workload,
};

/// Timing and outcome of one framework's run of one workload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameworkResult {
    /// Wall-clock elapsed seconds, rounded to milliseconds.
    pub seconds: f64,
    /// Whether the run succeeded on every host.
    pub success: bool,
}

/// Both frameworks' results for one workload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkloadReport {
    /// What the workload exercises.
    pub description: String,
    /// Ansible's result, if that framework ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ansible: Option<FrameworkResult>,
    /// The direct executor's result, if that framework ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct: Option<FrameworkResult>,
    /// Ansible time over direct time, only when both runs succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speedup: Option<f64>,
}

/// The full comparison report for one invocation, keyed by workload name.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    /// When the report was assembled, RFC 3339 UTC.
    pub timestamp: String,
    /// How many hosts every run targeted.
    pub hosts: usize,
    /// Per-workload results.
    pub workloads: BTreeMap<String, WorkloadReport>,
}

impl Report {
    /// Folds raw runs into a report keyed by workload name.
    #[must_use]
    pub fn new(workloads: &[Workload], runs: &[Run], hosts: usize) -> Self {
        let mut entries = BTreeMap::new();
        for workload in workloads {
            entries.insert(
                workload.identifier.to_string(),
                WorkloadReport {
                    description: workload.description.clone(),
                    ansible: None,
                    direct: None,
                    speedup: None,
                },
            );
        }

        for run in runs {
            let Some(entry) = entries.get_mut(&run.workload_identifier.to_string()) else {
                log::warn!(
                    "[{}] run does not match any selected workload, skipping...",
                    run.workload_identifier
                );
                continue;
            };
            let result = FrameworkResult {
                seconds: round_ms(run.duration.as_secs_f64()),
                success: run.success,
            };
            match run.framework {
                Framework::Ansible => entry.ansible = Some(result),
                Framework::Direct => entry.direct = Some(result),
            }
        }

        for entry in entries.values_mut() {
            if let (Some(ansible), Some(direct)) = (&entry.ansible, &entry.direct) {
                if ansible.success && direct.success && direct.seconds > 0.0 {
                    entry.speedup = Some(round_hundredths(ansible.seconds / direct.seconds));
                }
            }
        }

        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            hosts,
            workloads: entries,
        }
    }
}

/// Writes the report as pretty JSON to the given path.
///
/// # Errors
///
/// Fails if serialization or the write fails.
pub fn record_results(path: &Path, report: &Report) -> anyhow::Result<()> {
    let mut contents =
        serde_json::to_string_pretty(report).context("could not serialize report")?;
    contents.push('\n');
    fs::write(path, contents)
        .with_context(|| format!("could not write results to {}", path.display()))?;
    log::info!("wrote results to {}", path.display());
    Ok(())
}

/// Prints the aligned summary table.
pub fn print_results(report: &Report) {
    let fmt = |result: &Option<FrameworkResult>| {
        result
            .as_ref()
            .filter(|r| r.success)
            .map_or_else(|| "n/a".to_string(), |r| format!("{:.3}s", r.seconds))
    };

    println!();
    println!("  SUMMARY ({} hosts)", report.hosts);
    println!(
        "  {:<25} {:>10} {:>10} {:>10}",
        "Test", "Ansible", "Direct", "Speedup"
    );
    println!("  {:-<25} {:->10} {:->10} {:->10}", "", "", "", "");
    for (name, entry) in &report.workloads {
        let speedup = entry
            .speedup
            .map_or_else(|| "n/a".to_string(), |s| format!("{s:.1}x"));
        println!(
            "  {name:<25} {:>10} {:>10} {speedup:>10}",
            fmt(&entry.ansible),
            fmt(&entry.direct)
        );
    }
    println!();
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
