//! Reports how each target fared.

use super::{RunSummary, Stage, Status, TargetOutcome};
use std::io::{self, Write};

/// The one-line result for a target, e.g. `User alice successfully copied to host2`.
pub fn status_line(username: &str, outcome: &TargetOutcome) -> String {
    let host = &outcome.host;
    match outcome.status() {
        Status::Skipped => format!("Skipping {host}"),
        Status::Failed => {
            let stage = outcome.failed_stage.unwrap_or(Stage::Failed);
            format!("Failed to copy user {username} to {host} at {stage}")
        }
        Status::Copied if outcome.degraded.is_empty() => {
            format!("User {username} successfully copied to {host}")
        }
        Status::Copied => format!(
            "User {username} copied to {host} with warnings: {} incomplete",
            join(&outcome.degraded)
        ),
    }
}

/// Writes a line per target followed by the totals for the run.
pub fn write_summary<W: Write>(mut out: W, summary: &RunSummary) -> io::Result<()> {
    let width = summary
        .outcomes
        .iter()
        .map(|outcome| outcome.host.len())
        .max()
        .unwrap_or(0);

    for outcome in &summary.outcomes {
        let result = match outcome.status() {
            Status::Copied if outcome.degraded.is_empty() => "copied".to_owned(),
            Status::Copied => format!("copied, incomplete {}", join(&outcome.degraded)),
            Status::Skipped => "skipped".to_owned(),
            Status::Failed => match outcome.failed_stage {
                Some(stage) => format!("failed at {stage}"),
                None => "failed".to_owned(),
            },
        };
        writeln!(out, "  {:<width$}  {result}", outcome.host)?;
    }

    writeln!(
        out,
        "Finished copying {}: {} copied, {} skipped, {} failed",
        summary.username,
        summary.count(Status::Copied),
        summary.count(Status::Skipped),
        summary.count(Status::Failed),
    )
}

fn join(stages: &[Stage]) -> String {
    stages
        .iter()
        .map(Stage::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use Stage::*;

    fn outcome(host: &str, trail: &[Stage], failed: Option<Stage>, degraded: &[Stage]) -> TargetOutcome {
        TargetOutcome {
            host: host.to_owned(),
            trail: trail.to_vec(),
            failed_stage: failed,
            degraded: degraded.to_vec(),
        }
    }

    fn copied(host: &str) -> TargetOutcome {
        outcome(host, &[Start, Provisioned, Done], None, &[])
    }

    #[test]
    fn status_lines() {
        assert_eq!(
            "User alice successfully copied to host2",
            status_line("alice", &copied("host2"))
        );
        assert_eq!(
            "Skipping host2",
            status_line("alice", &outcome("host2", &[Start, ConflictCheck, Skipped], None, &[]))
        );
        assert_eq!(
            "Failed to copy user alice to h1 at connectivity check",
            status_line(
                "alice",
                &outcome("h1", &[Start, ConnectivityCheck, Failed], Some(ConnectivityCheck), &[])
            )
        );
        assert_eq!(
            "User alice copied to h3 with warnings: home directory copy, group sync incomplete",
            status_line(
                "alice",
                &outcome("h3", &[Start, Done], None, &[HomeCopied, GroupsSynced])
            )
        );
    }

    #[test]
    fn summary_lists_targets_and_totals() {
        let summary = RunSummary {
            username: "alice".into(),
            outcomes: vec![
                outcome("h1", &[Start, ConnectivityCheck, Failed], Some(ConnectivityCheck), &[]),
                copied("host2"),
                outcome("h3", &[Start, ConflictCheck, Skipped], None, &[]),
                outcome("h4", &[Start, Done], None, &[KeysCopied]),
            ],
        };

        let mut out = vec![];
        write_summary(&mut out, &summary).unwrap();
        assert_eq!(
            "  h1     failed at connectivity check\n\
             \x20 host2  copied\n\
             \x20 h3     skipped\n\
             \x20 h4     copied, incomplete SSH key copy\n\
             Finished copying alice: 2 copied, 1 skipped, 1 failed\n",
            String::from_utf8_lossy(&out),
        );
    }

    #[test]
    fn empty_summary() {
        let summary = RunSummary {
            username: "bob".into(),
            outcomes: vec![],
        };
        let mut out = vec![];
        write_summary(&mut out, &summary).unwrap();
        assert_eq!(
            "Finished copying bob: 0 copied, 0 skipped, 0 failed\n",
            String::from_utf8_lossy(&out),
        );
    }
}
