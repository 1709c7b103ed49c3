//! Runs commands on hosts.
//!
//! This is the leaf of the program: everything else reaches hosts through the [Execute] trait.
//! The production implementation, [ssh::SshExecutor], runs commands locally through `sh -c` when
//! the host is the local machine and through the system `ssh` binary otherwise. Tests substitute a
//! recording fake.
//!
//! Executors never decide whether a failure is fatal. A command that runs and exits non-zero is an
//! [Ok] value carrying the exit status; an [Err] means the command could not be run at all (e.g.
//! the `ssh` binary is missing). Callers classify both.

#[cfg(test)]
pub mod fake;
pub mod ssh;

use async_trait::async_trait;
use std::process::{Command, Output};
use std::sync::OnceLock;
use std::time::Duration;

/// The interface every stage uses to reach hosts.
#[async_trait]
pub trait Execute {
    /// Runs a shell command on `host` and waits for it to finish.
    async fn run(&mut self, host: &str, command: &str) -> anyhow::Result<Output>;

    /// Checks whether `host` accepts a session within `timeout`.
    async fn probe(&mut self, host: &str, timeout: Duration) -> bool;

    /// Streams the standard output of `producer` on `source` into the standard input of
    /// `consumer` on `target`.
    ///
    /// The bytes pass through this process without touching disk, whichever of the two hosts (if
    /// any) is local.
    async fn pipe(
        &mut self,
        source: &str,
        producer: &str,
        target: &str,
        consumer: &str,
    ) -> anyhow::Result<PipeOutput>;
}

/// The result of an [Execute::pipe] call.
///
/// The producer's standard output is the stream itself, so it is never captured; everything else
/// from both ends is.
#[derive(Debug)]
pub struct PipeOutput {
    pub producer: Output,
    pub consumer: Output,

    /// The number of bytes that made it from producer to consumer.
    pub bytes: u64,
}

impl PipeOutput {
    /// Whether both ends exited successfully.
    pub fn success(&self) -> bool {
        self.producer.status.success() && self.consumer.status.success()
    }
}

/// Summarizes a failed [Output] in one line for a status message.
pub fn describe_failure(output: &Output) -> String {
    let status = match output.status.code() {
        Some(i) => format!("exit code {i}"),
        None => "terminated by signal".to_string(),
    };
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        status
    } else {
        format!("{status}: {stderr}")
    }
}

/// The names under which the local machine is known.
///
/// A host that matches one of these exactly is local, and commands for it run directly instead of
/// over SSH. This is the one place in the program that decides locality.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalNames {
    names: Vec<String>,
}

impl LocalNames {
    /// Creates a set containing `localhost` plus `names`.
    pub fn new<I: IntoIterator<Item = S>, S: Into<String>>(names: I) -> Self {
        let mut all = vec!["localhost".to_owned()];
        for name in names {
            let name = name.into();
            if !name.is_empty() && !all.contains(&name) {
                all.push(name);
            }
        }
        Self { names: all }
    }

    /// Returns `localhost` plus this machine's short and fully qualified host names.
    ///
    /// Computes the names on first call and returns the cached result on subsequent calls. A name
    /// that can't be determined is simply left out.
    pub fn detect() -> &'static Self {
        static COMPUTED: OnceLock<LocalNames> = OnceLock::new();
        COMPUTED.get_or_init(|| {
            LocalNames::new(
                [hostname(&["-s"]), hostname(&["-f"]), hostname(&[])]
                    .into_iter()
                    .flatten(),
            )
        })
    }

    /// Whether `host` names the local machine.
    pub fn is_local(&self, host: &str) -> bool {
        self.names.iter().any(|name| name == host)
    }
}

// Invokes the `hostname` system utility. Returns None on any failure.
fn hostname(args: &[&str]) -> Option<String> {
    match Command::new("hostname").args(args).output() {
        Ok(Output { status, stdout, .. }) if status.success() => {
            let name = String::from_utf8(stdout).ok()?.trim().to_owned();
            (!name.is_empty()).then_some(name)
        }
        _ => None,
    }
}
