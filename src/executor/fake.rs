//! A recording [Execute] implementation for tests.
//!
//! Every command is recorded along with the host it was sent to, so tests can assert on exactly
//! what each host would have seen. Responses are scripted per host by command prefix; anything
//! unscripted succeeds with empty output.

use super::{Execute, PipeOutput};
use anyhow::bail;
use async_trait::async_trait;
use std::collections::HashSet;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::time::Duration;

/// One command sent to one host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub host: String,
    pub command: String,
}

#[derive(Clone, Debug)]
struct Response {
    host: String,
    prefix: String,
    code: i32,
    stdout: String,
    stderr: String,
}

#[derive(Clone, Debug, Default)]
pub struct FakeExecutor {
    // Scripted responses. Later entries win over earlier ones.
    responses: Vec<Response>,

    // Hosts that fail the reachability probe.
    unreachable: HashSet<String>,

    // Hosts where commands can't even be started, as if the ssh binary were missing.
    broken: HashSet<String>,

    // Every command run, in order, including both ends of pipes.
    records: Vec<Record>,

    // Every host probed, in order.
    probes: Vec<String>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the response to commands on `host` that start with `prefix`.
    pub fn respond(
        &mut self,
        host: impl Into<String>,
        prefix: impl Into<String>,
        code: i32,
        stdout: impl Into<String>,
    ) -> &mut Self {
        self.responses.push(Response {
            host: host.into(),
            prefix: prefix.into(),
            code,
            stdout: stdout.into(),
            stderr: String::new(),
        });
        self
    }

    /// Scripts a failure, with a message on stderr, for commands on `host` starting with `prefix`.
    pub fn fail(
        &mut self,
        host: impl Into<String>,
        prefix: impl Into<String>,
        code: i32,
        stderr: impl Into<String>,
    ) -> &mut Self {
        self.responses.push(Response {
            host: host.into(),
            prefix: prefix.into(),
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        });
        self
    }

    pub fn set_unreachable(&mut self, host: impl Into<String>) {
        self.unreachable.insert(host.into());
    }

    pub fn set_broken(&mut self, host: impl Into<String>) {
        self.broken.insert(host.into());
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn probes(&self) -> &[String] {
        &self.probes
    }

    /// The commands sent to `host`, in order.
    pub fn commands_for(&self, host: &str) -> Vec<&str> {
        self.records
            .iter()
            .filter(|record| record.host == host)
            .map(|record| record.command.as_str())
            .collect()
    }

    /// Whether any command sent to `host` starts with `prefix`.
    pub fn ran(&self, host: &str, prefix: &str) -> bool {
        self.commands_for(host)
            .iter()
            .any(|command| command.starts_with(prefix))
    }

    fn output_for(&self, host: &str, command: &str) -> Output {
        let response = self
            .responses
            .iter()
            .rev()
            .find(|r| r.host == host && command.starts_with(&r.prefix));
        match response {
            Some(r) => output(r.code, &r.stdout, &r.stderr),
            None => output(0, "", ""),
        }
    }

    fn record(&mut self, host: &str, command: &str) -> anyhow::Result<Output> {
        self.records.push(Record {
            host: host.to_owned(),
            command: command.to_owned(),
        });
        if self.broken.contains(host) {
            bail!("failed to start command for {host}: {command}");
        }
        Ok(self.output_for(host, command))
    }
}

/// Builds an [Output] with the given exit code.
pub fn output(code: i32, stdout: &str, stderr: &str) -> Output {
    Output {
        status: ExitStatus::from_raw(code << 8),
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

#[async_trait]
impl Execute for FakeExecutor {
    async fn run(&mut self, host: &str, command: &str) -> anyhow::Result<Output> {
        self.record(host, command)
    }

    async fn probe(&mut self, host: &str, _timeout: Duration) -> bool {
        self.probes.push(host.to_owned());
        !self.unreachable.contains(host)
    }

    async fn pipe(
        &mut self,
        source: &str,
        producer: &str,
        target: &str,
        consumer: &str,
    ) -> anyhow::Result<PipeOutput> {
        let producer = self.record(source, producer)?;
        let consumer = self.record(target, consumer)?;
        Ok(PipeOutput {
            producer,
            consumer,
            bytes: 0,
        })
    }
}
