//! The production [Execute] implementation.

use super::{Execute, LocalNames, PipeOutput};
use crate::config::RunConfig;
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io;
use tokio::process::Command;
use tracing::debug;

/// Runs commands through `sh -c` on the local machine and through `ssh` everywhere else.
///
/// Each command gets its own `ssh` process and therefore its own login. If no private key is
/// configured, `ssh` asks the operator for a password on the terminal every time; nothing is
/// cached between commands.
#[derive(Clone, Debug)]
pub struct SshExecutor {
    port: u16,
    identity: Option<PathBuf>,
    login_user: String,
    local: LocalNames,
}

impl SshExecutor {
    /// Creates an executor for the connection settings in `config`.
    pub fn new(config: &RunConfig) -> Self {
        Self::with_local_names(config, LocalNames::detect().clone())
    }

    /// Like [Self::new], but with an explicit idea of which host names are local.
    pub fn with_local_names(config: &RunConfig, local: LocalNames) -> Self {
        Self {
            port: config.port,
            identity: config.identity.clone(),
            login_user: config.login_user.clone(),
            local,
        }
    }

    /// Builds the process that runs `command` on `host`.
    ///
    /// `connect_timeout` bounds how long `ssh` waits to reach a remote host. It has no effect on
    /// local hosts.
    pub fn command(&self, host: &str, command: &str, connect_timeout: Option<Duration>) -> Command {
        if self.local.is_local(host) {
            let mut local = Command::new("sh");
            local.arg("-c").arg(command);
            return local;
        }

        let mut ssh = Command::new("ssh");
        ssh.arg("-p").arg(self.port.to_string());
        if let Some(identity) = &self.identity {
            ssh.arg("-i").arg(identity);
        }
        if let Some(timeout) = connect_timeout {
            // ssh only understands whole seconds, and zero means "use the system default".
            let seconds = timeout.as_secs().max(1);
            ssh.arg("-o").arg(format!("ConnectTimeout={seconds}"));
        }
        ssh.arg("--")
            .arg(format!("{}@{host}", self.login_user))
            .arg(command);
        ssh
    }
}

#[async_trait]
impl Execute for SshExecutor {
    async fn run(&mut self, host: &str, command: &str) -> anyhow::Result<Output> {
        debug!("[{host}] running: {command}");
        self.command(host, command, None)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to start command for {host}: {command}"))
    }

    async fn probe(&mut self, host: &str, timeout: Duration) -> bool {
        if self.local.is_local(host) {
            return true;
        }

        let output = self
            .command(host, "true", Some(timeout))
            .stdin(Stdio::null())
            .output()
            .await;
        match output {
            Ok(output) if output.status.success() => true,
            Ok(output) => {
                debug!(
                    "[{host}] probe failed: {}",
                    super::describe_failure(&output)
                );
                false
            }
            Err(error) => {
                debug!("[{host}] probe could not start ssh: {error}");
                false
            }
        }
    }

    async fn pipe(
        &mut self,
        source: &str,
        producer: &str,
        target: &str,
        consumer: &str,
    ) -> anyhow::Result<PipeOutput> {
        debug!("[{source}] -> [{target}] streaming: {producer} | {consumer}");

        let mut producer_child = self
            .command(source, producer, None)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start command for {source}: {producer}"))?;

        let mut consumer_child = self
            .command(target, consumer, None)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to start command for {target}: {consumer}"))?;

        let mut reader = producer_child
            .stdout
            .take()
            .context("producer's standard output was not captured")?;
        let mut writer = consumer_child
            .stdin
            .take()
            .context("consumer's standard input was not captured")?;

        let stream = async move {
            let copied = io::copy(&mut reader, &mut writer).await;
            // The consumer sees end-of-stream only once its stdin is closed.
            drop(writer);
            copied
        };

        let (copied, producer_output, consumer_output) = tokio::join!(
            stream,
            producer_child.wait_with_output(),
            consumer_child.wait_with_output(),
        );

        let output = PipeOutput {
            producer: producer_output
                .with_context(|| format!("failed waiting for command on {source}: {producer}"))?,
            consumer: consumer_output
                .with_context(|| format!("failed waiting for command on {target}: {consumer}"))?,
            bytes: 0,
        };

        match copied {
            Ok(bytes) => Ok(PipeOutput { bytes, ..output }),
            // If either end failed, its exit status and stderr explain the broken stream better
            // than the copy error does.
            Err(error) if !output.success() => {
                debug!("[{source}] -> [{target}] stream interrupted: {error}");
                Ok(output)
            }
            Err(error) => Err(error).context(format!(
                "stream from {source} to {target} broke although both ends succeeded"
            )),
        }
    }
}
