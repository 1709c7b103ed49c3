//! Copies one account from the source host to every target host.
//!
//! [copy_user] is the entry point. It takes a single snapshot of the account on the source host,
//! then walks each target through the same sequence of stages, one target at a time:
//!
//! ```text
//! Start -> ConnectivityCheck -> ConflictCheck -> (Skipped | Purge?) -> Provisioned
//!       -> HomeCopied -> KeysCopied -> GroupsSynced -> Done
//! ```
//!
//! A target that can't be reached or whose account can't be created ends in `Failed` and the run
//! moves on to the next target. Failures after provisioning only degrade the target: they are
//! logged as warnings and the remaining stages still run.
//!
//! Every command a stage sends goes through [Remote], which holds mutating commands back in
//! dry-run mode.

pub mod acl;
pub mod conflict;
pub mod groups;
pub mod provision;
pub mod summary;
pub mod tree;

use crate::account::{self, RecordError, SourceAccount};
use crate::command::RemoteCommand;
use crate::config::RunConfig;
use crate::error::Error;
use crate::executor::{describe_failure, Execute};
use anyhow::bail;
use conflict::{Resolution, ResolveConflict};
use std::fmt::{self, Display};
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Output};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A state in a target's progress through the copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Start,
    ConnectivityCheck,
    ConflictCheck,
    Skipped,
    Purge,
    Provisioned,
    HomeCopied,
    KeysCopied,
    GroupsSynced,
    Done,
    Failed,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Stage::*;
        let name = match self {
            Start => "start",
            ConnectivityCheck => "connectivity check",
            ConflictCheck => "conflict check",
            Skipped => "skipped",
            Purge => "removal of the existing account",
            Provisioned => "account creation",
            HomeCopied => "home directory copy",
            KeysCopied => "SSH key copy",
            GroupsSynced => "group sync",
            Done => "done",
            Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a target ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Copied,
    Skipped,
    Failed,
}

/// The result of copying the account to one target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetOutcome {
    pub host: String,

    /// Every stage the target passed through, in order, starting with [Stage::Start].
    pub trail: Vec<Stage>,

    /// The stage that ended this target early, if any.
    pub failed_stage: Option<Stage>,

    /// Stages that failed without stopping the target.
    pub degraded: Vec<Stage>,
}

impl TargetOutcome {
    fn new(host: &str) -> Self {
        Self {
            host: host.to_owned(),
            trail: vec![Stage::Start],
            failed_stage: None,
            degraded: vec![],
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.trail.push(stage);
    }

    fn fail(mut self, stage: Stage) -> Self {
        self.failed_stage = Some(stage);
        self.trail.push(Stage::Failed);
        self
    }

    fn degrade(&mut self, stage: Stage) {
        self.degraded.push(stage);
    }

    /// Whether the target finished without a fatal failure. Skipped targets count as successes.
    pub fn succeeded(&self) -> bool {
        self.failed_stage.is_none()
    }

    pub fn status(&self) -> Status {
        if self.failed_stage.is_some() {
            Status::Failed
        } else if self.trail.last() == Some(&Stage::Skipped) {
            Status::Skipped
        } else {
            Status::Copied
        }
    }
}

/// The outcome of a whole run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub username: String,

    /// One outcome per target, in the order the targets were processed.
    pub outcomes: Vec<TargetOutcome>,
}

impl RunSummary {
    /// The number of targets that ended with `status`.
    pub fn count(&self, status: Status) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status() == status)
            .count()
    }

    pub fn any_failed(&self) -> bool {
        self.count(Status::Failed) > 0
    }
}

/// Sends [RemoteCommand]s to an executor, except for mutating ones in dry-run mode.
///
/// In dry-run mode a mutating command is logged instead of sent, and reported as having
/// succeeded. Read-only commands always go through, so dry runs still see the real state of each
/// host.
pub struct Remote<'a, E: ?Sized> {
    executor: &'a mut E,
    dry_run: bool,
}

impl<'a, E: Execute + ?Sized> Remote<'a, E> {
    pub fn new(executor: &'a mut E, dry_run: bool) -> Self {
        Self { executor, dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// The underlying executor, for the source snapshot's read-only lookups.
    pub(crate) fn executor(&mut self) -> &mut E {
        &mut *self.executor
    }

    pub async fn probe(&mut self, host: &str, timeout: Duration) -> bool {
        self.executor.probe(host, timeout).await
    }

    /// Runs `command` on `host` and returns its output, whatever its exit status.
    ///
    /// # Errors
    ///
    /// Returns an error if the command could not be run at all.
    pub async fn run(&mut self, host: &str, command: &RemoteCommand) -> anyhow::Result<Output> {
        if self.dry_run && command.is_mutating() {
            info!("[dry-run] {host}: {command}");
            return Ok(Output {
                status: ExitStatus::from_raw(0),
                stdout: vec![],
                stderr: vec![],
            });
        }
        let shell = command.to_shell()?;
        self.executor.run(host, &shell).await
    }

    /// Runs a command whose exit status is the answer to a yes-or-no question.
    ///
    /// # Errors
    ///
    /// Returns an error if the command exits with a status that is neither yes nor the command's
    /// own "no", such as ssh failing to reach the host.
    pub async fn check(&mut self, host: &str, command: &RemoteCommand) -> anyhow::Result<bool> {
        let output = self.run(host, command).await?;
        if output.status.success() {
            return Ok(true);
        }
        if command.answers_no(output.status) {
            return Ok(false);
        }
        bail!("`{command}` failed on {host}: {}", describe_failure(&output));
    }

    /// Runs a command that must succeed.
    pub async fn ensure(&mut self, host: &str, command: &RemoteCommand) -> anyhow::Result<()> {
        let output = self.run(host, command).await?;
        if !output.status.success() {
            bail!("`{command}` failed on {host}: {}", describe_failure(&output));
        }
        Ok(())
    }

    /// Streams the output of `producer` on `source` into `consumer` on `target`. Both ends must
    /// succeed.
    ///
    /// Returns the number of bytes streamed.
    pub async fn stream(
        &mut self,
        source: &str,
        producer: &RemoteCommand,
        target: &str,
        consumer: &RemoteCommand,
    ) -> anyhow::Result<u64> {
        if self.dry_run && (producer.is_mutating() || consumer.is_mutating()) {
            info!("[dry-run] {source} -> {target}: {producer} | {consumer}");
            return Ok(0);
        }

        let output = self
            .executor
            .pipe(source, &producer.to_shell()?, target, &consumer.to_shell()?)
            .await?;
        if !output.producer.status.success() {
            bail!(
                "`{producer}` failed on {source}: {}",
                describe_failure(&output.producer)
            );
        }
        if !output.consumer.status.success() {
            bail!(
                "`{consumer}` failed on {target}: {}",
                describe_failure(&output.consumer)
            );
        }
        debug!("[{target}] received {} bytes from {source}", output.bytes);
        Ok(output.bytes)
    }
}

/// Copies the account named in `config` from its source host to each of its targets.
///
/// Targets are processed one at a time, in order. A failure on one target never stops the others.
///
/// # Errors
///
/// Returns an error, before any target is contacted, if the source host can't be reached or the
/// account can't be found on it.
pub async fn copy_user<E: Execute + ?Sized>(
    config: &RunConfig,
    executor: &mut E,
    resolver: &mut dyn ResolveConflict,
) -> Result<RunSummary, Error> {
    let mut remote = Remote::new(executor, config.dry_run);
    if config.dry_run {
        info!("Dry run: no changes will be made on any host");
    }

    let source = snapshot(&mut remote, config).await?;
    info!(
        "Copying user {} from {} to {}",
        config.username,
        config.source,
        config.targets.join(", ")
    );

    let mut outcomes = Vec::with_capacity(config.targets.len());
    for target in &config.targets {
        let outcome = copy_to_target(&mut remote, config, &source, target, resolver).await;
        match outcome.status() {
            Status::Failed => error!("{}", summary::status_line(&config.username, &outcome)),
            _ => info!("{}", summary::status_line(&config.username, &outcome)),
        }
        outcomes.push(outcome);
    }

    Ok(RunSummary {
        username: config.username.clone(),
        outcomes,
    })
}

/// Captures everything about the account on the source host that the targets need.
async fn snapshot<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    config: &RunConfig,
) -> Result<SourceAccount, Error> {
    let host = config.source.as_str();
    let username = config.username.as_str();

    if !remote.probe(host, config.connect_timeout).await {
        return Err(Error::SourceUnreachable(host.to_owned()));
    }

    let executor = remote.executor();
    let account = account::fetch_account(&mut *executor, host, username)
        .await
        .map_err(|error| source_error(host, error))?
        .ok_or_else(|| Error::SourceAccountNotFound {
            user: username.to_owned(),
            host: host.to_owned(),
        })?;
    let shadow = account::fetch_shadow(&mut *executor, host, username)
        .await
        .map_err(|error| source_error(host, error))?;
    let groups = account::fetch_groups(executor, host, username)
        .await
        .map_err(|error| source_error(host, error))?;

    debug!("[{host}] found {}", account.spec());
    if shadow.as_ref().and_then(|s| s.usable_hash()).is_none() {
        debug!("[{host}] {username} has no usable password hash");
    }

    Ok(SourceAccount {
        account,
        shadow,
        groups,
    })
}

fn source_error(host: &str, error: anyhow::Error) -> Error {
    match error.downcast::<RecordError>() {
        Ok(record) => Error::Record(record),
        Err(error) => Error::SourceLookup {
            host: host.to_owned(),
            source: error,
        },
    }
}

/// Walks one target through every stage of the copy.
pub async fn copy_to_target<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    config: &RunConfig,
    source: &SourceAccount,
    target: &str,
    resolver: &mut dyn ResolveConflict,
) -> TargetOutcome {
    let username = config.username.as_str();
    let mut outcome = TargetOutcome::new(target);

    outcome.enter(Stage::ConnectivityCheck);
    if !remote.probe(target, config.connect_timeout).await {
        error!("[{target}] host is unreachable");
        return outcome.fail(Stage::ConnectivityCheck);
    }

    outcome.enter(Stage::ConflictCheck);
    let exists = match provision::account_exists(remote, target, username).await {
        Ok(exists) => exists,
        Err(error) => {
            error!("[{target}] could not check for an existing account: {error:#}");
            return outcome.fail(Stage::ConflictCheck);
        }
    };

    if exists {
        let resolution = resolver.resolve(target, username).unwrap_or_else(|error| {
            warn!("[{target}] could not ask whether to overwrite {username}: {error:#}");
            Resolution::Skip
        });
        if resolution == Resolution::Skip {
            outcome.enter(Stage::Skipped);
            return outcome;
        }

        outcome.enter(Stage::Purge);
        if let Err(error) = provision::purge(remote, target, username).await {
            error!("[{target}] {error:#}");
            return outcome.fail(Stage::Purge);
        }
    }

    if let Err(error) = provision::create(remote, target, source).await {
        error!("[{target}] {error:#}");
        return outcome.fail(Stage::Provisioned);
    }
    outcome.enter(Stage::Provisioned);

    let home = source.account.home.as_str();
    if let Err(error) = tree::replicate_tree(remote, config, target, home, &source.account).await {
        warn!("[{target}] home directory copy failed: {error:#}");
        outcome.degrade(Stage::HomeCopied);
    }
    outcome.enter(Stage::HomeCopied);

    if let Err(error) = tree::replicate_ssh_dir(remote, config, target, &source.account).await {
        warn!("[{target}] SSH key copy failed: {error:#}");
        outcome.degrade(Stage::KeysCopied);
    }
    outcome.enter(Stage::KeysCopied);

    if let Err(error) = groups::sync_groups(remote, target, username, &source.groups).await {
        warn!("[{target}] group sync incomplete: {error:#}");
        outcome.degrade(Stage::GroupsSynced);
    }
    outcome.enter(Stage::GroupsSynced);

    outcome.enter(Stage::Done);
    outcome
}
