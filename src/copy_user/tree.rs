//! Copies directory trees from the source host to a target.

use super::{acl, Remote};
use crate::account::AccountRecord;
use crate::command::RemoteCommand;
use crate::config::RunConfig;
use crate::executor::Execute;
use anyhow::{bail, Context};
use tracing::{debug, info, warn};

/// Copies the tree at `path` on the source host to the same path on `target`, then hands it to the
/// account.
///
/// Everything under `path` goes across in one tar stream, straight from source to target. ACLs
/// follow if `config.copy_acls` is set; problems with them are only warnings.
pub async fn replicate_tree<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    config: &RunConfig,
    target: &str,
    path: &str,
    account: &AccountRecord,
) -> anyhow::Result<()> {
    let source = config.source.as_str();
    if !remote
        .check(source, &RemoteCommand::DirExists { path: path.to_owned() })
        .await?
    {
        bail!("{path} does not exist on {source}");
    }

    remote
        .ensure(target, &RemoteCommand::MakeDir { path: path.to_owned() })
        .await?;

    let bytes = remote
        .stream(
            source,
            &RemoteCommand::PackTree { path: path.to_owned() },
            target,
            &RemoteCommand::UnpackTree { path: path.to_owned() },
        )
        .await
        .with_context(|| format!("failed to copy {path}"))?;
    debug!("[{target}] copied {path} ({bytes} bytes)");

    remote
        .ensure(target, &RemoteCommand::Chown {
            path: path.to_owned(),
            uid: account.uid,
            gid: account.gid,
        })
        .await?;

    if config.copy_acls {
        acl::copy_acls(remote, source, target, path).await;
    }
    Ok(())
}

/// Copies the account's `.ssh` directory and locks down its permissions.
///
/// The permissions are locked down even if the copy fails partway; the first error is returned.
///
/// An account without a `.ssh` directory on the source host has nothing to copy, which is not an
/// error.
pub async fn replicate_ssh_dir<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    config: &RunConfig,
    target: &str,
    account: &AccountRecord,
) -> anyhow::Result<()> {
    let path = account.ssh_dir();
    let present = remote
        .check(&config.source, &RemoteCommand::DirExists { path: path.clone() })
        .await?;
    if !present {
        info!("[{target}] {} has no SSH directory to copy", account.name);
        return Ok(());
    }

    // Whatever part of the copy landed must not keep the source's modes.
    let copied = replicate_tree(remote, config, target, &path, account).await;
    let secured = remote
        .ensure(target, &RemoteCommand::SecureSshDir { path })
        .await
        .context("failed to restrict SSH directory permissions");
    if let (Err(_), Err(error)) = (&copied, &secured) {
        warn!("[{target}] {error:#}");
    }
    copied.and(secured)
}
