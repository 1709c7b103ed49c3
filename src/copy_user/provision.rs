//! Creates the account on a target, and removes an existing one when the operator asks to.

use super::Remote;
use crate::account::{ShadowRecord, SourceAccount};
use crate::command::RemoteCommand;
use crate::executor::{describe_failure, Execute};
use anyhow::{bail, Context};
use tracing::{debug, info};

/// Whether `username` has a passwd entry on `host`.
///
/// # Errors
///
/// Returns an error if the lookup could not give an answer, for instance because ssh lost the
/// connection.
pub async fn account_exists<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    host: &str,
    username: &str,
) -> anyhow::Result<bool> {
    let command = RemoteCommand::LookupPasswd {
        user: username.to_owned(),
    };
    let output = remote.run(host, &command).await?;
    if output.status.success() {
        return Ok(!output.stdout.iter().all(u8::is_ascii_whitespace));
    }
    if command.answers_no(output.status) {
        return Ok(false);
    }
    bail!("`{command}` failed on {host}: {}", describe_failure(&output))
}

/// Deletes `username` and its home directory from `host`.
pub async fn purge<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    host: &str,
    username: &str,
) -> anyhow::Result<()> {
    info!("[{host}] removing existing account {username} and its home directory");
    remote
        .ensure(host, &RemoteCommand::DeleteUser {
            user: username.to_owned(),
        })
        .await
        .with_context(|| format!("failed to remove existing account {username}"))
}

/// Creates the account on `host` with the source's ids, home, shell, and comment.
///
/// Creates the primary group first if no group on `host` has its gid, and sets the password hash
/// afterward if the source has a usable one.
pub async fn create<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    host: &str,
    source: &SourceAccount,
) -> anyhow::Result<()> {
    let account = &source.account;
    let gid = account.gid;

    let group_exists = remote
        .check(host, &RemoteCommand::LookupGroupById { gid })
        .await
        .context("failed to look up the primary group")?;
    if !group_exists {
        let name = source.groups.primary_group_name(gid);
        info!("[{host}] creating group {name} with gid {gid}");
        remote
            .ensure(host, &RemoteCommand::AddGroup { name, gid })
            .await
            .context("failed to create the primary group")?;
    }

    let spec = account.spec();
    if remote.dry_run() {
        info!("[{host}] would create account {spec}");
    } else {
        info!("[{host}] creating account {spec}");
    }
    remote
        .ensure(host, &RemoteCommand::AddUser(spec))
        .await
        .with_context(|| format!("failed to create account {}", account.name))?;

    match source.shadow.as_ref().and_then(ShadowRecord::usable_hash) {
        Some(hash) => remote
            .ensure(host, &RemoteCommand::SetPasswordHash {
                user: account.name.clone(),
                hash: hash.to_owned(),
            })
            .await
            .context("failed to set the password hash")?,
        None => debug!("[{host}] no usable password hash; the password stays locked"),
    }
    Ok(())
}
