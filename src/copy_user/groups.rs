//! Adds the account to its secondary groups on a target.

use super::Remote;
use crate::account::GroupMembership;
use crate::command::RemoteCommand;
use crate::executor::Execute;
use anyhow::bail;
use tracing::{info, warn};

/// Adds `username` on `host` to every secondary group it has on the source host.
///
/// Groups that don't exist on `host` are logged and left out; they are not errors.
///
/// # Errors
///
/// Returns an error naming every group the account could not be added to.
pub async fn sync_groups<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    host: &str,
    username: &str,
    groups: &GroupMembership,
) -> anyhow::Result<()> {
    let mut failed = Vec::new();

    for group in groups.secondary(username) {
        let lookup = RemoteCommand::LookupGroup {
            name: group.to_owned(),
        };
        if !remote.check(host, &lookup).await? {
            warn!("[{host}] group {group} does not exist; not adding {username} to it");
            continue;
        }

        let add = RemoteCommand::AddToGroup {
            user: username.to_owned(),
            group: group.to_owned(),
        };
        match remote.ensure(host, &add).await {
            Ok(()) => info!("[{host}] added {username} to {group}"),
            Err(error) => {
                warn!("[{host}] {error:#}");
                failed.push(group);
            }
        }
    }

    if !failed.is_empty() {
        bail!("could not add {username} to {}", failed.join(", "));
    }
    Ok(())
}
