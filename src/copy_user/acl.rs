//! Copies POSIX ACLs alongside a file tree.

use super::Remote;
use crate::command::RemoteCommand;
use crate::executor::Execute;
use tracing::{debug, warn};

/// What happened to the ACLs of a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AclOutcome {
    Copied,

    /// One of the hosts lacks the ACL tools.
    Skipped,

    /// The ACLs could not be dumped or restored.
    Failed,
}

/// Dumps the ACLs under `path` on `source` and restores them on `target` in a single stream.
///
/// Never fails the caller: missing tools and failed restores are logged as warnings.
pub async fn copy_acls<E: Execute + ?Sized>(
    remote: &mut Remote<'_, E>,
    source: &str,
    target: &str,
    path: &str,
) -> AclOutcome {
    if !has_tool(remote, source, "getfacl").await || !has_tool(remote, target, "setfacl").await {
        warn!("[{target}] skipping ACLs for {path}: getfacl or setfacl is not available");
        return AclOutcome::Skipped;
    }

    let dump = RemoteCommand::DumpAcl {
        path: path.to_owned(),
    };
    match remote
        .stream(source, &dump, target, &RemoteCommand::RestoreAcl)
        .await
    {
        Ok(_) => {
            debug!("[{target}] restored ACLs for {path}");
            AclOutcome::Copied
        }
        Err(error) => {
            warn!("[{target}] failed to copy ACLs for {path}: {error:#}");
            AclOutcome::Failed
        }
    }
}

async fn has_tool<E: Execute + ?Sized>(remote: &mut Remote<'_, E>, host: &str, tool: &str) -> bool {
    let command = RemoteCommand::HasTool {
        tool: tool.to_owned(),
    };
    match remote.check(host, &command).await {
        Ok(found) => found,
        Err(error) => {
            debug!("[{host}] could not look for {tool}: {error:#}");
            false
        }
    }
}
