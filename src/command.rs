//! Typed remote commands.
//!
//! Every shell command the orchestrator sends to a host is a [RemoteCommand] variant. The variant
//! knows how to render itself as a single shell string, with every argument quoted, and whether
//! running it changes anything on the host. The second part is what makes dry-run mode work: the
//! gate in [Remote] refuses to forward mutating commands to an executor when dry-run is on.
//!
//! [Remote]: crate::copy_user::Remote

use shlex::{QuoteError, Quoter};
use std::fmt::{self, Display};
use std::process::ExitStatus;

/// The exit status ssh reports when it could not reach or talk to the host.
pub const SSH_FAILURE: i32 = 255;

/// Parameters for creating an account, exactly as captured on the source host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSpec {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: String,
    pub shell: String,
    pub comment: String,
}

impl Display for AccountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (uid={}, gid={}, home={}, shell={}, comment={:?})",
            self.name, self.uid, self.gid, self.home, self.shell, self.comment,
        )
    }
}

/// A command to run on one host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCommand {
    /// `getent passwd <user>`
    LookupPasswd { user: String },

    /// `getent shadow <user>`
    LookupShadow { user: String },

    /// `id -gn <user>`: the name of the user's primary group.
    PrimaryGroup { user: String },

    /// `id -Gn <user>`: every group the user belongs to.
    Groups { user: String },

    /// `getent group <gid>`
    LookupGroupById { gid: u32 },

    /// `getent group <name>`
    LookupGroup { name: String },

    /// `test -d <path>`
    DirExists { path: String },

    /// `command -v <tool>`
    HasTool { tool: String },

    /// Packs a directory's contents into a tar stream on stdout.
    PackTree { path: String },

    /// Dumps the ACLs of a directory tree, with absolute paths, to stdout.
    DumpAcl { path: String },

    /// `groupadd -g <gid> <name>`
    AddGroup { name: String, gid: u32 },

    /// `useradd` with the exact ids, home, shell, and comment. Does not create the home directory.
    AddUser(AccountSpec),

    /// Sets an already-hashed password, verbatim, through `chpasswd -e`.
    SetPasswordHash { user: String, hash: String },

    /// `userdel -r <user>`: removes the account and its home directory.
    DeleteUser { user: String },

    /// `mkdir -p <path>`
    MakeDir { path: String },

    /// `chown -R <uid>:<gid> <path>`
    Chown { path: String, uid: u32, gid: u32 },

    /// Restricts an SSH directory to its owner and fixes the modes of the files inside it.
    ///
    /// The directory becomes `700`, files named `*.pub` become `644`, and every other file
    /// becomes `600`.
    SecureSshDir { path: String },

    /// `usermod -a -G <group> <user>`
    AddToGroup { user: String, group: String },

    /// Unpacks a tar stream from stdin into a directory.
    UnpackTree { path: String },

    /// Restores ACLs from a `getfacl` dump on stdin.
    RestoreAcl,
}

impl RemoteCommand {
    /// Whether running this command changes anything on the host.
    pub fn is_mutating(&self) -> bool {
        use RemoteCommand::*;
        match self {
            LookupPasswd { .. }
            | LookupShadow { .. }
            | PrimaryGroup { .. }
            | Groups { .. }
            | LookupGroupById { .. }
            | LookupGroup { .. }
            | DirExists { .. }
            | HasTool { .. }
            | PackTree { .. }
            | DumpAcl { .. } => false,
            AddGroup { .. }
            | AddUser(_)
            | SetPasswordHash { .. }
            | DeleteUser { .. }
            | MakeDir { .. }
            | Chown { .. }
            | SecureSshDir { .. }
            | AddToGroup { .. }
            | UnpackTree { .. }
            | RestoreAcl => true,
        }
    }

    /// Whether `status` is this command's way of answering "no" or "not found", as opposed to a
    /// failure to answer at all.
    ///
    /// `getent` exits 2 for a missing key, `id` and `test` exit 1. Anything else, including ssh's
    /// own 255, means the question went unanswered. Mutating commands never answer "no".
    pub fn answers_no(&self, status: ExitStatus) -> bool {
        use RemoteCommand::*;
        let code = status.code();
        match self {
            LookupPasswd { .. }
            | LookupShadow { .. }
            | LookupGroupById { .. }
            | LookupGroup { .. } => code == Some(2),
            PrimaryGroup { .. } | Groups { .. } | DirExists { .. } => code == Some(1),
            // Shells disagree on the exit code for a missing tool.
            HasTool { .. } => matches!(code, Some(c) if c != 0 && c != SSH_FAILURE),
            _ => false,
        }
    }

    /// Renders this command as a shell string, quoting every argument.
    ///
    /// # Errors
    ///
    /// Returns an error if an argument cannot be quoted, which only happens if it contains a NUL
    /// byte.
    pub fn to_shell(&self) -> Result<String, QuoteError> {
        use RemoteCommand::*;
        match self {
            LookupPasswd { user } => join(["getent", "passwd", user]),
            LookupShadow { user } => join(["getent", "shadow", user]),
            PrimaryGroup { user } => join(["id", "-gn", user]),
            Groups { user } => join(["id", "-Gn", user]),
            LookupGroupById { gid } => join(["getent", "group", &gid.to_string()]),
            LookupGroup { name } => join(["getent", "group", name]),
            DirExists { path } => join(["test", "-d", path]),
            HasTool { tool } => join(["command", "-v", tool]),
            PackTree { path } => join(["tar", "-C", path, "-cpf", "-", "."]),
            DumpAcl { path } => join(["getfacl", "-R", "-p", path]),
            AddGroup { name, gid } => join(["groupadd", "-g", &gid.to_string(), name]),
            AddUser(spec) => join([
                "useradd",
                "-u",
                &spec.uid.to_string(),
                "-g",
                &spec.gid.to_string(),
                "-d",
                &spec.home,
                "-s",
                &spec.shell,
                "-c",
                &spec.comment,
                "-M",
                &spec.name,
            ]),
            SetPasswordHash { user, hash } => {
                let entry = format!("{user}:{hash}");
                Ok(format!(
                    "{} | {}",
                    join(["printf", "%s\\n", &entry])?,
                    join(["chpasswd", "-e"])?,
                ))
            }
            DeleteUser { user } => join(["userdel", "-r", user]),
            MakeDir { path } => join(["mkdir", "-p", path]),
            Chown { path, uid, gid } => join(["chown", "-R", &format!("{uid}:{gid}"), path]),
            SecureSshDir { path } => Ok([
                join(["chmod", "700", path])?,
                join([
                    "find", path, "-type", "f", "!", "-name", "*.pub", "-exec", "chmod", "600",
                    "{}", "+",
                ])?,
                join([
                    "find", path, "-type", "f", "-name", "*.pub", "-exec", "chmod", "644", "{}",
                    "+",
                ])?,
            ]
            .join(" && ")),
            AddToGroup { user, group } => join(["usermod", "-a", "-G", group, user]),
            UnpackTree { path } => join(["tar", "-C", path, "-xpf", "-"]),
            RestoreAcl => join(["setfacl", "--restore=-"]),
        }
    }
}

/// Displays the shell string, except that password hashes are left out so they never reach a
/// status line.
impl Display for RemoteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let RemoteCommand::SetPasswordHash { user, .. } = self {
            return write!(f, "chpasswd -e <<< '{user}:<hash>'");
        }
        match self.to_shell() {
            Ok(shell) => f.write_str(&shell),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}

fn join<'a, const N: usize>(words: [&'a str; N]) -> Result<String, QuoteError> {
    Quoter::new().join(words)
}

#[cfg(test)]
mod test;
