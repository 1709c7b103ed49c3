//! Account records and the lookups that produce them.
//!
//! The passwd, shadow, and group databases hand back colon-separated lines. This module turns
//! those lines into typed records with named fields, so no other part of the program ever indexes
//! into a field list.
//!
//! The lookups themselves ([fetch_account], [fetch_shadow], [fetch_groups]) are read-only and go
//! straight to an [Execute] implementation; they run in dry-run mode too.

use crate::command::{AccountSpec, RemoteCommand};
use crate::executor::{describe_failure, Execute};
use anyhow::{bail, Context};
use indexmap::IndexSet;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// A line from an account database that doesn't have the expected shape.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("{kind} entry has {found} fields, expected {expected}")]
    FieldCount {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{field} is not a numeric id: {value:?}")]
    InvalidId { field: &'static str, value: String },
}

/// An account's passwd entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountRecord {
    pub name: String,

    /// The password field of the passwd entry. On any system with shadow passwords this is just a
    /// placeholder such as `x`.
    pub password: String,
    pub uid: u32,
    pub gid: u32,

    /// The GECOS field.
    pub comment: String,
    pub home: String,
    pub shell: String,
}

impl AccountRecord {
    /// Parses a passwd line, e.g. `alice:x:2001:2001:Alice:/home/alice:/bin/bash`.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(':').collect();
        let [name, password, uid, gid, comment, home, shell] = fields[..] else {
            return Err(RecordError::FieldCount {
                kind: "passwd",
                expected: 7,
                found: fields.len(),
            });
        };

        Ok(Self {
            name: name.to_owned(),
            password: password.to_owned(),
            uid: parse_id("uid", uid)?,
            gid: parse_id("gid", gid)?,
            comment: comment.to_owned(),
            home: home.to_owned(),
            shell: shell.to_owned(),
        })
    }

    /// The account's SSH directory.
    pub fn ssh_dir(&self) -> String {
        Path::new(&self.home)
            .join(".ssh")
            .to_string_lossy()
            .into_owned()
    }

    /// The parameters needed to recreate this account elsewhere.
    pub fn spec(&self) -> AccountSpec {
        AccountSpec {
            name: self.name.clone(),
            uid: self.uid,
            gid: self.gid,
            home: self.home.clone(),
            shell: self.shell.clone(),
            comment: self.comment.clone(),
        }
    }
}

/// An account's shadow entry. Only the hash matters here; the aging fields are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShadowRecord {
    pub name: String,
    pub hash: String,
}

impl ShadowRecord {
    /// Parses a shadow line, e.g. `alice:$6$salt$hash:19000:0:99999:7:::`.
    ///
    /// Only the first two fields are required, since platforms disagree on the rest.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let mut fields = line.trim_end_matches(['\r', '\n']).split(':');
        match (fields.next(), fields.next()) {
            (Some(name), Some(hash)) => Ok(Self {
                name: name.to_owned(),
                hash: hash.to_owned(),
            }),
            _ => Err(RecordError::FieldCount {
                kind: "shadow",
                expected: 2,
                found: 1,
            }),
        }
    }

    /// Returns the hash if it is a real password hash rather than a lock marker.
    ///
    /// Empty hashes and hashes made only of `!` and `*` (`!`, `!!`, `*`, ...) mean "no usable
    /// password" and must never be applied to another host.
    pub fn usable_hash(&self) -> Option<&str> {
        let locked = self.hash.is_empty() || self.hash.chars().all(|c| c == '!' || c == '*');
        (!locked).then_some(self.hash.as_str())
    }
}

/// The groups an account belongs to, in the order the source host lists them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupMembership {
    /// The name of the group the account's gid refers to, if the source could resolve it.
    pub primary: Option<String>,

    /// Every group the account belongs to, primary included. Duplicates are dropped.
    pub groups: IndexSet<String>,
}

impl GroupMembership {
    /// Parses the output of `id -gn` and `id -Gn`. Either may be empty.
    pub fn parse(primary: &str, groups: &str) -> Self {
        let primary = primary.trim();
        Self {
            primary: (!primary.is_empty()).then(|| primary.to_owned()),
            groups: groups.split_whitespace().map(str::to_owned).collect(),
        }
    }

    /// The groups to add the account to on another host.
    ///
    /// Leaves out the primary group as well as any group named after the account itself, which
    /// stands in for the primary group on systems with per-user groups.
    pub fn secondary<'a>(&'a self, username: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.groups
            .iter()
            .map(String::as_str)
            .filter(move |group| *group != username && Some(*group) != self.primary.as_deref())
    }

    /// A name for the account's primary group if it has to be created on another host.
    ///
    /// Prefers the source's name for the group, then the first group listed, then a name made up
    /// from the gid.
    pub fn primary_group_name(&self, gid: u32) -> String {
        self.primary
            .clone()
            .or_else(|| self.groups.first().cloned())
            .unwrap_or_else(|| format!("grp{gid}"))
    }
}

/// Everything captured from the source host, once per run.
///
/// Every target receives this same snapshot; changes on the source during the run are not seen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceAccount {
    pub account: AccountRecord,
    pub shadow: Option<ShadowRecord>,
    pub groups: GroupMembership,
}

/// Looks up `username` in the passwd database on `host`.
///
/// Returns `Ok(None)` if the lookup ran and found nothing.
///
/// # Errors
///
/// Returns an error if the lookup could not be run or the entry is malformed.
pub async fn fetch_account<E: Execute + ?Sized>(
    executor: &mut E,
    host: &str,
    username: &str,
) -> anyhow::Result<Option<AccountRecord>> {
    let Some(line) = lookup(executor, host, RemoteCommand::LookupPasswd {
        user: username.to_owned(),
    })
    .await?
    else {
        return Ok(None);
    };
    Ok(Some(AccountRecord::parse(&line)?))
}

/// Looks up `username` in the shadow database on `host`.
///
/// A missing or malformed entry is not an error; the account simply has no hash to copy.
pub async fn fetch_shadow<E: Execute + ?Sized>(
    executor: &mut E,
    host: &str,
    username: &str,
) -> anyhow::Result<Option<ShadowRecord>> {
    let line = lookup(executor, host, RemoteCommand::LookupShadow {
        user: username.to_owned(),
    })
    .await?;
    Ok(line.and_then(|line| match ShadowRecord::parse(&line) {
        Ok(record) => Some(record),
        Err(error) => {
            debug!("[{host}] ignoring shadow entry for {username}: {error}");
            None
        }
    }))
}

/// Looks up the groups `username` belongs to on `host`.
///
/// Empty results are valid.
pub async fn fetch_groups<E: Execute + ?Sized>(
    executor: &mut E,
    host: &str,
    username: &str,
) -> anyhow::Result<GroupMembership> {
    let user = username.to_owned();
    let primary = lookup(executor, host, RemoteCommand::PrimaryGroup { user: user.clone() })
        .await?
        .unwrap_or_default();
    let groups = lookup(executor, host, RemoteCommand::Groups { user })
        .await?
        .unwrap_or_default();
    Ok(GroupMembership::parse(&primary, &groups))
}

/// Runs a read-only lookup and returns the first line of its output.
///
/// The command's own "not found" exit status and empty output both mean "not found". Any other
/// failure, such as ssh being unable to reach the host, is an error.
async fn lookup<E: Execute + ?Sized>(
    executor: &mut E,
    host: &str,
    command: RemoteCommand,
) -> anyhow::Result<Option<String>> {
    let shell = command.to_shell()?;
    let output = executor
        .run(host, &shell)
        .await
        .with_context(|| format!("lookup failed on {host}: {command}"))?;

    if !output.status.success() {
        if !command.answers_no(output.status) {
            bail!("lookup failed on {host}: {command}: {}", describe_failure(&output));
        }
        debug!(
            "[{host}] {command} found nothing ({})",
            describe_failure(&output)
        );
        return Ok(None);
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .map(str::trim_end)
        .find(|line| !line.is_empty())
        .map(str::to_owned))
}

fn parse_id(field: &'static str, value: &str) -> Result<u32, RecordError> {
    value.parse().map_err(|_| RecordError::InvalidId {
        field,
        value: value.to_owned(),
    })
}
