//! The run configuration, built once from the invocation and read-only thereafter.

use crate::error::Error;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// The default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// The account used to log into remote hosts. Provisioning needs root on the other end.
pub const DEFAULT_LOGIN_USER: &str = "root";

/// How long the reachability probe waits for a host before giving up on it.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

// Private keys we look for in ~/.ssh when the operator doesn't name one, in order of preference.
const DEFAULT_KEYS: [&str; 2] = ["id_ed25519", "id_rsa"];

// useradd refuses longer names on most platforms.
const MAX_USERNAME_LEN: usize = 32;

/// Everything a run needs to know, passed explicitly to every stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// The account to copy.
    pub username: String,

    /// The host the account is copied from. `localhost` means "run the lookups locally".
    pub source: String,

    /// The hosts the account is copied to, in the order they will be processed.
    pub targets: Vec<String>,

    /// The private key used to log into remote hosts, if any. Without one, `ssh` prompts for a
    /// password every time it connects.
    pub identity: Option<PathBuf>,

    /// The SSH port on remote hosts.
    pub port: u16,

    /// The administrative account to log into remote hosts as.
    pub login_user: String,

    /// The bound on the reachability probe.
    pub connect_timeout: Duration,

    /// Report mutating commands instead of running them.
    pub dry_run: bool,

    /// Emit debug-level status lines.
    pub verbose: bool,

    /// Replicate POSIX ACLs along with file trees.
    pub copy_acls: bool,
}

impl RunConfig {
    /// Creates a configuration with default settings for everything but the required fields.
    ///
    /// Validates `username` and parses `targets` with [parse_targets].
    pub fn new(
        username: impl Into<String>,
        source: impl Into<String>,
        targets: &str,
    ) -> Result<Self, Error> {
        let username = username.into();
        validate_username(&username)?;

        let source = source.into().trim().to_owned();
        if source.is_empty() {
            return Err(Error::config("source host must not be empty"));
        }

        Ok(Self {
            username,
            source,
            targets: parse_targets(targets)?,
            identity: None,
            port: DEFAULT_PORT,
            login_user: DEFAULT_LOGIN_USER.to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            dry_run: false,
            verbose: false,
            copy_acls: true,
        })
    }
}

/// Splits a comma-separated target list, trimming white space around each entry.
///
/// Empty entries (e.g. from a trailing comma) are dropped. Order is preserved.
///
/// # Errors
///
/// Returns [Error::InvalidConfig] if no targets remain.
pub fn parse_targets(list: &str) -> Result<Vec<String>, Error> {
    let targets: Vec<String> = list
        .split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(str::to_owned)
        .collect();

    if targets.is_empty() {
        return Err(Error::config("no target hosts given"));
    }
    Ok(targets)
}

/// Checks that `username` is a name the account utilities will accept.
///
/// The name ends up in shell commands on every host, so this check also keeps the rest of the
/// program from having to worry about odd characters in it.
pub fn validate_username(username: &str) -> Result<(), Error> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]*\$?$").expect("username pattern is valid")
    });

    if username.len() > MAX_USERNAME_LEN {
        return Err(Error::config(format!(
            "username is longer than {MAX_USERNAME_LEN} characters: {username}"
        )));
    }
    if !pattern.is_match(username) {
        return Err(Error::config(format!("invalid username: {username:?}")));
    }
    Ok(())
}

/// Looks for a conventional private key in the invoking user's `~/.ssh`.
pub fn default_identity() -> Option<PathBuf> {
    let ssh_dir = home::home_dir()?.join(".ssh");
    first_existing(&ssh_dir, &DEFAULT_KEYS)
}

fn first_existing(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn targets_are_split_and_trimmed() {
        assert_eq!(
            vec!["h1", "h2", "h3"],
            parse_targets(" h1 ,h2,  h3").unwrap()
        );
    }

    #[test]
    fn empty_target_entries_are_dropped() {
        assert_eq!(vec!["h1", "h2"], parse_targets("h1,,h2,").unwrap());
    }

    #[test]
    fn empty_target_list_is_rejected() {
        assert!(matches!(
            parse_targets(" , "),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn target_order_is_preserved() {
        assert_eq!(vec!["b", "a", "c"], parse_targets("b,a,c").unwrap());
    }

    #[test]
    fn usernames() {
        for good in ["alice", "_svc", "bob.smith", "build-1", "machine$"] {
            assert!(validate_username(good).is_ok(), "rejected {good}");
        }
        for bad in ["", "1alice", "al ice", "alice;rm", "$alice", "a/b"] {
            assert!(validate_username(bad).is_err(), "accepted {bad}");
        }
        assert!(validate_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn new_applies_defaults() {
        let config = RunConfig::new("alice", "localhost", "host2").unwrap();
        assert_eq!(DEFAULT_PORT, config.port);
        assert_eq!("root", config.login_user);
        assert!(config.copy_acls);
        assert!(!config.dry_run);
        assert_eq!(None, config.identity);
    }

    #[test]
    fn new_rejects_empty_source() {
        assert!(RunConfig::new("alice", "  ", "host2").is_err());
    }

    #[test]
    fn prefers_keys_in_order() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(None, first_existing(dir.path(), &DEFAULT_KEYS));

        fs::write(dir.path().join("id_rsa"), "key").unwrap();
        assert_eq!(
            Some(dir.path().join("id_rsa")),
            first_existing(dir.path(), &DEFAULT_KEYS)
        );

        fs::write(dir.path().join("id_ed25519"), "key").unwrap();
        assert_eq!(
            Some(dir.path().join("id_ed25519")),
            first_existing(dir.path(), &DEFAULT_KEYS)
        );
    }
}
