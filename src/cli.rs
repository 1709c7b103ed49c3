//! Command-line argument parsing using clap derive.

use crate::config::{self, RunConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_LOGIN_USER, DEFAULT_PORT};
use crate::copy_user::conflict::{Always, Prompt, Resolution, ResolveConflict};
use crate::error::Error;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Copy a Unix user account, with its home directory, SSH keys, groups, and ACLs, from one host
/// to others over SSH.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "usercopy")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// The account to copy
    #[arg(short, long = "user", value_name = "USERNAME")]
    pub username: String,

    /// The host to copy the account from; `localhost` runs the lookups locally
    #[arg(short, long, value_name = "HOST")]
    pub source: String,

    /// Comma-separated list of hosts to copy the account to
    #[arg(short, long, value_name = "HOST,...")]
    pub targets: String,

    /// Private key for logging into remote hosts [default: ~/.ssh/id_ed25519 or ~/.ssh/id_rsa]
    #[arg(short = 'k', long = "key", value_name = "PATH")]
    pub identity: Option<PathBuf>,

    /// SSH port on remote hosts
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Account to log into remote hosts as
    #[arg(short, long, default_value = DEFAULT_LOGIN_USER, value_name = "USER")]
    pub login_user: String,

    /// Seconds to wait for a host to answer the reachability check
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout: u64,

    /// Print what would change without changing anything
    #[arg(short, long)]
    pub dry_run: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Don't copy POSIX ACLs
    #[arg(long)]
    pub no_acl: bool,

    /// What to do when the account already exists on a target
    #[arg(long, value_enum, default_value_t = OnConflict::Ask)]
    pub on_conflict: OnConflict,

    /// Exit with a failure status if any target failed
    #[arg(long)]
    pub strict: bool,
}

/// Choices for `--on-conflict`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnConflict {
    /// Ask on the terminal for each target
    Ask,

    /// Leave existing accounts alone
    Skip,

    /// Delete existing accounts and copy again
    Overwrite,
}

impl Cli {
    /// Builds the run configuration, looking for a default key if none was given.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidConfig] if the username or target list is unusable.
    pub fn config(&self) -> Result<RunConfig, Error> {
        let mut config = RunConfig::new(&self.username, &self.source, &self.targets)?;
        config.identity = self.identity.clone().or_else(config::default_identity);
        config.port = self.port;
        config.login_user = self.login_user.clone();
        config.connect_timeout = Duration::from_secs(self.connect_timeout);
        config.dry_run = self.dry_run;
        config.verbose = self.verbose;
        config.copy_acls = !self.no_acl;
        Ok(config)
    }

    /// The policy for targets that already have the account.
    pub fn conflict_policy(&self) -> Box<dyn ResolveConflict> {
        match self.on_conflict {
            OnConflict::Ask => Box::new(Prompt),
            OnConflict::Skip => Box::new(Always(Resolution::Skip)),
            OnConflict::Overwrite => Box::new(Always(Resolution::Overwrite)),
        }
    }
}
