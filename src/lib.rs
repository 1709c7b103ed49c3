//! Copies a Unix user account from one host to others over SSH.
//!
//! The account arrives on each target with the same uid, gid, home directory, shell, comment, and
//! password hash it has on the source host. Its home directory and `.ssh` directory are streamed
//! across with `tar`, its secondary group memberships are reapplied, and POSIX ACLs follow when
//! both hosts have the tools for them.
//!
//! # Program flow
//!
//! 1. The `usercopy` binary parses the command line ([cli]) into a [config::RunConfig] and a
//!    conflict policy.
//!
//! 2. [copy_user()] probes the source host and takes one snapshot of the account there
//!    ([account]). If the account doesn't exist, the run ends before any target is contacted.
//!
//! 3. Each target, in order, is walked through the stages described in [mod@copy_user]. Every
//!    command a stage sends is a [command::RemoteCommand], run through an [executor::Execute]
//!    implementation.
//!
//! 4. The binary prints a per-target summary ([copy_user::summary]).

pub mod account;
pub mod cli;
pub mod command;
pub mod config;
pub mod copy_user;
pub mod error;
pub mod executor;

#[doc(inline)]
pub use copy_user::copy_user;
#[doc(inline)]
pub use error::Error;
