//! What to do when the account already exists on a target.

use anyhow::Context;
use dialoguer::Confirm;
use std::collections::HashMap;

/// The decision for a target that already has the account.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Leave the target untouched.
    Skip,

    /// Delete the existing account and its home directory, then copy as usual.
    Overwrite,
}

/// Decides what happens to a target that already has the account.
pub trait ResolveConflict {
    /// Decides for `username` on `target`.
    ///
    /// An error is treated as [Resolution::Skip] by the caller.
    fn resolve(&mut self, target: &str, username: &str) -> anyhow::Result<Resolution>;
}

/// Asks the operator on the terminal.
///
/// A single `y` or `n` keystroke answers, in either case. The default is no.
#[derive(Clone, Copy, Debug, Default)]
pub struct Prompt;

impl ResolveConflict for Prompt {
    fn resolve(&mut self, target: &str, username: &str) -> anyhow::Result<Resolution> {
        let overwrite = Confirm::new()
            .with_prompt(format!(
                "User {username} already exists on {target}. Delete it and copy again?"
            ))
            .default(false)
            .wait_for_newline(false)
            .interact()
            .context("cannot prompt for confirmation")?;

        Ok(match overwrite {
            true => Resolution::Overwrite,
            false => Resolution::Skip,
        })
    }
}

/// Gives the same answer for every target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Always(pub Resolution);

impl ResolveConflict for Always {
    fn resolve(&mut self, _target: &str, _username: &str) -> anyhow::Result<Resolution> {
        Ok(self.0)
    }
}

/// Answers from a decision made in advance for each target, with a fallback for the rest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PerTarget {
    decisions: HashMap<String, Resolution>,
    fallback: Resolution,
}

impl PerTarget {
    pub fn new(fallback: Resolution) -> Self {
        Self {
            decisions: HashMap::new(),
            fallback,
        }
    }

    /// Records the decision for `target`, replacing any earlier one.
    pub fn decide(mut self, target: impl Into<String>, resolution: Resolution) -> Self {
        self.decisions.insert(target.into(), resolution);
        self
    }
}

impl ResolveConflict for PerTarget {
    fn resolve(&mut self, target: &str, _username: &str) -> anyhow::Result<Resolution> {
        Ok(self
            .decisions
            .get(target)
            .copied()
            .unwrap_or(self.fallback))
    }
}
