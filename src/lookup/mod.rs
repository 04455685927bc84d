//! Email lookup: input normalization, the GitHub search, and reply text.

pub mod finder;
pub mod input;

pub use finder::EmailFinder;

use crate::error::LookupError;

/// Reply when no non-fork repository exists.
pub const NO_REPOSITORIES_REPLY: &str = "No repositories found";

/// Reply when no commit by the account was found.
pub const NO_COMMITS_REPLY: &str = "No commits found";

/// Reply for every failed lookup.
pub const INVALID_INPUT_REPLY: &str = "Invalid input";

/// Successful outcome of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(String),
    NoRepositories,
    NoCommits,
}

impl Lookup {
    pub fn reply_text(&self) -> &str {
        match self {
            Lookup::Found(email) => email.as_str(),
            Lookup::NoRepositories => NO_REPOSITORIES_REPLY,
            Lookup::NoCommits => NO_COMMITS_REPLY,
        }
    }
}

/// Text sent back to the user for a lookup result.
pub fn reply_for(result: &Result<Lookup, LookupError>) -> &str {
    match result {
        Ok(lookup) => lookup.reply_text(),
        Err(_) => INVALID_INPUT_REPLY,
    }
}
