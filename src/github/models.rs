//! GitHub REST response types.
//!
//! Only the fields the lookup needs are modeled; the rest of each payload
//! is ignored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A repository from `GET /users/{user}/repos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Account,
    pub fork: bool,
    pub updated_at: DateTime<Utc>,
}

/// A GitHub account reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub login: String,
}

/// A commit from `GET /repos/{owner}/{repo}/commits`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Linked GitHub account; null when the commit email is not tied to one.
    pub author: Option<CommitAuthor>,
    pub commit: CommitDetail,
}

/// Account linked to a commit. GitHub occasionally returns it without a
/// login; such commits never match an identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub author: GitSignature,
}

/// Author identity as recorded in git.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitSignature {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    pub date: DateTime<Utc>,
}

impl Commit {
    /// Login of the linked account, if any.
    pub fn author_login(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.login.as_deref())
    }

    pub fn author_email(&self) -> &str {
        &self.commit.author.email
    }

    pub fn authored_at(&self) -> DateTime<Utc> {
        self.commit.author.date
    }
}

/// Outcome of listing a repository's commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitListing {
    Commits(Vec<Commit>),
    /// GitHub answered with something other than a commit list
    /// (empty repository, blocked repository, missing repository).
    Unavailable { status: u16, message: String },
}
