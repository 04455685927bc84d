//! Email lookup over the GitHub API.

use crate::error::LookupError;
use crate::github::{Commit, CommitListing, GitHubClient, Repository};
use crate::lookup::Lookup;
use crate::lookup::input;

/// Finds the commit email of a GitHub account.
pub struct EmailFinder {
    github: GitHubClient,
}

impl EmailFinder {
    pub fn new(github: GitHubClient) -> Self {
        Self { github }
    }

    /// Look up the email for raw message text (profile URL or identifier).
    pub async fn find_email(&self, text: &str) -> Result<Lookup, LookupError> {
        let identifier = input::normalize(text)?;
        tracing::debug!(%identifier, "Normalized input");
        self.find_email_for(&identifier).await
    }

    /// Look up the email for an already normalized identifier.
    ///
    /// Makes one repository call and at most one commit call.
    pub async fn find_email_for(&self, identifier: &str) -> Result<Lookup, LookupError> {
        let repos = self.github.list_repositories(identifier).await?;
        tracing::debug!(identifier, count = repos.len(), "Got repos");

        let Some(repo) = select_repository(&repos) else {
            return Ok(Lookup::NoRepositories);
        };
        tracing::debug!(identifier, repo = %repo.name, "Scanning commits");

        let commits = match self.github.list_commits(identifier, &repo.name).await? {
            CommitListing::Commits(commits) => commits,
            CommitListing::Unavailable { status, message } => {
                tracing::debug!(identifier, repo = %repo.name, status, %message, "No commit list");
                return Ok(Lookup::NoCommits);
            }
        };
        tracing::debug!(identifier, count = commits.len(), "Got commits");

        Ok(match scan_commits(&commits, identifier) {
            Some(email) => Lookup::Found(email.to_string()),
            None => Lookup::NoCommits,
        })
    }
}

/// First non-fork repository; callers pass the list most-recent first.
pub fn select_repository(repos: &[Repository]) -> Option<&Repository> {
    repos.iter().find(|r| !r.fork)
}

/// Email of the first commit whose linked login matches `identifier`,
/// ignoring case. Commits without a linked account never match.
pub fn scan_commits<'a>(commits: &'a [Commit], identifier: &str) -> Option<&'a str> {
    commits
        .iter()
        .find(|c| {
            c.author_login()
                .is_some_and(|login| login.eq_ignore_ascii_case(identifier))
        })
        .map(Commit::author_email)
}
