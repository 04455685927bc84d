//! GitHub REST API access.

pub mod client;
pub mod models;

pub use client::GitHubClient;
pub use models::{Account, Commit, CommitAuthor, CommitListing, Repository};
