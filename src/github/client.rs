use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use crate::config::GitHubConfig;
use crate::error::GitHubError;
use crate::github::models::{Commit, CommitListing, Repository};

/// Read-only GitHub REST API client.
///
/// Built once at start-up; the default headers (`User-Agent`, `Accept`,
/// API version) are fixed for the lifetime of the client.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
    page_size: u32,
    max_pages: u32,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        })
    }

    async fn get_page(&self, url: &str, page: u32) -> Result<Response, GitHubError> {
        let mut request = self
            .http
            .get(url)
            .query(&[("per_page", self.page_size), ("page", page)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }
        Ok(request.send().await?)
    }

    /// Check response status and return error if not successful
    async fn check_response(response: Response) -> Result<Response, GitHubError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // 403 with x-ratelimit-remaining: 0
        if status == StatusCode::FORBIDDEN
            && response
                .headers()
                .get("x-ratelimit-remaining")
                .and_then(|v| v.to_str().ok())
                == Some("0")
        {
            return Err(GitHubError::RateLimited);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(GitHubError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        Err(GitHubError::Api {
            status: status.as_u16(),
            message: error_message(&body, status),
        })
    }

    /// List a user's repositories, most recently updated first.
    pub async fn list_repositories(&self, user: &str) -> Result<Vec<Repository>, GitHubError> {
        let url = format!("{}/users/{}/repos", self.base_url, user);
        let mut repos: Vec<Repository> = Vec::new();

        for page in 1..=self.max_pages {
            let response = Self::check_response(self.get_page(&url, page).await?).await?;
            let batch: Vec<Repository> = serde_json::from_str(&response.text().await?)?;
            let full_page = batch.len() >= self.page_size as usize;
            repos.extend(batch);
            if !full_page {
                break;
            }
        }

        repos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        tracing::debug!(user, count = repos.len(), "Fetched repositories");
        Ok(repos)
    }

    /// List a repository's commits, most recently authored first.
    ///
    /// A response that is not a JSON array (any status) yields
    /// [`CommitListing::Unavailable`] instead of an error.
    pub async fn list_commits(&self, owner: &str, repo: &str) -> Result<CommitListing, GitHubError> {
        let url = format!("{}/repos/{}/{}/commits", self.base_url, owner, repo);
        let mut commits: Vec<Commit> = Vec::new();

        for page in 1..=self.max_pages {
            let response = self.get_page(&url, page).await?;
            let status = response.status();
            let body = response.text().await?;
            let value: serde_json::Value = serde_json::from_str(&body)?;

            let serde_json::Value::Array(items) = value else {
                if page == 1 {
                    let message = error_message(&body, status);
                    tracing::debug!(owner, repo, status = status.as_u16(), %message, "Commit list unavailable");
                    return Ok(CommitListing::Unavailable {
                        status: status.as_u16(),
                        message,
                    });
                }
                tracing::warn!(owner, repo, page, status = status.as_u16(), "Stopped paging commits early");
                break;
            };

            let batch = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<Commit>, _>>()?;
            let full_page = batch.len() >= self.page_size as usize;
            commits.extend(batch);
            if !full_page {
                break;
            }
        }

        commits.sort_by(|a, b| b.authored_at().cmp(&a.authored_at()));
        tracing::debug!(owner, repo, count = commits.len(), "Fetched commits");
        Ok(CommitListing::Commits(commits))
    }
}

/// Prefer GitHub's `message` field, then the raw body, then the status.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    if body.trim().is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        body.to_string()
    }
}
