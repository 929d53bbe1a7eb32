//! Issue/pull request API abstraction.
//!
//! Handlers talk to GitHub only through [`IssueApi`], so the same
//! reconciliation code runs against the REST client in production and the
//! in-memory backend in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use warden_common::Result;

// ============================================================================
// API Types
// ============================================================================

/// Repository handle (owner + name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// GitHub user (only the login matters here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

/// Label as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// Pull request, as found in webhook payloads and `GET /pulls/{number}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default = "default_open")]
    pub state: String,
    pub user: User,
    /// `None` while GitHub is still computing mergeability
    #[serde(default)]
    pub mergeable: Option<bool>,
}

impl PullRequest {
    pub fn author(&self) -> &str {
        &self.user.login
    }

    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or_default()
    }
}

/// File changed in a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestFile {
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    /// additions + deletions
    #[serde(default)]
    pub changes: u64,
}

/// Commit listed on a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullCommit {
    #[serde(default)]
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitDetail {
    pub message: String,
}

/// Issue detail. Pull requests are issues too and carry a `pull_request` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<serde_json::Value>,
}

impl Issue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub fn is_open(&self) -> bool {
        self.state == "open"
    }
}

/// Comment on an issue or pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub user: User,
}

fn default_open() -> String {
    "open".into()
}

// ============================================================================
// Issue API
// ============================================================================

/// Issue and pull request operations used by the bot.
///
/// List operations return every page concatenated in page order.
#[async_trait]
pub trait IssueApi: Send + Sync {
    /// Names of the labels currently applied to an issue or PR.
    async fn list_labels(&self, repo: &RepoRef, number: u64) -> Result<Vec<String>>;

    /// Replace the whole label set.
    async fn set_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()>;

    /// Append labels to the existing set.
    async fn add_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()>;

    /// Remove one label. Fails with `Error::NotFound` when it is not applied.
    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()>;

    async fn add_assignees(&self, repo: &RepoRef, number: u64, assignees: &[String])
        -> Result<()>;

    /// Pull request detail, including `mergeable`.
    async fn get_pull(&self, repo: &RepoRef, number: u64) -> Result<PullRequest>;

    async fn list_pull_files(&self, repo: &RepoRef, number: u64) -> Result<Vec<PullRequestFile>>;

    async fn list_pull_commits(&self, repo: &RepoRef, number: u64) -> Result<Vec<PullCommit>>;

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<Issue>;

    async fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueComment>>;

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str)
        -> Result<IssueComment>;

    async fn delete_comment(&self, repo: &RepoRef, comment_id: u64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_from_pull_request_payload() {
        let json = r#"{
            "number": 7,
            "state": "open",
            "pull_request": { "url": "https://api.github.com/repos/o/r/pulls/7" }
        }"#;
        let issue: Issue = serde_json::from_str(json).unwrap();
        assert!(issue.is_pull_request());
        assert!(issue.is_open());
    }

    #[test]
    fn test_pull_request_mergeable_tristate() {
        let pending: PullRequest =
            serde_json::from_str(r#"{ "number": 1, "user": { "login": "a" }, "mergeable": null }"#)
                .unwrap();
        assert_eq!(pending.mergeable, None);
        assert_eq!(pending.body_text(), "");

        let clean: PullRequest = serde_json::from_str(
            r#"{ "number": 1, "state": "closed", "user": { "login": "a" }, "mergeable": true }"#,
        )
        .unwrap();
        assert_eq!(clean.mergeable, Some(true));
        assert_eq!(clean.state, "closed");
    }

    #[test]
    fn test_repo_ref_display() {
        assert_eq!(RepoRef::new("octo", "cat").to_string(), "octo/cat");
    }
}
