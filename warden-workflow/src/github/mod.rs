//! GitHub integration for Warden.
//!
//! Provides webhook event parsing and the REST API client.

mod client;

pub use client::GitHubClient;

use serde::Deserialize;

use crate::api::{PullRequest, RepoRef, User};
use crate::review_state::ReviewAction;

// ============================================================================
// Webhook Event Types
// ============================================================================

/// GitHub `pull_request` / `pull_request_review` webhook event.
///
/// Both events share this shape; review events additionally carry `review`.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    /// Action: opened, synchronize, reopened, closed, submitted, etc.
    pub action: String,
    /// Pull request details
    pub pull_request: PullRequest,
    /// Repository info
    pub repository: Repository,
    /// Present on review events
    #[serde(default)]
    pub review: Option<Review>,
    /// Present on `review_requested` (absent for team requests)
    #[serde(default)]
    pub requested_reviewer: Option<User>,
}

/// Submitted review.
#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    /// `null` when the reviewer's account was deleted
    #[serde(default)]
    pub user: Option<User>,
}

/// Repository info.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Repository name
    pub name: String,
    /// Owning user or organization
    pub owner: User,
}

impl Repository {
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(self.owner.login.clone(), self.name.clone())
    }
}

impl PullRequestEvent {
    pub fn review_action(&self) -> ReviewAction {
        ReviewAction::from(self.action.as_str())
    }

    /// Login of the reviewer, for review events.
    pub fn reviewer(&self) -> Option<&str> {
        self.review
            .as_ref()
            .and_then(|r| r.user.as_ref())
            .map(|u| u.login.as_str())
    }

    /// Get the PR number.
    pub fn pr_number(&self) -> u64 {
        self.pull_request.number
    }
}
