//! In-memory [`IssueApi`] backend.
//!
//! Holds labels, pulls, issues and comments per repository in process
//! memory and records every write, so handlers and the webhook router can
//! be driven without GitHub. Public so the integration tests under `tests/`
//! can build a router on top of it.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use warden_common::{Error, Result};

use crate::api::{
    CommitDetail, Issue, IssueApi, IssueComment, PullCommit, PullRequest, PullRequestFile,
    RepoRef, User,
};

type Key = (RepoRef, u64);

/// A write performed through the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    SetLabels { number: u64, labels: Vec<String> },
    AddLabels { number: u64, labels: Vec<String> },
    RemoveLabel { number: u64, label: String },
    AddAssignees { number: u64, assignees: Vec<String> },
    CreateComment { number: u64, body: String },
    DeleteComment { id: u64 },
}

#[derive(Default)]
struct State {
    labels: HashMap<Key, Vec<String>>,
    assignees: HashMap<Key, Vec<String>>,
    pulls: HashMap<Key, PullRequest>,
    files: HashMap<Key, Vec<PullRequestFile>>,
    commits: HashMap<Key, Vec<PullCommit>>,
    issues: HashMap<Key, Issue>,
    comments: HashMap<Key, Vec<IssueComment>>,
    next_comment_id: u64,
    calls: Vec<ApiCall>,
    failing: HashSet<String>,
}

/// Issue API backed by process memory.
pub struct InMemoryIssueApi {
    state: Mutex<State>,
    /// Author recorded on comments created through the API
    bot_login: String,
}

impl Default for InMemoryIssueApi {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIssueApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_comment_id: 1,
                ..State::default()
            }),
            bot_login: "warden-bot".into(),
        }
    }

    /// Login used as the author of created comments (default `warden-bot`).
    pub fn with_bot_login(mut self, login: impl Into<String>) -> Self {
        self.bot_login = login.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(repo: &RepoRef, number: u64) -> Key {
        (repo.clone(), number)
    }

    // ------------------------------------------------------------------------
    // Seeding
    // ------------------------------------------------------------------------

    /// Labels currently applied to an issue or PR.
    pub fn with_labels(self, repo: &RepoRef, number: u64, labels: &[&str]) -> Self {
        self.lock().labels.insert(
            Self::key(repo, number),
            labels.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// A pull request. Also registers the matching issue entry.
    pub fn with_pull(self, repo: &RepoRef, pull: PullRequest) -> Self {
        {
            let mut state = self.lock();
            let key = Self::key(repo, pull.number);
            state.issues.insert(
                key.clone(),
                Issue {
                    number: pull.number,
                    state: pull.state.clone(),
                    pull_request: Some(serde_json::json!({})),
                },
            );
            state.pulls.insert(key, pull);
        }
        self
    }

    /// Changed files as `(filename, changes)`.
    pub fn with_files(self, repo: &RepoRef, number: u64, files: &[(&str, u64)]) -> Self {
        let files = files
            .iter()
            .map(|(name, changes)| PullRequestFile {
                filename: name.to_string(),
                additions: *changes,
                deletions: 0,
                changes: *changes,
            })
            .collect();
        self.lock().files.insert(Self::key(repo, number), files);
        self
    }

    /// Commits of a PR, by message.
    pub fn with_commits(self, repo: &RepoRef, number: u64, messages: &[&str]) -> Self {
        let commits = messages
            .iter()
            .enumerate()
            .map(|(i, message)| PullCommit {
                sha: format!("{number:04}{i:036}"),
                commit: CommitDetail {
                    message: message.to_string(),
                },
            })
            .collect();
        self.lock().commits.insert(Self::key(repo, number), commits);
        self
    }

    /// A plain issue in the given state (`open` / `closed`).
    pub fn with_issue(self, repo: &RepoRef, number: u64, state: &str) -> Self {
        self.lock().issues.insert(
            Self::key(repo, number),
            Issue {
                number,
                state: state.to_string(),
                pull_request: None,
            },
        );
        self
    }

    /// An open issue entry that is a pull request.
    pub fn with_pull_request_issue(self, repo: &RepoRef, number: u64) -> Self {
        self.lock().issues.insert(
            Self::key(repo, number),
            Issue {
                number,
                state: "open".into(),
                pull_request: Some(serde_json::json!({})),
            },
        );
        self
    }

    /// An existing comment.
    pub fn with_comment(self, repo: &RepoRef, number: u64, author: &str, body: &str) -> Self {
        self.insert_comment(repo, number, author, body);
        self
    }

    /// Make every call of the named operation fail with `Error::External`.
    pub fn failing_on(self, operation: &str) -> Self {
        self.lock().failing.insert(operation.to_string());
        self
    }

    fn insert_comment(&self, repo: &RepoRef, number: u64, author: &str, body: &str) -> IssueComment {
        let mut state = self.lock();
        let comment = IssueComment {
            id: state.next_comment_id,
            body: body.to_string(),
            user: User::new(author),
        };
        state.next_comment_id += 1;
        state
            .comments
            .entry(Self::key(repo, number))
            .or_default()
            .push(comment.clone());
        comment
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn labels(&self, repo: &RepoRef, number: u64) -> Vec<String> {
        self.lock()
            .labels
            .get(&Self::key(repo, number))
            .cloned()
            .unwrap_or_default()
    }

    pub fn assignees(&self, repo: &RepoRef, number: u64) -> Vec<String> {
        self.lock()
            .assignees
            .get(&Self::key(repo, number))
            .cloned()
            .unwrap_or_default()
    }

    pub fn comments(&self, repo: &RepoRef, number: u64) -> Vec<IssueComment> {
        self.lock()
            .comments
            .get(&Self::key(repo, number))
            .cloned()
            .unwrap_or_default()
    }

    /// Every write performed so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    fn check(&self, operation: &str) -> Result<()> {
        if self.lock().failing.contains(operation) {
            return Err(Error::External(format!("{operation} failed (injected)")));
        }
        Ok(())
    }

    fn record(&self, call: ApiCall) {
        self.lock().calls.push(call);
    }
}

#[async_trait]
impl IssueApi for InMemoryIssueApi {
    async fn list_labels(&self, repo: &RepoRef, number: u64) -> Result<Vec<String>> {
        self.check("list_labels")?;
        Ok(self.labels(repo, number))
    }

    async fn set_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()> {
        self.check("set_labels")?;
        self.lock()
            .labels
            .insert(Self::key(repo, number), labels.to_vec());
        self.record(ApiCall::SetLabels {
            number,
            labels: labels.to_vec(),
        });
        Ok(())
    }

    async fn add_labels(&self, repo: &RepoRef, number: u64, labels: &[String]) -> Result<()> {
        self.check("add_labels")?;
        {
            let mut state = self.lock();
            let current = state.labels.entry(Self::key(repo, number)).or_default();
            for label in labels {
                if !current.contains(label) {
                    current.push(label.clone());
                }
            }
        }
        self.record(ApiCall::AddLabels {
            number,
            labels: labels.to_vec(),
        });
        Ok(())
    }

    async fn remove_label(&self, repo: &RepoRef, number: u64, label: &str) -> Result<()> {
        self.check("remove_label")?;
        {
            let mut state = self.lock();
            let current = state.labels.entry(Self::key(repo, number)).or_default();
            let Some(pos) = current.iter().position(|l| l == label) else {
                return Err(Error::NotFound(format!("label {label} on #{number}")));
            };
            current.remove(pos);
        }
        self.record(ApiCall::RemoveLabel {
            number,
            label: label.to_string(),
        });
        Ok(())
    }

    async fn add_assignees(
        &self,
        repo: &RepoRef,
        number: u64,
        assignees: &[String],
    ) -> Result<()> {
        self.check("add_assignees")?;
        {
            let mut state = self.lock();
            let current = state.assignees.entry(Self::key(repo, number)).or_default();
            for login in assignees {
                if !current.contains(login) {
                    current.push(login.clone());
                }
            }
        }
        self.record(ApiCall::AddAssignees {
            number,
            assignees: assignees.to_vec(),
        });
        Ok(())
    }

    async fn get_pull(&self, repo: &RepoRef, number: u64) -> Result<PullRequest> {
        self.check("get_pull")?;
        self.lock()
            .pulls
            .get(&Self::key(repo, number))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("pull request {repo}#{number}")))
    }

    async fn list_pull_files(&self, repo: &RepoRef, number: u64) -> Result<Vec<PullRequestFile>> {
        self.check("list_pull_files")?;
        Ok(self
            .lock()
            .files
            .get(&Self::key(repo, number))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_pull_commits(&self, repo: &RepoRef, number: u64) -> Result<Vec<PullCommit>> {
        self.check("list_pull_commits")?;
        Ok(self
            .lock()
            .commits
            .get(&Self::key(repo, number))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<Issue> {
        self.check("get_issue")?;
        self.lock()
            .issues
            .get(&Self::key(repo, number))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("issue {repo}#{number}")))
    }

    async fn list_comments(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueComment>> {
        self.check("list_comments")?;
        Ok(self.comments(repo, number))
    }

    async fn create_comment(&self, repo: &RepoRef, number: u64, body: &str) -> Result<IssueComment> {
        self.check("create_comment")?;
        let comment = self.insert_comment(repo, number, &self.bot_login, body);
        self.record(ApiCall::CreateComment {
            number,
            body: body.to_string(),
        });
        Ok(comment)
    }

    async fn delete_comment(&self, repo: &RepoRef, comment_id: u64) -> Result<()> {
        self.check("delete_comment")?;
        {
            let mut state = self.lock();
            let removed = state
                .comments
                .iter_mut()
                .filter(|((r, _), _)| r == repo)
                .any(|(_, comments)| {
                    let before = comments.len();
                    comments.retain(|c| c.id != comment_id);
                    comments.len() != before
                });
            if !removed {
                return Err(Error::NotFound(format!("comment {comment_id} in {repo}")));
            }
        }
        self.record(ApiCall::DeleteComment { id: comment_id });
        Ok(())
    }
}
