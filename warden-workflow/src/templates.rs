//! Comment templates.
//!
//! Every comment the bot posts from a template ends with an HTML marker
//! naming the template (`<!-- fixCommitWarning -->`). The marker is invisible
//! when rendered and lets later deliveries find, and retract, the bot's own
//! comments.

use std::collections::HashMap;
use warden_common::{Error, Result};

use crate::api::{IssueApi, IssueComment, RepoRef};

pub const MERGE_CONFLICT_WARNING: &str = "mergeConflictWarning";
pub const FIX_COMMIT_WARNING: &str = "fixCommitWarning";
pub const TRAVIS_PASS: &str = "travisPass";
pub const TRAVIS_FAIL: &str = "travisFail";

const DEFAULT_TEMPLATES: [(&str, &str); 4] = [
    (
        MERGE_CONFLICT_WARNING,
        "Hey @{author}, this pull request has merge conflicts with the base branch. \
         Please resolve them so it can be merged.",
    ),
    (
        FIX_COMMIT_WARNING,
        "Hey @{author}, the description references #{issues}, but no commit does. \
         Add `fixes #{fixIssues}` to a commit message so {issuePronoun} will be closed \
         once the commits land.",
    ),
    (TRAVIS_PASS, "The Travis CI build passed: {url}"),
    (
        TRAVIS_FAIL,
        "The Travis CI build {state}. Check the {buildLogs} for details.",
    ),
];

/// A template comment found on an issue or PR.
pub type TemplateComment = IssueComment;

/// A named comment template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    id: String,
    body: String,
}

impl Template {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The marker that closes every comment rendered from this template.
    pub fn marker(&self) -> String {
        format!("<!-- {} -->", self.id)
    }

    /// Render with every `{name}` placeholder replaced, followed by the marker.
    ///
    /// Placeholders without a value are left as-is.
    pub fn format(&self, context: &[(&str, &str)]) -> String {
        let mut text = self.body.clone();
        for (name, value) in context {
            text = text.replace(&format!("{{{name}}}"), value);
        }
        format!("{text}\n\n{}", self.marker())
    }

    /// Whether `comment` was rendered from this template by `bot_login`.
    pub fn matches(&self, comment: &IssueComment, bot_login: &str) -> bool {
        comment.user.login == bot_login && comment.body.trim_end().ends_with(&self.marker())
    }

    /// The bot's comments rendered from this template on an issue or PR.
    pub async fn comments(
        &self,
        api: &dyn IssueApi,
        repo: &RepoRef,
        number: u64,
        bot_login: &str,
    ) -> Result<Vec<TemplateComment>> {
        let comments = api.list_comments(repo, number).await?;
        Ok(comments
            .into_iter()
            .filter(|c| self.matches(c, bot_login))
            .collect())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Templates by identifier.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, Template>,
}

impl TemplateRegistry {
    /// Registry holding the built-in templates.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        for (id, body) in DEFAULT_TEMPLATES {
            registry.insert(id, body);
        }
        registry
    }

    /// Built-in templates, replaced or extended by `overrides`.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut registry = Self::with_defaults();
        for (id, body) in overrides {
            registry.insert(id.clone(), body.clone());
        }
        registry
    }

    pub fn insert(&mut self, id: impl Into<String>, body: impl Into<String>) {
        let template = Template::new(id, body);
        self.templates.insert(template.id.clone(), template);
    }

    /// Look up a template. Unknown identifiers are `Error::NotFound`.
    pub fn get(&self, id: &str) -> Result<&Template> {
        self.templates
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("template {id}")))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
