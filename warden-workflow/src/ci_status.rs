//! Travis CI build result comments.

use serde::Deserialize;
use warden_common::Result;

use crate::api::RepoRef;
use crate::context::BotContext;
use crate::templates::{TRAVIS_FAIL, TRAVIS_PASS};

/// Build notification posted by Travis CI.
#[derive(Debug, Clone, Deserialize)]
pub struct CiStatusEvent {
    pub repository: CiRepository,
    /// Whether the build ran for a pull request
    #[serde(default)]
    pub pull_request: bool,
    #[serde(default)]
    pub pull_request_number: Option<u64>,
    /// `passed`, `failed`, `errored`, ...
    pub state: String,
    pub build_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CiRepository {
    pub owner_name: String,
    pub name: String,
}

impl CiStatusEvent {
    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(self.repository.owner_name.clone(), self.repository.name.clone())
    }

    /// The PR the build belongs to, if any.
    pub fn pr_number(&self) -> Option<u64> {
        self.pull_request.then_some(self.pull_request_number).flatten()
    }

    pub fn passed(&self) -> bool {
        self.state == "passed"
    }
}

/// Comment the build result on PRs that opted in with the CI label.
///
/// Returns whether a comment was posted.
pub async fn report_ci_status(ctx: &BotContext, event: &CiStatusEvent) -> Result<bool> {
    let (Some(number), Some(ci_label)) = (event.pr_number(), ctx.config.ci.travis.as_ref()) else {
        return Ok(false);
    };
    let repo = event.repo_ref();

    let labels = ctx.api().list_labels(&repo, number).await?;
    if !labels.contains(ci_label) {
        tracing::debug!(pr = number, label = %ci_label, "PR not opted into CI comments");
        return Ok(false);
    }

    let comment = if event.passed() {
        ctx.templates
            .get(TRAVIS_PASS)?
            .format(&[("url", event.build_url.as_str())])
    } else {
        let build_logs = format!("[build logs]({})", event.build_url);
        ctx.templates.get(TRAVIS_FAIL)?.format(&[
            ("buildLogs", build_logs.as_str()),
            ("state", event.state.as_str()),
        ])
    };

    ctx.api().create_comment(&repo, number, &comment).await?;
    tracing::info!(pr = number, state = %event.state, "Posted CI status comment");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryIssueApi;
    use crate::templates::TemplateRegistry;
    use std::sync::Arc;
    use warden_common::PullsConfig;

    fn repo() -> RepoRef {
        RepoRef::new("octo", "cat")
    }

    fn event(state: &str, pull_request: bool) -> CiStatusEvent {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "repository": { "id": 2, "owner_name": "octo", "name": "cat" },
            "pull_request": pull_request,
            "pull_request_number": 7,
            "state": state,
            "build_url": "https://travis-ci.org/octo/cat/builds/1"
        }))
        .unwrap()
    }

    fn context(api: Arc<InMemoryIssueApi>) -> BotContext {
        let mut config = PullsConfig::default();
        config.ci.travis = Some("travis".into());
        BotContext::new(api, config, TemplateRegistry::with_defaults(), "warden-bot")
    }

    #[tokio::test]
    async fn test_passed_build_comment() {
        let api = Arc::new(InMemoryIssueApi::new().with_labels(&repo(), 7, &["travis"]));
        let ctx = context(api.clone());

        assert!(report_ci_status(&ctx, &event("passed", true)).await.unwrap());
        let comments = api.comments(&repo(), 7);
        assert!(comments[0]
            .body
            .contains("https://travis-ci.org/octo/cat/builds/1"));
        assert!(comments[0].body.ends_with("<!-- travisPass -->"));
    }

    #[tokio::test]
    async fn test_failed_build_comment() {
        let api = Arc::new(InMemoryIssueApi::new().with_labels(&repo(), 7, &["travis"]));
        let ctx = context(api.clone());

        report_ci_status(&ctx, &event("errored", true)).await.unwrap();
        let body = &api.comments(&repo(), 7)[0].body;
        assert!(body.contains("[build logs](https://travis-ci.org/octo/cat/builds/1)"));
        assert!(body.contains("errored"));
        assert!(body.ends_with("<!-- travisFail -->"));
    }

    #[tokio::test]
    async fn test_requires_label_and_pull_request() {
        let api = Arc::new(InMemoryIssueApi::new().with_labels(&repo(), 7, &["bug"]));
        let ctx = context(api.clone());
        assert!(!report_ci_status(&ctx, &event("passed", true)).await.unwrap());
        assert!(!report_ci_status(&ctx, &event("passed", false)).await.unwrap());

        let unconfigured = BotContext::new(
            api.clone(),
            PullsConfig::default(),
            TemplateRegistry::with_defaults(),
            "warden-bot",
        );
        assert!(!report_ci_status(&unconfigured, &event("passed", true)).await.unwrap());
        assert!(api.calls().is_empty());
    }
}
