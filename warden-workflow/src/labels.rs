//! Label reconciliation for pull request events.
//!
//! Reads the PR's labels once, threads them through the review state machine
//! and the size classifier, and writes the full set back only when the
//! names actually changed.

use warden_common::{util, Result};

use crate::context::BotContext;
use crate::github::PullRequestEvent;
use crate::review_state::{review_transition, ReviewAction, ReviewLabels};
use crate::size::size_labels;

/// Result of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    /// Labels already matched; nothing was written
    Unchanged,
    /// Labels were replaced with this set
    Updated(Vec<String>),
}

/// Reconcile the review and size labels of the event's pull request.
pub async fn reconcile_labels(ctx: &BotContext, event: &PullRequestEvent) -> Result<LabelOutcome> {
    let repo = event.repository.repo_ref();
    let number = event.pr_number();
    let action = event.review_action();
    let config = ctx.config.as_ref();

    let original = ctx.api().list_labels(&repo, number).await?;
    let mut labels = original.clone();

    if config.auto_update {
        labels = review_transition(
            &labels,
            &action,
            event.pull_request.author(),
            event.reviewer(),
            ReviewLabels::from_config(config),
        );
    }

    if matches!(action, ReviewAction::Opened | ReviewAction::Synchronize) {
        labels = size_labels(ctx.api(), &repo, number, &config.size, labels).await?;
    }

    if util::same_labels(&original, &labels) {
        tracing::debug!(pr = number, "Labels already up to date");
        return Ok(LabelOutcome::Unchanged);
    }

    ctx.api().set_labels(&repo, number, &labels).await?;
    tracing::info!(pr = number, labels = ?labels, "Updated pull request labels");

    Ok(LabelOutcome::Updated(labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RepoRef;
    use crate::memory::{ApiCall, InMemoryIssueApi};
    use crate::templates::TemplateRegistry;
    use std::sync::Arc;
    use warden_common::PullsConfig;

    fn repo() -> RepoRef {
        RepoRef::new("octo", "cat")
    }

    fn event(action: &str, reviewer: Option<&str>) -> PullRequestEvent {
        let review = reviewer
            .map(|login| serde_json::json!({ "user": { "login": login } }))
            .unwrap_or(serde_json::Value::Null);
        serde_json::from_value(serde_json::json!({
            "action": action,
            "pull_request": { "number": 7, "user": { "login": "alice" } },
            "repository": { "name": "cat", "owner": { "login": "octo" } },
            "review": review,
        }))
        .unwrap()
    }

    fn context(api: Arc<InMemoryIssueApi>, config: PullsConfig) -> BotContext {
        BotContext::new(api, config, TemplateRegistry::with_defaults(), "warden-bot")
    }

    fn auto_update() -> PullsConfig {
        PullsConfig {
            auto_update: true,
            ..PullsConfig::default()
        }
    }

    #[tokio::test]
    async fn test_review_submitted_by_other_user() {
        let api = Arc::new(InMemoryIssueApi::new().with_labels(&repo(), 7, &["needs-review"]));
        let ctx = context(api.clone(), auto_update());

        let outcome = reconcile_labels(&ctx, &event("submitted", Some("bob")))
            .await
            .unwrap();

        assert_eq!(outcome, LabelOutcome::Updated(vec!["reviewed".into()]));
        assert_eq!(
            api.calls(),
            vec![ApiCall::SetLabels {
                number: 7,
                labels: vec!["reviewed".into()]
            }]
        );
    }

    #[tokio::test]
    async fn test_no_write_without_change() {
        let api = Arc::new(InMemoryIssueApi::new().with_labels(&repo(), 7, &["needs-review"]));
        let ctx = context(api.clone(), auto_update());

        let outcome = reconcile_labels(&ctx, &event("submitted", Some("alice")))
            .await
            .unwrap();

        assert_eq!(outcome, LabelOutcome::Unchanged);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_auto_update_disabled_skips_review_labels() {
        let api = Arc::new(InMemoryIssueApi::new());
        let ctx = context(api.clone(), PullsConfig::default());

        let outcome = reconcile_labels(&ctx, &event("opened", None)).await.unwrap();
        assert_eq!(outcome, LabelOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_opened_adds_review_and_size_labels() {
        let api = Arc::new(
            InMemoryIssueApi::new()
                .with_labels(&repo(), 7, &["bug"])
                .with_files(&repo(), 7, &[("src/main.rs", 75)]),
        );
        let mut config = auto_update();
        config.size.labels = [("S", 0), ("M", 50)].into_iter().collect();
        let ctx = context(api.clone(), config);

        reconcile_labels(&ctx, &event("opened", None)).await.unwrap();
        assert_eq!(api.labels(&repo(), 7), vec!["bug", "needs-review", "M"]);
    }

    #[tokio::test]
    async fn test_closed_does_not_fetch_files() {
        let api = Arc::new(
            InMemoryIssueApi::new()
                .with_labels(&repo(), 7, &["reviewed"])
                .failing_on("list_pull_files"),
        );
        let mut config = auto_update();
        config.size.labels = [("S", 0)].into_iter().collect();
        let ctx = context(api.clone(), config);

        let outcome = reconcile_labels(&ctx, &event("closed", None)).await.unwrap();
        assert_eq!(outcome, LabelOutcome::Updated(vec![]));
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let api = Arc::new(InMemoryIssueApi::new().failing_on("list_labels"));
        let ctx = context(api.clone(), auto_update());
        assert!(reconcile_labels(&ctx, &event("opened", None)).await.is_err());
        assert!(api.calls().is_empty());
    }
}
