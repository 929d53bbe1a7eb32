//! Assign requested reviewers to the pull request.

use warden_common::Result;

use crate::context::BotContext;
use crate::github::PullRequestEvent;

/// Add the requested reviewer as an assignee. Team review requests carry no
/// user and are ignored.
pub async fn assign_reviewer(ctx: &BotContext, event: &PullRequestEvent) -> Result<Option<String>> {
    let Some(reviewer) = event.requested_reviewer.as_ref() else {
        return Ok(None);
    };

    ctx.api()
        .add_assignees(
            &event.repository.repo_ref(),
            event.pr_number(),
            std::slice::from_ref(&reviewer.login),
        )
        .await?;
    tracing::info!(
        pr = event.pr_number(),
        reviewer = %reviewer.login,
        "Assigned requested reviewer"
    );

    Ok(Some(reviewer.login.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RepoRef;
    use crate::memory::InMemoryIssueApi;
    use crate::templates::TemplateRegistry;
    use std::sync::Arc;
    use warden_common::PullsConfig;

    fn event(reviewer: Option<&str>) -> PullRequestEvent {
        let mut payload = serde_json::json!({
            "action": "review_requested",
            "pull_request": { "number": 3, "user": { "login": "alice" } },
            "repository": { "name": "cat", "owner": { "login": "octo" } }
        });
        if let Some(login) = reviewer {
            payload["requested_reviewer"] = serde_json::json!({ "login": login });
        }
        serde_json::from_value(payload).unwrap()
    }

    #[tokio::test]
    async fn test_assigns_requested_reviewer() {
        let api = Arc::new(InMemoryIssueApi::new());
        let ctx = BotContext::new(
            api.clone(),
            PullsConfig::default(),
            TemplateRegistry::with_defaults(),
            "warden-bot",
        );

        let assigned = assign_reviewer(&ctx, &event(Some("bob"))).await.unwrap();
        assert_eq!(assigned.as_deref(), Some("bob"));
        assert_eq!(api.assignees(&RepoRef::new("octo", "cat"), 3), vec!["bob"]);

        assert_eq!(assign_reviewer(&ctx, &event(None)).await.unwrap(), None);
    }
}
