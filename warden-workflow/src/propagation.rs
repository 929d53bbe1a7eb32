//! Copying pull request labels onto the issues it closes.

use futures::future::try_join_all;
use warden_common::{LabelFilter, Result};

use crate::api::RepoRef;
use crate::context::BotContext;
use crate::references::ReferenceSet;

/// Comment posted on the PR when the `references.labels` policy is invalid.
pub const INVALID_POLICY_COMMENT: &str = "**ERROR:** Invalid `references.labels` configuration.";

/// What a propagation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    /// Labels added, per issue number
    pub added: Vec<(u64, Vec<String>)>,
    /// The policy was invalid and reported on the PR instead
    pub config_error: bool,
}

/// Append the PR's labels, filtered by the configured policy, to every
/// referenced issue.
///
/// Only adds labels; nothing is ever removed from an issue. Labels the issue
/// already carries are not sent again.
pub async fn propagate_labels(
    ctx: &BotContext,
    repo: &RepoRef,
    pr_number: u64,
    references: &ReferenceSet,
) -> Result<PropagationReport> {
    let mut report = PropagationReport::default();

    let Some(policy) = ctx.config.references.labels.as_ref() else {
        return Ok(report);
    };
    if references.is_empty() {
        return Ok(report);
    }

    let filter = match policy.label_filter() {
        Ok(Some(filter)) => filter,
        Ok(None) => return Ok(report),
        Err(e) => {
            tracing::warn!(pr = pr_number, error = %e, "Invalid reference label policy");
            ctx.api()
                .create_comment(repo, pr_number, INVALID_POLICY_COMMENT)
                .await?;
            report.config_error = true;
            return Ok(report);
        }
    };

    let pr_labels = ctx.api().list_labels(repo, pr_number).await?;
    let wanted = filter.apply(&pr_labels);

    let updates = references
        .iter()
        .map(|issue| label_issue(ctx, repo, issue, &wanted));
    report.added = try_join_all(updates).await?.into_iter().flatten().collect();

    if !report.added.is_empty() {
        tracing::info!(
            pr = pr_number,
            references = %references,
            issues = report.added.len(),
            "Propagated labels to referenced issues"
        );
    }

    Ok(report)
}

async fn label_issue(
    ctx: &BotContext,
    repo: &RepoRef,
    issue: u64,
    wanted: &[String],
) -> Result<Option<(u64, Vec<String>)>> {
    let existing = ctx.api().list_labels(repo, issue).await?;
    let missing = LabelFilter::Exclude(existing).apply(wanted);
    if missing.is_empty() {
        return Ok(None);
    }

    ctx.api().add_labels(repo, issue, &missing).await?;
    Ok(Some((issue, missing)))
}
