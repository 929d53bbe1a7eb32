//! Warning about issues referenced only from the PR description.
//!
//! GitHub closes an issue when a commit that references it lands, so a
//! `fixes #12` that only appears in the description may never close #12.
//! When that happens the author gets one warning comment. On a freshly
//! opened PR without such a gap, the PR's labels are propagated to the
//! issues its commits reference.

use warden_common::Result;

use crate::api::{PullRequest, RepoRef};
use crate::context::BotContext;
use crate::propagation::{propagate_labels, PropagationReport};
use crate::references::{ReferenceSearch, ReferenceSet};
use crate::templates::FIX_COMMIT_WARNING;

/// What the reference check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceOutcome {
    /// Posted a warning naming the references missing from the commits
    Warned(ReferenceSet),
    /// Propagated labels to the commits' references
    Propagated(PropagationReport),
    /// Nothing to do
    Skipped,
}

/// `"it"` for a single issue, `"them"` otherwise.
fn issue_pronoun(missing: &ReferenceSet) -> &'static str {
    if missing.len() == 1 {
        "it"
    } else {
        "them"
    }
}

/// Check the PR's references and warn or propagate labels.
pub async fn check_references(
    ctx: &BotContext,
    repo: &RepoRef,
    pull: &PullRequest,
    opened: bool,
) -> Result<ReferenceOutcome> {
    let search = ReferenceSearch::new(ctx.api(), repo, pull);
    let body = search.body_references().await?;
    let commits = search.commit_references().await?;
    let missing = body.difference(&commits);

    let template = ctx.templates.get(FIX_COMMIT_WARNING)?;
    let existing = template
        .comments(ctx.api(), repo, pull.number, &ctx.bot_login)
        .await?;

    if existing.is_empty() && !missing.is_empty() {
        let issues = missing.join(", #");
        let fix_issues = missing.join(", fixes #");
        let comment = template.format(&[
            ("author", pull.author()),
            ("issues", issues.as_str()),
            ("fixIssues", fix_issues.as_str()),
            ("issuePronoun", issue_pronoun(&missing)),
        ]);
        ctx.api().create_comment(repo, pull.number, &comment).await?;

        tracing::info!(
            pr = pull.number,
            references = %missing,
            "Warned about references missing from commits"
        );
        return Ok(ReferenceOutcome::Warned(missing));
    }

    let policy_enabled = ctx
        .config
        .references
        .labels
        .as_ref()
        .is_some_and(|p| p.is_enabled());
    if !opened || !policy_enabled {
        return Ok(ReferenceOutcome::Skipped);
    }

    let report = propagate_labels(ctx, repo, pull.number, &commits).await?;
    Ok(ReferenceOutcome::Propagated(report))
}
