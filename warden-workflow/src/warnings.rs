//! Stale warning resolution.
//!
//! The bot posts warnings (merge conflicts, references missing from the
//! commits) as template comments. When a later update shows the problem is
//! gone, the warning comments are deleted again.

use futures::future::join_all;
use std::fmt;
use warden_common::Result;

use crate::api::{PullRequest, RepoRef};
use crate::context::BotContext;
use crate::references::ReferenceSearch;
use crate::templates::{FIX_COMMIT_WARNING, MERGE_CONFLICT_WARNING};

/// A retractable warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warning {
    /// The PR conflicts with its base branch
    MergeConflict,
    /// The description references issues no commit references
    FixCommit,
}

impl Warning {
    /// Evaluation order.
    pub const ALL: [Warning; 2] = [Warning::MergeConflict, Warning::FixCommit];

    /// Template identifier of the warning comment.
    pub fn template_id(self) -> &'static str {
        match self {
            Self::MergeConflict => MERGE_CONFLICT_WARNING,
            Self::FixCommit => FIX_COMMIT_WARNING,
        }
    }

    /// Whether the condition behind the warning no longer holds.
    async fn is_resolved(self, ctx: &BotContext, repo: &RepoRef, pull: &PullRequest) -> Result<bool> {
        match self {
            Self::MergeConflict => {
                // The payload copy may be stale; mergeability is recomputed on fetch.
                let fresh = ctx.api().get_pull(repo, pull.number).await?;
                Ok(fresh.mergeable == Some(true))
            }
            Self::FixCommit => {
                let search = ReferenceSearch::new(ctx.api(), repo, pull);
                let body = search.body_references().await?;
                let commits = search.commit_references().await?;
                Ok(body.is_subset(&commits))
            }
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.template_id())
    }
}

/// What a resolver pass retracted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    /// Warnings whose condition was found resolved
    pub resolved: Vec<Warning>,
    /// Number of comments deleted
    pub deleted_comments: usize,
}

/// Retract every warning whose condition has cleared.
pub async fn resolve_warnings(
    ctx: &BotContext,
    repo: &RepoRef,
    pull: &PullRequest,
) -> Result<ResolutionReport> {
    let mut report = ResolutionReport::default();

    for warning in Warning::ALL {
        if !warning.is_resolved(ctx, repo, pull).await? {
            continue;
        }
        report.resolved.push(warning);

        if let Some(label) = &ctx.config.merge_conflicts.label {
            match ctx.api().remove_label(repo, pull.number, label).await {
                Ok(()) => tracing::info!(pr = pull.number, label = %label, "Removed merge conflict label"),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let template = ctx.templates.get(warning.template_id())?;
        let comments = template
            .comments(ctx.api(), repo, pull.number, &ctx.bot_login)
            .await?;
        if comments.is_empty() {
            continue;
        }

        let deletions = comments
            .iter()
            .map(|c| ctx.api().delete_comment(repo, c.id));
        join_all(deletions)
            .await
            .into_iter()
            .collect::<Result<Vec<()>>>()?;

        report.deleted_comments += comments.len();
        tracing::info!(
            pr = pull.number,
            warning = %warning,
            deleted = comments.len(),
            "Retracted stale warning"
        );
    }

    Ok(report)
}
