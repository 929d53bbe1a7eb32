//! Size classification.
//!
//! A PR carries exactly one size bucket label, chosen from the total number
//! of changed lines across its files.

use warden_common::{util, Result, SizeBucketTable, SizeConfig};

use crate::api::{IssueApi, PullRequestFile, RepoRef};

/// Sum of `changes` over files not listed in `exclude`.
pub fn total_changes(files: &[PullRequestFile], exclude: &[String]) -> u64 {
    files
        .iter()
        .filter(|f| !exclude.contains(&f.filename))
        .map(|f| f.changes)
        .sum()
}

/// Replace any bucket label in `labels` with the bucket for `total`.
///
/// Returns `labels` unchanged when the result holds the same names, and
/// when the table is empty.
pub fn apply_size_label(table: &SizeBucketTable, labels: &[String], total: u64) -> Vec<String> {
    let Some(bucket) = table.classify(total) else {
        return labels.to_vec();
    };

    let mut next: Vec<String> = labels
        .iter()
        .filter(|l| !table.contains(l))
        .cloned()
        .collect();
    next.push(bucket.to_string());

    if util::same_labels(&next, labels) {
        return labels.to_vec();
    }
    next
}

/// Fetch the PR's files and apply the size label for them.
pub async fn size_labels(
    api: &dyn IssueApi,
    repo: &RepoRef,
    number: u64,
    size: &SizeConfig,
    labels: Vec<String>,
) -> Result<Vec<String>> {
    if size.labels.is_empty() {
        return Ok(labels);
    }

    let files = api.list_pull_files(repo, number).await?;
    let total = total_changes(&files, &size.exclude);
    let next = apply_size_label(&size.labels, &labels, total);

    tracing::debug!(
        pr = number,
        total_changes = total,
        bucket = ?size.labels.classify(total),
        "Classified pull request size"
    );

    Ok(next)
}
