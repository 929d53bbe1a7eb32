//! Closing-keyword issue references.
//!
//! A pull request references an issue with text like `fixes #12`. Candidates
//! are pulled out of free text with one pattern per keyword, then validated
//! against the API: only open issues that are not themselves pull requests
//! count.

use futures::future::try_join_all;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;
use warden_common::Result;

use crate::api::{IssueApi, PullRequest, RepoRef};

/// Keywords GitHub recognizes for closing issues.
pub const CLOSING_KEYWORDS: [&str; 9] = [
    "close", "closes", "closed", "fix", "fixes", "fixed", "resolve", "resolves", "resolved",
];

static KEYWORD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    CLOSING_KEYWORDS
        .iter()
        .map(|kw| Regex::new(&format!(r"(?i){kw}:? #([0-9]+)")).unwrap())
        .collect()
});

/// Extract candidate issue numbers from one piece of text.
///
/// Each keyword contributes at most its first match. Keywords are not
/// word-anchored, so one reference may be found by several keywords; the
/// result may contain repeats.
pub fn extract_candidates(text: &str) -> Vec<u64> {
    KEYWORD_PATTERNS
        .iter()
        .filter_map(|re| re.captures(text))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

// ============================================================================
// Reference Set
// ============================================================================

/// Ascending, duplicate-free set of issue numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceSet(BTreeSet<u64>);

impl ReferenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, number: u64) -> bool {
        self.0.contains(&number)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().copied()
    }

    pub fn is_subset(&self, other: &ReferenceSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// Numbers in `self` that are missing from `other`.
    pub fn difference(&self, other: &ReferenceSet) -> ReferenceSet {
        self.0.difference(&other.0).copied().collect()
    }

    /// Join the numbers with `separator`, e.g. `"12, #34"` for `", #"`.
    pub fn join(&self, separator: &str) -> String {
        self.iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl FromIterator<u64> for ReferenceSet {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ReferenceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numbers: Vec<String> = self.iter().map(|n| format!("#{n}")).collect();
        write!(f, "[{}]", numbers.join(", "))
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Find the open, non-PR issues referenced by any of `sources`.
///
/// Candidates are validated concurrently. An issue that does not exist is
/// not a reference; any other API failure propagates.
pub async fn find_references<S: AsRef<str>>(
    api: &dyn IssueApi,
    repo: &RepoRef,
    sources: &[S],
) -> Result<ReferenceSet> {
    let candidates: BTreeSet<u64> = sources
        .iter()
        .flat_map(|s| extract_candidates(s.as_ref()))
        .collect();

    let checks = candidates.into_iter().map(|number| async move {
        match api.get_issue(repo, number).await {
            Ok(issue) if !issue.is_pull_request() && issue.is_open() => Ok(Some(number)),
            Ok(_) => Ok(None),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    });

    let valid = try_join_all(checks).await?;
    Ok(valid.into_iter().flatten().collect())
}

/// Reference lookups for one pull request.
pub struct ReferenceSearch<'a> {
    api: &'a dyn IssueApi,
    repo: &'a RepoRef,
    pull: &'a PullRequest,
}

impl<'a> ReferenceSearch<'a> {
    pub fn new(api: &'a dyn IssueApi, repo: &'a RepoRef, pull: &'a PullRequest) -> Self {
        Self { api, repo, pull }
    }

    /// Issues referenced from the PR description.
    pub async fn body_references(&self) -> Result<ReferenceSet> {
        find_references(self.api, self.repo, &[self.pull.body_text()]).await
    }

    /// Issues referenced from any commit message of the PR.
    pub async fn commit_references(&self) -> Result<ReferenceSet> {
        let commits = self
            .api
            .list_pull_commits(self.repo, self.pull.number)
            .await?;
        let messages: Vec<&str> = commits.iter().map(|c| c.commit.message.as_str()).collect();
        find_references(self.api, self.repo, &messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::User;
    use crate::memory::InMemoryIssueApi;
    use proptest::prelude::*;

    fn repo() -> RepoRef {
        RepoRef::new("octo", "cat")
    }

    fn refs(numbers: &[u64]) -> ReferenceSet {
        numbers.iter().copied().collect()
    }

    #[test]
    fn test_extract_candidates_keywords() {
        assert_eq!(extract_candidates("Fixes #12"), vec![12]);
        assert_eq!(extract_candidates("closes: #7"), vec![7]);
        assert_eq!(extract_candidates("RESOLVED #3"), vec![3]);
        // Not word-anchored.
        assert_eq!(extract_candidates("prefixes #5"), vec![5]);
        assert!(extract_candidates("see #4").is_empty());
        assert!(extract_candidates("fixes # 4").is_empty());
    }

    #[test]
    fn test_extract_first_match_per_keyword() {
        // "fix" only reports its first hit.
        let found = extract_candidates("fix #1 and fix #2, closes #3");
        assert!(found.contains(&1));
        assert!(!found.contains(&2));
        assert!(found.contains(&3));
    }

    #[test]
    fn test_extract_skips_overflowing_numbers() {
        assert!(extract_candidates("fixes #99999999999999999999999").is_empty());
    }

    #[test]
    fn test_reference_set_ops() {
        let body = refs(&[34, 12, 12]);
        let commits = refs(&[12]);
        assert_eq!(body.len(), 2);
        assert!(commits.is_subset(&body));
        assert!(!body.is_subset(&commits));
        assert_eq!(body.difference(&commits), refs(&[34]));
        assert_eq!(body.join(", #"), "12, #34");
        assert_eq!(body.to_string(), "[#12, #34]");
    }

    #[tokio::test]
    async fn test_find_references_validates_candidates() {
        let api = InMemoryIssueApi::new()
            .with_issue(&repo(), 1, "open")
            .with_issue(&repo(), 2, "closed")
            .with_pull_request_issue(&repo(), 3);

        let found = find_references(&api, &repo(), &["fixes #1", "closes #2", "resolves #3 fix #9"])
            .await
            .unwrap();
        assert_eq!(found, refs(&[1]));
    }

    #[tokio::test]
    async fn test_find_references_propagates_api_failure() {
        let api = InMemoryIssueApi::new()
            .with_issue(&repo(), 1, "open")
            .failing_on("get_issue");

        assert!(find_references(&api, &repo(), &["fixes #1"]).await.is_err());
    }

    #[tokio::test]
    async fn test_reference_search_body_and_commits() {
        let pull = PullRequest {
            number: 10,
            body: Some("Fixes #12, closes #34".into()),
            state: "open".into(),
            user: User::new("alice"),
            mergeable: None,
        };
        let api = InMemoryIssueApi::new()
            .with_issue(&repo(), 12, "open")
            .with_issue(&repo(), 34, "open")
            .with_commits(&repo(), 10, &["fixes #12", "tidy up"]);

        let repo = repo();
        let search = ReferenceSearch::new(&api, &repo, &pull);
        let body = search.body_references().await.unwrap();
        let commits = search.commit_references().await.unwrap();

        assert_eq!(body, refs(&[12, 34]));
        assert_eq!(commits, refs(&[12]));
    }

    #[tokio::test]
    async fn test_reference_search_repeated_keyword_takes_first() {
        let pull = PullRequest {
            number: 10,
            body: Some("Fixes #12, fixes #34".into()),
            state: "open".into(),
            user: User::new("alice"),
            mergeable: None,
        };
        let api = InMemoryIssueApi::new()
            .with_issue(&repo(), 12, "open")
            .with_issue(&repo(), 34, "open");

        let repo = repo();
        let search = ReferenceSearch::new(&api, &repo, &pull);
        assert_eq!(search.body_references().await.unwrap(), refs(&[12]));
    }

    #[tokio::test]
    async fn test_null_body_has_no_references() {
        let pull = PullRequest {
            number: 10,
            body: None,
            state: "open".into(),
            user: User::new("alice"),
            mergeable: None,
        };
        let api = InMemoryIssueApi::new();
        let repo = repo();
        let search = ReferenceSearch::new(&api, &repo, &pull);
        assert!(search.body_references().await.unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_reference_set_is_sorted_and_unique(numbers in prop::collection::vec(0u64..50, 0..20)) {
            let set: ReferenceSet = numbers.iter().copied().collect();
            let listed: Vec<u64> = set.iter().collect();
            let mut expected = numbers.clone();
            expected.sort_unstable();
            expected.dedup();
            prop_assert_eq!(listed, expected);
        }

        #[test]
        fn prop_extracted_numbers_come_from_text(n in 0u64..100_000, kw in prop::sample::select(CLOSING_KEYWORDS.to_vec())) {
            let text = format!("This {kw} #{n} for real");
            let found = extract_candidates(&text);
            prop_assert!(!found.is_empty());
            prop_assert!(found.iter().all(|&f| f == n));
        }
    }
}
