//! Review-status label state machine.
//!
//! The state lives entirely in label membership: a PR *needs review* while
//! the needs-review label is applied, is *reviewed* while the reviewed label
//! is applied, and is neutral otherwise. Transitions are a strict priority
//! chain and only the first matching rule fires.

use warden_common::PullsConfig;

/// Pull request event action relevant to review status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    Opened,
    Reopened,
    /// A review was submitted
    Submitted,
    /// New commits were pushed
    Synchronize,
    Closed,
    Other(String),
}

impl From<&str> for ReviewAction {
    fn from(action: &str) -> Self {
        match action {
            "opened" => Self::Opened,
            "reopened" => Self::Reopened,
            "submitted" => Self::Submitted,
            "synchronize" => Self::Synchronize,
            "closed" => Self::Closed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// The configured review-status label names.
#[derive(Debug, Clone, Copy)]
pub struct ReviewLabels<'a> {
    pub needs_review: &'a str,
    pub reviewed: &'a str,
}

impl<'a> ReviewLabels<'a> {
    pub fn new(needs_review: &'a str, reviewed: &'a str) -> Self {
        Self {
            needs_review,
            reviewed,
        }
    }

    pub fn from_config(config: &'a PullsConfig) -> Self {
        Self::new(&config.needs_review.label, &config.reviewed.label)
    }
}

/// Rule selected by [`select_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// opened/reopened: add needs-review
    RequestReview,
    /// review by someone other than the author: needs-review → reviewed
    MarkReviewed,
    /// new commits: reviewed → needs-review
    InvalidateReview,
    /// closed: drop reviewed
    DropReviewed,
    /// closed: drop needs-review
    DropNeedsReview,
}

/// Pick the single rule that applies, if any.
pub fn select_transition(
    labels: &[String],
    action: &ReviewAction,
    author: &str,
    reviewer: Option<&str>,
    names: ReviewLabels<'_>,
) -> Option<Transition> {
    let needs_review = labels.iter().any(|l| l == names.needs_review);
    let reviewed = labels.iter().any(|l| l == names.reviewed);

    match action {
        ReviewAction::Opened | ReviewAction::Reopened => Some(Transition::RequestReview),
        ReviewAction::Submitted
            if needs_review && reviewer.is_some_and(|r| r != author) =>
        {
            Some(Transition::MarkReviewed)
        }
        ReviewAction::Synchronize if reviewed => Some(Transition::InvalidateReview),
        ReviewAction::Closed if reviewed => Some(Transition::DropReviewed),
        ReviewAction::Closed if needs_review => Some(Transition::DropNeedsReview),
        _ => None,
    }
}

/// Compute the labels after a PR event.
///
/// Pure and deterministic. Replacements keep the position of the replaced
/// label, and the result never contains a label twice.
pub fn review_transition(
    labels: &[String],
    action: &ReviewAction,
    author: &str,
    reviewer: Option<&str>,
    names: ReviewLabels<'_>,
) -> Vec<String> {
    let mut next = labels.to_vec();

    match select_transition(labels, action, author, reviewer, names) {
        Some(Transition::RequestReview) => next.push(names.needs_review.to_string()),
        Some(Transition::MarkReviewed) => replace(&mut next, names.needs_review, names.reviewed),
        Some(Transition::InvalidateReview) => {
            replace(&mut next, names.reviewed, names.needs_review)
        }
        Some(Transition::DropReviewed) => next.retain(|l| l != names.reviewed),
        Some(Transition::DropNeedsReview) => next.retain(|l| l != names.needs_review),
        None => return next,
    }

    dedup_preserving_order(&mut next);
    next
}

fn replace(labels: &mut [String], from: &str, to: &str) {
    for label in labels.iter_mut().filter(|l| l.as_str() == from) {
        *label = to.to_string();
    }
}

/// Drop repeated labels, keeping the first occurrence.
pub(crate) fn dedup_preserving_order(labels: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    labels.retain(|l| seen.insert(l.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    const NAMES: ReviewLabels<'static> = ReviewLabels {
        needs_review: "needs-review",
        reviewed: "reviewed",
    };

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn run(current: &[&str], action: &str, reviewer: Option<&str>) -> Vec<String> {
        review_transition(
            &labels(current),
            &ReviewAction::from(action),
            "alice",
            reviewer,
            NAMES,
        )
    }

    #[test]
    fn test_submitted_by_other_marks_reviewed() {
        assert_eq!(run(&["needs-review"], "submitted", Some("bob")), labels(&["reviewed"]));
    }

    #[test]
    fn test_synchronize_invalidates_review() {
        assert_eq!(run(&["reviewed"], "synchronize", None), labels(&["needs-review"]));
    }

    #[test_case(&[], "opened", None, &["needs-review"] ; "opened adds needs review")]
    #[test_case(&["bug"], "reopened", None, &["bug", "needs-review"] ; "reopened appends")]
    #[test_case(&["needs-review"], "opened", None, &["needs-review"] ; "opened does not duplicate")]
    #[test_case(&["needs-review"], "submitted", Some("alice"), &["needs-review"] ; "self review ignored")]
    #[test_case(&["needs-review"], "submitted", None, &["needs-review"] ; "unknown reviewer ignored")]
    #[test_case(&["bug", "needs-review", "size/S"], "submitted", Some("bob"), &["bug", "reviewed", "size/S"] ; "replacement keeps position")]
    #[test_case(&["needs-review"], "synchronize", None, &["needs-review"] ; "synchronize without review")]
    #[test_case(&["reviewed", "bug"], "closed", None, &["bug"] ; "closed drops reviewed")]
    #[test_case(&["needs-review"], "closed", None, &[] ; "closed drops needs review")]
    #[test_case(&["needs-review", "reviewed"], "closed", None, &["needs-review"] ; "closed prefers reviewed rule")]
    #[test_case(&["reviewed"], "labeled", None, &["reviewed"] ; "other actions unchanged")]
    fn test_transition_table(current: &[&str], action: &str, reviewer: Option<&str>, expected: &[&str]) {
        assert_eq!(run(current, action, reviewer), labels(expected));
    }

    fn label_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            prop::sample::select(vec!["needs-review", "reviewed", "bug", "size/M"]),
            0..5,
        )
        .prop_map(|v| v.into_iter().map(String::from).collect())
    }

    fn action_strategy() -> impl Strategy<Value = ReviewAction> {
        prop::sample::select(vec!["opened", "reopened", "submitted", "synchronize", "closed", "edited"])
            .prop_map(ReviewAction::from)
    }

    proptest! {
        #[test]
        fn prop_transition_converges(
            current in label_strategy(),
            action in action_strategy(),
            reviewer in prop::option::of(prop::sample::select(vec!["alice", "bob"])),
        ) {
            let step = |l: &[String]| review_transition(l, &action, "alice", reviewer, NAMES);
            let once = step(&current);
            let twice = step(&once);
            let thrice = step(&twice);
            prop_assert_eq!(&twice, &thrice);

            let both = current.iter().any(|l| l == "needs-review")
                && current.iter().any(|l| l == "reviewed");
            if !both {
                prop_assert_eq!(&once, &twice);
            }
        }

        #[test]
        fn prop_result_has_no_duplicates_when_input_has_none(
            current in label_strategy(),
            action in action_strategy(),
        ) {
            let mut unique = current.clone();
            dedup_preserving_order(&mut unique);
            let next = review_transition(&unique, &action, "alice", Some("bob"), NAMES);
            let mut deduped = next.clone();
            dedup_preserving_order(&mut deduped);
            prop_assert_eq!(next, deduped);
        }

        #[test]
        fn prop_no_rule_means_no_change(
            current in label_strategy(),
            action in action_strategy(),
        ) {
            if select_transition(&current, &action, "alice", Some("bob"), NAMES).is_none() {
                prop_assert_eq!(
                    review_transition(&current, &action, "alice", Some("bob"), NAMES),
                    current
                );
            }
        }
    }
}
