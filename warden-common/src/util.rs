//! Utility functions for Warden services.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Works on character boundaries, so multi-byte UTF-8 input is safe.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Sort label names and drop duplicates, producing the canonical form used
/// for value comparison of label sets.
pub fn sorted_labels(labels: &[String]) -> Vec<String> {
    let mut sorted = labels.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

/// Whether two label lists hold the same names, ignoring order and repeats.
pub fn same_labels(a: &[String], b: &[String]) -> bool {
    sorted_labels(a) == sorted_labels(b)
}
