use std::collections::HashSet;

use crate::models::Candidate;

/// Drop candidates whose URL was already seen, keeping the first occurrence.
/// Candidates without a URL cannot be compared and are all kept.
pub fn dedup_by_url(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| c.url.is_empty() || seen.insert(c.url.clone()))
        .collect()
}
