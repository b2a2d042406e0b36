//! Combining the two candidate lists.
//!
//! Policy is first-source-wins: walk the collaborative list in order, then
//! the content list, appending every identifier not already taken, and stop
//! at `top_n`. Each source keeps its internal order and the collaborative
//! source wins cross-source ties.

use catalog::ItemId;
use models::RankedCandidate;
use std::collections::HashSet;

/// Merge two best-first identifier lists into at most `top_n` distinct ids.
///
/// A non-positive `top_n` yields an empty result.
pub fn merge_recommendations(recs_a: &[ItemId], recs_b: &[ItemId], top_n: i64) -> Vec<ItemId> {
    if top_n <= 0 {
        return Vec::new();
    }
    let limit = usize::try_from(top_n).unwrap_or(usize::MAX);

    let mut seen: HashSet<&ItemId> = HashSet::new();
    let mut merged = Vec::with_capacity(limit.min(recs_a.len() + recs_b.len()));

    for item_id in recs_a.iter().chain(recs_b) {
        if merged.len() == limit {
            break;
        }
        if seen.insert(item_id) {
            merged.push(item_id.clone());
        }
    }

    merged
}

/// Same policy as [`merge_recommendations`] over tagged candidates.
///
/// The winning candidate keeps its source tag; ranks are
/// renumbered to positions in the merged list.
pub fn merge_candidates(
    a: Vec<RankedCandidate>,
    b: Vec<RankedCandidate>,
    top_n: i64,
) -> Vec<RankedCandidate> {
    if top_n <= 0 {
        return Vec::new();
    }
    let limit = usize::try_from(top_n).unwrap_or(usize::MAX);

    let mut seen: HashSet<ItemId> = HashSet::new();
    let mut merged = Vec::with_capacity(limit.min(a.len() + b.len()));

    for mut candidate in a.into_iter().chain(b) {
        if merged.len() == limit {
            break;
        }
        if seen.insert(candidate.item_id.clone()) {
            candidate.rank = merged.len();
            merged.push(candidate);
        }
    }

    merged
}
