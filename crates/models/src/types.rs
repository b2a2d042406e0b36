//! Candidate types shared between the predictors and the merge step.

use catalog::ItemId;
use std::fmt;

/// Which signal produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateSource {
    /// Matrix-factorization over the rating matrix
    Collaborative,
    /// Similarity between item features and the viewing history
    Content,
}

impl fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateSource::Collaborative => write!(f, "collaborative"),
            CandidateSource::Content => write!(f, "content"),
        }
    }
}

/// One entry of a best-first candidate list.
///
/// Produced from a predictor's output and consumed only by the merge; never
/// persisted. `rank` is the 0-based position in its list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCandidate {
    pub item_id: ItemId,
    pub source: CandidateSource,
    pub rank: usize,
}

impl RankedCandidate {
    pub fn new(item_id: impl Into<ItemId>, source: CandidateSource, rank: usize) -> Self {
        Self {
            item_id: item_id.into(),
            source,
            rank,
        }
    }
}

/// Tag a best-first list of identifiers with its source and positions
pub fn rank_candidates(item_ids: Vec<ItemId>, source: CandidateSource) -> Vec<RankedCandidate> {
    item_ids
        .into_iter()
        .enumerate()
        .map(|(rank, item_id)| RankedCandidate::new(item_id, source, rank))
        .collect()
}
