/// Reciprocal Rank Fusion (RRF)
///
/// score(d) = sum over lists containing d of 1 / (rank + offset), rank 0-based.
///
/// Only rank positions enter the score, so lists produced under unrelated
/// scoring scales (cosine similarity, BM25, recipe similarity) combine without
/// normalization. The same rule fuses dense/sparse legs inside one backend
/// and the per-backend lists inside the orchestrator.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use super::{Candidate, CandidateKey, RankedList};
use crate::errors::OracleError;

/// Default smoothing constant; keeps rank 0 from dominating.
pub const DEFAULT_RRF_OFFSET: f64 = 60.0;

/// Where a fused candidate appeared in the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Appearance {
    /// Index of the input list, in the order lists were supplied
    pub list: usize,
    /// 0-based position inside that list
    pub rank: usize,
}

/// A candidate after fusion.
#[derive(Debug, Clone)]
pub struct FusedCandidate {
    /// Payload from the first list the candidate appeared in
    pub candidate: Candidate,
    /// Sum of reciprocal-rank contributions; an ordering key, not a probability
    pub fusion_score: f64,
    /// Every input position that contributed, first appearance first
    pub appearances: Vec<Appearance>,
}

/// Reciprocal-rank fusion with a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct RrfFusion {
    offset: f64,
}

impl Default for RrfFusion {
    fn default() -> Self {
        RrfFusion { offset: DEFAULT_RRF_OFFSET }
    }
}

impl RrfFusion {
    pub fn new(offset: f64) -> Result<Self, OracleError> {
        if !offset.is_finite() || offset <= 0.0 {
            return Err(OracleError::invalid_config(
                "retrieval.rrf_offset",
                "rrf_offset must be a positive finite number",
            ));
        }
        Ok(RrfFusion { offset })
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Contribution of a single appearance at 0-based `rank`.
    pub fn contribution(&self, rank: usize) -> f64 {
        1.0 / (rank as f64 + self.offset)
    }

    /// Fuse `lists` into one ranking of at most `top_k` candidates.
    ///
    /// Candidates sharing a key are merged and their contributions summed.
    /// Equal scores keep the order of first appearance: earlier list first,
    /// then lower in-list rank. Nothing is dropped except by truncation.
    pub fn fuse(&self, lists: &[RankedList], top_k: NonZeroUsize) -> Vec<FusedCandidate> {
        let mut fused = self.fuse_all(lists);
        fused.truncate(top_k.get());
        fused
    }

    /// Fuse without truncation.
    pub fn fuse_all(&self, lists: &[RankedList]) -> Vec<FusedCandidate> {
        let mut index: HashMap<CandidateKey, usize> = HashMap::new();
        let mut entries: Vec<FusedCandidate> = Vec::new();

        for (list_idx, list) in lists.iter().enumerate() {
            for (rank, candidate) in list.candidates().iter().enumerate() {
                let appearance = Appearance { list: list_idx, rank };
                match index.get(&candidate.key()) {
                    Some(&slot) => entries[slot].appearances.push(appearance),
                    None => {
                        index.insert(candidate.key(), entries.len());
                        entries.push(FusedCandidate {
                            candidate: candidate.clone(),
                            fusion_score: 0.0,
                            appearances: vec![appearance],
                        });
                    }
                }
            }
        }

        for entry in &mut entries {
            entry.fusion_score = self.score(&entry.appearances);
        }

        // entries are in first-appearance order, so a stable sort on score alone
        // yields the (list, rank) tie-break.
        entries.sort_by(|a, b| b.fusion_score.total_cmp(&a.fusion_score));

        tracing::debug!(
            lists = lists.len(),
            fused = entries.len(),
            offset = self.offset,
            "Reciprocal rank fusion complete"
        );

        entries
    }

    /// Sum contributions smallest-first so equal rank multisets give bit-identical scores.
    fn score(&self, appearances: &[Appearance]) -> f64 {
        let mut ranks: Vec<usize> = appearances.iter().map(|a| a.rank).collect();
        ranks.sort_unstable_by(|a, b| b.cmp(a));
        ranks.into_iter().map(|r| self.contribution(r)).sum()
    }
}
