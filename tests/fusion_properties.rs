use async_trait::async_trait;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::Arc;

use brew_oracle::rerank::{CrossEncoderReranker, PairScorer, ScorerError};
use brew_oracle::search::{Candidate, RankedList, RrfFusion};

fn lists_from(raw: &[Vec<u8>]) -> Vec<RankedList> {
    raw.iter()
        .map(|ids| {
            RankedList::new(
                "idx",
                ids.iter()
                    .map(|id| Candidate::new("idx", format!("c{}", id), format!("text {}", id), 0.0))
                    .collect(),
            )
        })
        .collect()
}

fn distinct(raw: &[Vec<u8>]) -> BTreeSet<String> {
    raw.iter().flatten().map(|id| format!("c{}", id)).collect()
}

struct TableScorer(Vec<f32>);

#[async_trait]
impl PairScorer for TableScorer {
    async fn score(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>, ScorerError> {
        Ok(texts.iter().enumerate().map(|(i, _)| self.0[i % self.0.len()]).collect())
    }

    fn model_name(&self) -> &str {
        "table"
    }
}

fn raw_lists() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(0u8..24, 0..12), 0..5)
}

proptest! {
    #[test]
    fn every_distinct_candidate_survives_fusion(raw in raw_lists()) {
        let fused = RrfFusion::default().fuse_all(&lists_from(&raw));
        let ids: BTreeSet<String> = fused.iter().map(|f| f.candidate.id.clone()).collect();
        prop_assert_eq!(fused.len(), ids.len());
        prop_assert_eq!(ids, distinct(&raw));
    }

    #[test]
    fn truncation_is_a_prefix(raw in raw_lists(), k in 1usize..30) {
        let fusion = RrfFusion::default();
        let lists = lists_from(&raw);
        let all = fusion.fuse_all(&lists);
        let top = fusion.fuse(&lists, NonZeroUsize::new(k).unwrap());
        prop_assert_eq!(top.len(), k.min(all.len()));
        for (a, b) in top.iter().zip(all.iter()) {
            prop_assert_eq!(&a.candidate.id, &b.candidate.id);
        }
    }

    #[test]
    fn scores_are_non_increasing(raw in raw_lists()) {
        let fused = RrfFusion::default().fuse_all(&lists_from(&raw));
        for pair in fused.windows(2) {
            prop_assert!(pair[0].fusion_score >= pair[1].fusion_score);
        }
    }

    #[test]
    fn fusion_is_deterministic(raw in raw_lists(), offset in 1.0f64..200.0) {
        let fusion = RrfFusion::new(offset).unwrap();
        let lists = lists_from(&raw);
        let first = fusion.fuse_all(&lists);
        let second = fusion.fuse_all(&lists);
        prop_assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            prop_assert_eq!(&a.candidate.id, &b.candidate.id);
            prop_assert_eq!(a.fusion_score.to_bits(), b.fusion_score.to_bits());
        }
    }

    #[test]
    fn scores_ignore_list_order(raw in raw_lists()) {
        let fusion = RrfFusion::default();
        let forward: HashMap<String, u64> = fusion
            .fuse_all(&lists_from(&raw))
            .into_iter()
            .map(|f| (f.candidate.id, f.fusion_score.to_bits()))
            .collect();
        let mut reversed_raw = raw.clone();
        reversed_raw.reverse();
        let reversed: HashMap<String, u64> = fusion
            .fuse_all(&lists_from(&reversed_raw))
            .into_iter()
            .map(|f| (f.candidate.id, f.fusion_score.to_bits()))
            .collect();
        prop_assert_eq!(forward, reversed);
    }

    #[test]
    fn unanimous_leader_ranks_first(raw in prop::collection::vec(prop::collection::vec(0u8..24, 0..12), 1..5)) {
        let led: Vec<Vec<u8>> = raw
            .iter()
            .map(|ids| std::iter::once(255u8).chain(ids.iter().copied()).collect())
            .collect();
        let fused = RrfFusion::default().fuse_all(&lists_from(&led));
        prop_assert_eq!(fused[0].candidate.id.as_str(), "c255");
        if fused.len() > 1 {
            prop_assert!(fused[0].fusion_score > fused[1].fusion_score);
        }
    }

    #[test]
    fn rerank_is_a_permutation(
        ids in prop::collection::btree_set(0u8..64, 0..16),
        scores in prop::collection::vec(-10.0f32..10.0, 1..8),
    ) {
        let candidates: Vec<Candidate> = ids
            .iter()
            .map(|id| Candidate::new("idx", format!("c{}", id), format!("text {}", id), 0.0))
            .collect();
        let reranker = CrossEncoderReranker::new(Arc::new(TableScorer(scores)));

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let reranked = runtime.block_on(reranker.rerank("q", candidates.clone())).unwrap();

        prop_assert_eq!(reranked.len(), candidates.len());
        let before: BTreeSet<String> = candidates.into_iter().map(|c| c.id).collect();
        let after: BTreeSet<String> = reranked.into_iter().map(|c| c.id).collect();
        prop_assert_eq!(before, after);
    }
}
