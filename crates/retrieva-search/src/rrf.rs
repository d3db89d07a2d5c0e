//! Reciprocal Rank Fusion over an arbitrary number of ranked signal lists.

use std::collections::HashMap;

use retrieva_storage::model::{SearchResult, SignalScores};
use uuid::Uuid;

/// One signal's ranked output, best-first, with the weight its
/// contribution is multiplied by before summing into the fused score.
pub struct SignalRanking<'a> {
    pub weight: f32,
    pub results: &'a [SearchResult],
}

/// Fuse ranked lists via `score(d) = sum_i weight_i * 1 / (k + rank_i(d))`,
/// rank 1-based. A chunk absent from a signal contributes nothing from it.
/// Per-signal diagnostic scores are merged onto the fused result. Output is
/// sorted by descending fused score, ties broken by chunk id so the result
/// is deterministic regardless of floating-point summation order.
#[must_use]
pub fn reciprocal_rank_fusion(signals: &[SignalRanking<'_>], k: u32) -> Vec<SearchResult> {
    let mut fused: HashMap<Uuid, SearchResult> = HashMap::new();

    for signal in signals {
        for (index, result) in signal.results.iter().enumerate() {
            let rank = index + 1;
            let contribution = signal.weight / (k as f32 + rank as f32);

            let entry = fused.entry(result.chunk_id).or_insert_with(|| {
                let mut seeded = result.clone();
                seeded.score = 0.0;
                seeded
            });
            entry.score += contribution;
            merge_signal_scores(&mut entry.signal_scores, &result.signal_scores);
        }
    }

    let mut out: Vec<SearchResult> = fused.into_values().collect();
    out.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.chunk_id.cmp(&b.chunk_id)));
    out
}

fn merge_signal_scores(into: &mut SignalScores, from: &SignalScores) {
    if from.vector.is_some() {
        into.vector = from.vector;
    }
    if from.keyword.is_some() {
        into.keyword = from.keyword;
    }
    if from.graph.is_some() {
        into.graph = from.graph;
    }
    if from.rerank.is_some() {
        into.rerank = from.rerank;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrieva_storage::model::{ChunkMetadata, SourceKind};

    fn result(id: Uuid, score: f32) -> SearchResult {
        SearchResult {
            chunk_id: id,
            text: "t".to_string(),
            metadata: ChunkMetadata {
                source_path: "a.rs".to_string(),
                source_kind: SourceKind::Code,
                language: None,
                symbol_name: None,
                symbol_kind: None,
                start_line: 1,
                end_line: 1,
                docstring: None,
            },
            score,
            signal_scores: SignalScores {
                vector: Some(score),
                ..Default::default()
            },
        }
    }

    #[test]
    fn chunk_present_in_both_signals_outranks_single_signal_hit() {
        let shared = Uuid::new_v4();
        let only_vector = Uuid::new_v4();

        let vector_list = [result(shared, 0.9), result(only_vector, 0.8)];
        let keyword_list = [result(shared, 0.95)];

        let fused = reciprocal_rank_fusion(
            &[
                SignalRanking { weight: 1.0, results: &vector_list },
                SignalRanking { weight: 1.0, results: &keyword_list },
            ],
            60,
        );

        assert_eq!(fused[0].chunk_id, shared);
    }

    #[test]
    fn ties_break_on_chunk_id() {
        let a = Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap();
        let b = Uuid::parse_str("00000000-0000-0000-0000-000000000002").unwrap();
        // Each appears alone, at rank 1, in its own signal: identical contributions.
        let signal_a = [result(a, 1.0)];
        let signal_b = [result(b, 1.0)];

        let fused = reciprocal_rank_fusion(
            &[
                SignalRanking { weight: 1.0, results: &signal_b },
                SignalRanking { weight: 1.0, results: &signal_a },
            ],
            60,
        );

        assert_eq!(fused[0].chunk_id, a);
        assert_eq!(fused[1].chunk_id, b);
    }
}
