//! Merge/selection step producing the final answer from scored candidates.

use std::sync::Arc;

use crate::{
    domain::{CandidateAnswer, ScoreSet},
    ports::MergeModel,
};

/// A candidate whose average lead over the runner-up exceeds this margin
/// is returned verbatim; the merge call is skipped. Strictly greater-than.
const CLEAR_WINNER_MARGIN: f64 = 10.0;

/// Per-candidate average across all score sets. A missing per-candidate
/// score counts as the neutral 50.
pub fn average_scores(candidates: usize, score_sets: &[ScoreSet]) -> Vec<f64> {
    (0..candidates)
        .map(|i| {
            if score_sets.is_empty() {
                return 50.0;
            }
            let sum: f64 = score_sets
                .iter()
                .map(|set| set.scores.get(i).copied().unwrap_or(50.0))
                .sum();
            sum / score_sets.len() as f64
        })
        .collect()
}

pub struct Synthesizer {
    merge: Option<Arc<dyn MergeModel>>,
}

impl Synthesizer {
    pub fn new(merge: Option<Arc<dyn MergeModel>>) -> Self {
        Self { merge }
    }

    /// Pick or merge. Never fails: a failing merge call degrades to the
    /// best-average candidate's text verbatim.
    pub async fn synthesize(
        &self,
        question: &str,
        candidates: &[CandidateAnswer],
        score_sets: &[ScoreSet],
    ) -> String {
        if candidates.is_empty() {
            return String::new();
        }
        if candidates.len() == 1 {
            return candidates[0].response_text.clone();
        }

        let avg = average_scores(candidates.len(), score_sets);
        let best = arg_max(&avg);
        let second_best = avg
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != best)
            .map(|(_, s)| *s)
            .fold(f64::NEG_INFINITY, f64::max);
        let lead = avg[best] - second_best;

        tracing::info!(
            best = %candidates[best].provider_label,
            best_score = avg[best],
            lead,
            "candidate averages computed"
        );

        if lead > CLEAR_WINNER_MARGIN {
            tracing::info!("clear winner, skipping merge");
            return candidates[best].response_text.clone();
        }

        let Some(merge) = self.merge.as_ref() else {
            return candidates[best].response_text.clone();
        };

        match merge.merge(question, candidates, &avg).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "merge step failed, returning best candidate");
                candidates[best].response_text.clone()
            }
        }
    }
}

fn arg_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
