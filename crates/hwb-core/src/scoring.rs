//! Fallible decoding of validator output into a [`ScoreSet`].
//!
//! Validator models are asked for plain JSON, but in practice wrap it in
//! markdown fences or thinking tags. Decoding is best-effort: any failure
//! yields the neutral all-50 set, never an error to the caller.

use regex::Regex;

use crate::domain::ScoreSet;

/// Neutral score used for missing or unparsable entries.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Strip markdown code fences and thinking/tool-call tags from model output.
pub fn strip_model_wrappers(text: &str) -> String {
    let mut cleaned = text.replace("```json", "").replace("```", "");

    for pattern in [r"(?s)<think>.*?</think>", r"(?s)<tool_call>.*?</tool_call>"] {
        if let Ok(re) = Regex::new(pattern) {
            cleaned = re.replace_all(&cleaned, "").into_owned();
        }
    }

    cleaned.trim().to_string()
}

/// Decode a validator response for `candidates` answers.
///
/// Enforces the ScoreSet invariant: the result always has exactly
/// `candidates` scores (missing entries default to 50, extras are dropped)
/// and an in-range best index.
pub fn decode_score_set(raw: &str, candidates: usize) -> Option<ScoreSet> {
    let cleaned = strip_model_wrappers(raw);
    let value: serde_json::Value = serde_json::from_str(&cleaned).ok()?;

    let parsed = value.get("scores")?.as_array()?;
    let mut scores: Vec<f64> = parsed
        .iter()
        .map(|s| s.as_f64().unwrap_or(NEUTRAL_SCORE))
        .take(candidates)
        .collect();
    scores.resize(candidates, NEUTRAL_SCORE);

    let best_index_hint = value
        .get("best_index")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
        .filter(|v| *v < candidates)
        .unwrap_or(0);

    let rationale = value
        .get("reasoning")
        .or_else(|| value.get("comment"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Some(ScoreSet {
        scores,
        best_index_hint,
        rationale,
    })
}

/// Decode, falling back to [`ScoreSet::neutral`] on any failure.
pub fn decode_or_neutral(raw: &str, candidates: usize, validator: &str) -> ScoreSet {
    match decode_score_set(raw, candidates) {
        Some(set) => set,
        None => {
            tracing::warn!(validator, "unparsable validator output, using neutral scores");
            ScoreSet::neutral(candidates)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_json() {
        let raw = r#"{"scores": [92, 78, 81], "best_index": 0, "reasoning": "klar"}"#;
        let set = decode_score_set(raw, 3).unwrap();
        assert_eq!(set.scores, vec![92.0, 78.0, 81.0]);
        assert_eq!(set.best_index_hint, 0);
        assert_eq!(set.rationale, "klar");
    }

    #[test]
    fn strips_markdown_fences_and_think_tags() {
        let raw = "<think>hmm, Antwort 2 wirkt schwach</think>\n```json\n{\"scores\": [70, 60], \"best_index\": 0, \"comment\": \"ok\"}\n```";
        let set = decode_score_set(raw, 2).unwrap();
        assert_eq!(set.scores, vec![70.0, 60.0]);
        assert_eq!(set.rationale, "ok");
    }

    #[test]
    fn score_count_always_matches_candidates() {
        let short = decode_score_set(r#"{"scores": [80], "best_index": 0}"#, 3).unwrap();
        assert_eq!(short.scores, vec![80.0, NEUTRAL_SCORE, NEUTRAL_SCORE]);

        let long = decode_score_set(r#"{"scores": [80, 70, 60, 50], "best_index": 0}"#, 2).unwrap();
        assert_eq!(long.scores, vec![80.0, 70.0]);
    }

    #[test]
    fn out_of_range_best_index_falls_back_to_zero() {
        let set = decode_score_set(r#"{"scores": [80, 70], "best_index": 9}"#, 2).unwrap();
        assert_eq!(set.best_index_hint, 0);
    }

    #[test]
    fn garbage_becomes_neutral_without_error() {
        let set = decode_or_neutral("Entschuldigung, ich kann das nicht bewerten.", 3, "test");
        assert_eq!(set, ScoreSet::neutral(3));
        assert_eq!(set.scores.len(), 3);
    }

    #[test]
    fn missing_scores_field_is_a_decode_failure() {
        assert!(decode_score_set(r#"{"best_index": 0}"#, 2).is_none());
    }
}
