//! Groq adapters: the Llama generator, both validators, and the
//! synthesizer's merge model, all over one chat-completions client.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use hwb_core::{
    domain::{CandidateAnswer, ScoreSet},
    errors::Error,
    ports::{AnswerProvider, AnswerValidator, GenerateRequest, MergeModel},
    prompt, scoring, Result,
};

pub const GENERATOR_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const GENERATOR_FALLBACK_MODEL: &str = "llama-3.3-70b-versatile";
pub const VALIDATOR_LLAMA_MODEL: &str = "llama-3.3-70b-versatile";
pub const VALIDATOR_QWEN_MODEL: &str = "qwen/qwen3-32b";
pub const MERGE_MODEL: &str = "openai/gpt-oss-120b";

const ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Qwen sees at most this many characters per candidate (its validation
/// prompt is kept small).
const QWEN_EXCERPT_CHARS: usize = 500;

#[derive(Clone)]
pub struct GroqClient {
    http: reqwest::Client,
    api_key: String,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    pub async fn chat_completion(
        &self,
        model: &str,
        prompt: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
            "temperature": temperature,
        });

        let resp = self
            .http
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("groq request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "groq call failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("groq json error: {e}")))?;

        extract_content(&v)
            .ok_or_else(|| Error::External("groq response contained no text".to_string()))
    }
}

// === Generator ===

/// Llama 4 Scout, with Llama 3.3 as in-provider fallback after any
/// primary-call error.
pub struct LlamaProvider {
    client: Arc<GroqClient>,
}

impl LlamaProvider {
    pub fn new(client: Arc<GroqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerProvider for LlamaProvider {
    fn label(&self) -> &'static str {
        "Llama 4 Scout"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<CandidateAnswer> {
        let composed = prompt::compose(req);

        match self
            .client
            .chat_completion(GENERATOR_MODEL, &composed, 4000, 0.7)
            .await
        {
            Ok(text) => Ok(CandidateAnswer {
                provider_label: "Llama 4 Scout".to_string(),
                response_text: text,
                used_reasoning_path: false,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "llama scout failed, trying llama 3.3");
                match self
                    .client
                    .chat_completion(GENERATOR_FALLBACK_MODEL, &composed, 3000, 0.7)
                    .await
                {
                    Ok(text) => Ok(CandidateAnswer {
                        provider_label: "Llama 3.3 70B (Fallback)".to_string(),
                        response_text: text,
                        used_reasoning_path: false,
                    }),
                    Err(e) => {
                        tracing::warn!(error = %e, "llama fallback failed as well");
                        Err(Error::ProviderExhausted {
                            provider: "llama".to_string(),
                            attempts: 2,
                        })
                    }
                }
            }
        }
    }
}

// === Validators ===

pub struct LlamaValidator {
    client: Arc<GroqClient>,
}

impl LlamaValidator {
    pub fn new(client: Arc<GroqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerValidator for LlamaValidator {
    fn label(&self) -> &'static str {
        "Llama 70B"
    }

    async fn score(&self, question: &str, candidates: &[CandidateAnswer]) -> ScoreSet {
        let prompt = build_llama_validation_prompt(question, candidates);
        match self
            .client
            .chat_completion(VALIDATOR_LLAMA_MODEL, &prompt, 1000, 0.3)
            .await
        {
            Ok(raw) => scoring::decode_or_neutral(&raw, candidates.len(), self.label()),
            Err(e) => {
                tracing::warn!(error = %e, "llama validator call failed");
                ScoreSet::neutral(candidates.len())
            }
        }
    }
}

pub struct QwenValidator {
    client: Arc<GroqClient>,
}

impl QwenValidator {
    pub fn new(client: Arc<GroqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerValidator for QwenValidator {
    fn label(&self) -> &'static str {
        "Qwen 32B"
    }

    async fn score(&self, question: &str, candidates: &[CandidateAnswer]) -> ScoreSet {
        let prompt = build_qwen_validation_prompt(question, candidates);
        match self
            .client
            .chat_completion(VALIDATOR_QWEN_MODEL, &prompt, 800, 0.3)
            .await
        {
            Ok(raw) => scoring::decode_or_neutral(&raw, candidates.len(), self.label()),
            Err(e) => {
                tracing::warn!(error = %e, "qwen validator call failed");
                ScoreSet::neutral(candidates.len())
            }
        }
    }
}

// === Merge model ===

/// The synthesizer's large-context merge step.
pub struct GroqMergeModel {
    client: Arc<GroqClient>,
}

impl GroqMergeModel {
    pub fn new(client: Arc<GroqClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MergeModel for GroqMergeModel {
    async fn merge(
        &self,
        question: &str,
        candidates: &[CandidateAnswer],
        avg_scores: &[f64],
    ) -> Result<String> {
        let prompt = build_merge_prompt(question, candidates, avg_scores);
        // Low temperature: correctness over creativity.
        self.client
            .chat_completion(MERGE_MODEL, &prompt, 5000, 0.3)
            .await
    }
}

// === Prompt builders ===

fn build_llama_validation_prompt(question: &str, candidates: &[CandidateAnswer]) -> String {
    let answers = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "\nANTWORT {} ({}):\n{}\n",
                i + 1,
                c.provider_label,
                c.response_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    format!(
        "Du bist ein Validator. Bewerte diese {} Antworten auf die Frage: \"{}\"\n\n\
         {}\n\n\
         Bewerte jede Antwort mit einem Score von 0-100 basierend auf:\n\
         - Korrektheit & Präzision\n\
         - Vollständigkeit\n\
         - Klarheit & Verständlichkeit\n\
         - Relevanz zur Frage\n\n\
         Antworte NUR im JSON-Format (OHNE Markdown-Tags, OHNE Thinking-Tags):\n\
         {{\n  \"scores\": [score1, score2, score3],\n  \"best_index\": 0,\n  \"reasoning\": \"kurze Begründung\"\n}}",
        candidates.len(),
        question,
        answers
    )
}

fn build_qwen_validation_prompt(question: &str, candidates: &[CandidateAnswer]) -> String {
    let answers = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let excerpt: String = c.response_text.chars().take(QWEN_EXCERPT_CHARS).collect();
            format!("[{}] {}: {}...", i + 1, c.provider_label, excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Als Qualitäts-Validator: Bewerte diese Antworten zur Frage: \"{}\"\n\n\
         {}\n\n\
         Score jede Antwort (0-100) nach Qualität, Korrektheit, Präzision.\n\n\
         Antworte als JSON (OHNE Markdown, OHNE Thinking-Tags):\n\
         {{\n  \"scores\": [score1, score2, score3],\n  \"best_index\": 0,\n  \"comment\": \"Begründung\"\n}}",
        question, answers
    )
}

fn build_merge_prompt(
    question: &str,
    candidates: &[CandidateAnswer],
    avg_scores: &[f64],
) -> String {
    let answers = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let score = avg_scores.get(i).copied().unwrap_or(50.0);
            format!(
                "\n[{}] {} (Score: {:.1}):\n{}\n",
                i + 1,
                c.provider_label,
                score,
                c.response_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n");

    format!(
        "Du bist ein Synthesizer. Erstelle die BESTE und KORREKTESTE Antwort auf: \"{}\"\n\n\
         Du hast {} verschiedene Antworten:\n\n\
         {}\n\n\
         DEINE AUFGABE:\n\
         1. Analysiere ALLE Antworten auf Korrektheit\n\
         2. Finde die faktisch richtigste Information\n\
         3. Nimm NUR die besten und korrektesten Teile\n\
         4. Kombiniere sie zu EINER perfekten Antwort\n\
         5. Entferne Fehler, Widersprüche und Ungenauigkeiten\n\
         6. Mach sie klar, präzise und vollständig\n\n\
         FORMATIERUNG (SEHR WICHTIG):\n\
         - Nutze Überschriften mit ** (z.B. **Übersetzung des Textes**)\n\
         - Nummeriere Zeilen mit > (z.B. > Zeile 1)\n\
         - Füge Erklärungen mit ➡️ hinzu (z.B. ➡️ **Wort** (Bedeutung))\n\
         - Nutze Emojis zur Visualisierung\n\
         - Sei strukturiert und übersichtlich\n\n\
         WICHTIG: Priorisiere KORREKTHEIT über alles andere!\n\n\
         Antworte NUR mit der finalen strukturierten Antwort (kein JSON, keine Meta-Kommentare).",
        question,
        candidates.len(),
        answers
    )
}

fn extract_content(v: &serde_json::Value) -> Option<String> {
    let content = v
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;
    if content.is_empty() {
        None
    } else {
        Some(content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(label: &str, text: &str) -> CandidateAnswer {
        CandidateAnswer {
            provider_label: label.to_string(),
            response_text: text.to_string(),
            used_reasoning_path: false,
        }
    }

    #[test]
    fn llama_validation_prompt_lists_every_candidate() {
        let prompt = build_llama_validation_prompt(
            "Was ist 2+2?",
            &[candidate("A", "vier"), candidate("B", "4")],
        );
        assert!(prompt.contains("Bewerte diese 2 Antworten"));
        assert!(prompt.contains("ANTWORT 1 (A):\nvier"));
        assert!(prompt.contains("ANTWORT 2 (B):\n4"));
        assert!(prompt.contains("\"best_index\""));
    }

    #[test]
    fn qwen_prompt_truncates_long_answers() {
        let long = "x".repeat(800);
        let prompt = build_qwen_validation_prompt("q", &[candidate("A", &long)]);
        assert!(prompt.contains(&"x".repeat(QWEN_EXCERPT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(QWEN_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn merge_prompt_carries_scores() {
        let prompt = build_merge_prompt(
            "q",
            &[candidate("A", "a"), candidate("B", "b")],
            &[85.0, 83.5],
        );
        assert!(prompt.contains("[1] A (Score: 85.0)"));
        assert!(prompt.contains("[2] B (Score: 83.5)"));
        assert!(prompt.contains("Priorisiere KORREKTHEIT"));
    }

    #[test]
    fn chat_completion_content_is_extracted() {
        let v = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "ok" } }]
        });
        assert_eq!(extract_content(&v).as_deref(), Some("ok"));
        assert!(extract_content(&serde_json::json!({})).is_none());
    }
}
