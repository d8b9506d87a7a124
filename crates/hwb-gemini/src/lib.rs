//! Gemini adapter: the vision-capable generator.
//!
//! Rotates through the shared credential pool (up to pool-size attempts per
//! call), escalates quota errors to the quota service, and restarts at most
//! once on the fallback model tier. An overload on the final attempt turns
//! into a fixed apology answer instead of a failure.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::Engine;

use hwb_core::{
    domain::{CandidateAnswer, ImageAttachment},
    errors::Error,
    ports::{AnswerProvider, GenerateRequest},
    prompt,
    quota::{self, Credential, ModelTier, QuotaTracker},
    Result,
};

pub const PRIMARY_MODEL: &str = "gemini-2.5-flash";
pub const FALLBACK_MODEL: &str = "gemini-2.5-flash-lite";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Fixed answer when every key reports overload on the final attempt.
pub const OVERLOAD_APOLOGY: &str =
    "⚠️ Alle API Keys gerade überlastet - versuch es in 30 Sekunden nochmal!";

pub struct GeminiProvider {
    http: reqwest::Client,
    quota: Arc<QuotaTracker>,
    backoff: Duration,
}

/// Outcome of one credential attempt.
enum AttemptOutcome {
    Success(CandidateAnswer),
    /// Retryable failure: move on to the next credential after the backoff.
    Retry,
    /// The quota service just entered the fallback tier: restart the
    /// rotation once on the fallback model.
    TierSwitchAndRetry,
    Terminal(Error),
}

impl GeminiProvider {
    pub fn new(quota: Arc<QuotaTracker>, timeout: Duration, backoff: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            http,
            quota,
            backoff,
        }
    }

    async fn call_model(&self, model: &str, key: &str, req: &GenerateRequest) -> Result<String> {
        let body = build_request_body(&prompt::compose(req), req.image.as_ref());
        let url = format!("{API_BASE}/{model}:generateContent?key={key}");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("gemini request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "gemini call failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("gemini json error: {e}")))?;

        extract_text(&v)
            .ok_or_else(|| Error::External("gemini response contained no text".to_string()))
    }

    async fn try_once(
        &self,
        model: &str,
        cred: &Credential,
        req: &GenerateRequest,
        last_attempt: bool,
        tier_retried: bool,
    ) -> AttemptOutcome {
        match self.call_model(model, &cred.key, req).await {
            Ok(text) => {
                self.quota.record_success(cred);
                AttemptOutcome::Success(CandidateAnswer {
                    provider_label: format!("Gemini {model}"),
                    response_text: text,
                    used_reasoning_path: false,
                })
            }
            Err(e) => {
                let msg = e.to_string();
                tracing::warn!(key = cred.index + 1, model, error = %msg, "gemini attempt failed");

                if quota::is_quota_error(&msg) {
                    if self.quota.record_quota_failure(cred) && !tier_retried {
                        return AttemptOutcome::TierSwitchAndRetry;
                    }
                } else {
                    self.quota.record_failure(cred);
                }

                if last_attempt {
                    if quota::is_overload_error(&msg) {
                        return AttemptOutcome::Success(CandidateAnswer {
                            provider_label: format!("Gemini {model}"),
                            response_text: OVERLOAD_APOLOGY.to_string(),
                            used_reasoning_path: false,
                        });
                    }
                    return AttemptOutcome::Terminal(Error::ProviderExhausted {
                        provider: "gemini".to_string(),
                        attempts: self.quota.key_count(),
                    });
                }
                AttemptOutcome::Retry
            }
        }
    }
}

#[async_trait]
impl AnswerProvider for GeminiProvider {
    fn label(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<CandidateAnswer> {
        let mut tier_retried = false;

        'tier: loop {
            let model = match self.quota.active_tier() {
                ModelTier::Primary => PRIMARY_MODEL,
                ModelTier::Fallback => FALLBACK_MODEL,
            };
            let attempts = self.quota.key_count();

            for attempt in 1..=attempts {
                let cred = self.quota.next_credential();
                match self
                    .try_once(model, &cred, req, attempt == attempts, tier_retried)
                    .await
                {
                    AttemptOutcome::Success(answer) => return Ok(answer),
                    AttemptOutcome::Retry => tokio::time::sleep(self.backoff).await,
                    AttemptOutcome::TierSwitchAndRetry => {
                        tracing::warn!("restarting rotation on fallback model");
                        tier_retried = true;
                        continue 'tier;
                    }
                    AttemptOutcome::Terminal(e) => return Err(e),
                }
            }

            // Unreachable: the final attempt always yields Success,
            // TierSwitchAndRetry or Terminal.
            return Err(Error::ProviderExhausted {
                provider: "gemini".to_string(),
                attempts,
            });
        }
    }
}

fn build_request_body(prompt: &str, image: Option<&ImageAttachment>) -> serde_json::Value {
    let mut parts = vec![serde_json::json!({ "text": prompt })];

    if let Some(image) = image {
        let data = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        parts.push(serde_json::json!({
            "inline_data": { "mime_type": image.mime_type, "data": data }
        }));
    }

    serde_json::json!({ "contents": [{ "parts": parts }] })
}

fn extract_text(v: &serde_json::Value) -> Option<String> {
    let parts = v
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_body_has_a_single_part() {
        let body = build_request_body("Frage: hi", None);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0]["text"], "Frage: hi");
    }

    #[test]
    fn image_becomes_a_second_inline_data_part() {
        let image = ImageAttachment::jpeg(vec![0xFF, 0xD8, 0xFF]);
        let body = build_request_body("Frage: was siehst du?", Some(&image));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(
            parts[1]["inline_data"]["data"],
            base64::engine::general_purpose::STANDARD.encode([0xFF, 0xD8, 0xFF])
        );
    }

    #[test]
    fn response_text_parts_are_joined() {
        let v = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "4" }, { "text": " ✅" }] }
            }]
        });
        assert_eq!(extract_text(&v).as_deref(), Some("4 ✅"));
    }

    #[test]
    fn empty_or_malformed_responses_yield_none() {
        assert!(extract_text(&serde_json::json!({})).is_none());
        assert!(extract_text(&serde_json::json!({
            "candidates": [{ "content": { "parts": [] } }]
        }))
        .is_none());
    }
}
