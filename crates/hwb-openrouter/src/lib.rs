//! DeepSeek adapter via OpenRouter.
//!
//! Text-only. The fallback here is model-level, not credential-level: the
//! distill model is tried only after the primary call itself errors
//! (network or non-2xx), and only the primary counts as a reasoning path.

use std::time::Duration;

use async_trait::async_trait;

use hwb_core::{
    domain::CandidateAnswer,
    errors::Error,
    ports::{AnswerProvider, GenerateRequest},
    prompt, Result,
};

pub const PRIMARY_MODEL: &str = "deepseek/deepseek-r1:free";
pub const FALLBACK_MODEL: &str = "deepseek/deepseek-r1-distill-llama-70b:free";

const ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const REFERER: &str = "https://whatsapp-bot.local";

const PRIMARY_MAX_TOKENS: u32 = 4000;
const FALLBACK_MAX_TOKENS: u32 = 3000;

pub struct DeepSeekProvider {
    http: reqwest::Client,
    api_key: String,
}

impl DeepSeekProvider {
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

    async fn call_model(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": max_tokens,
        });

        let resp = self
            .http
            .post(ENDPOINT)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", REFERER)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("openrouter request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "openrouter call failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("openrouter json error: {e}")))?;

        extract_content(&v)
            .ok_or_else(|| Error::External("openrouter response contained no text".to_string()))
    }
}

#[async_trait]
impl AnswerProvider for DeepSeekProvider {
    fn label(&self) -> &'static str {
        "DeepSeek R1"
    }

    async fn generate(&self, req: &GenerateRequest) -> Result<CandidateAnswer> {
        let composed = prompt::compose(req);

        match self
            .call_model(PRIMARY_MODEL, &composed, PRIMARY_MAX_TOKENS)
            .await
        {
            Ok(text) => Ok(CandidateAnswer {
                provider_label: "DeepSeek R1".to_string(),
                response_text: text,
                used_reasoning_path: true,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "deepseek primary failed, trying distill model");
                match self
                    .call_model(FALLBACK_MODEL, &composed, FALLBACK_MAX_TOKENS)
                    .await
                {
                    Ok(text) => Ok(CandidateAnswer {
                        provider_label: "DeepSeek R1 Distill".to_string(),
                        response_text: text,
                        used_reasoning_path: false,
                    }),
                    Err(e) => {
                        tracing::warn!(error = %e, "deepseek distill failed as well");
                        Err(Error::ProviderExhausted {
                            provider: "deepseek".to_string(),
                            attempts: 2,
                        })
                    }
                }
            }
        }
    }
}

pub(crate) fn extract_content(v: &serde_json::Value) -> Option<String> {
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
