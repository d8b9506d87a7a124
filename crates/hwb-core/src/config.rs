use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

/// Typed configuration, loaded once at startup from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    /// Gemini credentials, in rotation order. At least one is required.
    pub gemini_api_keys: Vec<String>,
    /// OpenRouter credential (DeepSeek adapter). Absence disables the adapter.
    pub openrouter_api_key: Option<String>,
    /// Groq credential (Llama adapter, validators, synthesizer merge).
    pub groq_api_key: Option<String>,
    /// Tavily credential (web-context fetcher). Absence means "no context".
    pub tavily_api_key: Option<String>,

    /// Hour of day (UTC) at which the Gemini quota tier resets.
    pub quota_reset_utc_hour: u32,

    /// Bounded wait for a single outbound provider call.
    pub provider_timeout: Duration,
    /// Fixed pause between credential-rotation attempts.
    pub retry_backoff: Duration,

    /// Trailing conversation turns included in every prompt.
    pub history_limit: usize,
    /// Per-chat ring buffer capacity.
    pub max_messages_per_chat: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let gemini_api_keys = load_gemini_keys();
        if gemini_api_keys.is_empty() {
            return Err(Error::Config(
                "GEMINI_API_KEY environment variable is required".to_string(),
            ));
        }

        let openrouter_api_key = env_str("OPENROUTER_API_KEY").and_then(non_empty);
        let groq_api_key = env_str("GROQ_API_KEY").and_then(non_empty);
        let tavily_api_key = env_str("TAVILY_API_KEY").and_then(non_empty);

        // Default 22:00 UTC = midnight German summer time.
        let quota_reset_utc_hour = env_u32("QUOTA_RESET_UTC_HOUR").unwrap_or(22).min(23);

        let provider_timeout =
            Duration::from_millis(env_u64("PROVIDER_TIMEOUT_MS").unwrap_or(60_000));
        let retry_backoff = Duration::from_millis(env_u64("RETRY_BACKOFF_MS").unwrap_or(500));

        let history_limit = env_usize("HISTORY_LIMIT").unwrap_or(50);
        let max_messages_per_chat = env_usize("MAX_MESSAGES_PER_CHAT").unwrap_or(50);

        Ok(Self {
            gemini_api_keys,
            openrouter_api_key,
            groq_api_key,
            tavily_api_key,
            quota_reset_utc_hour,
            provider_timeout,
            retry_backoff,
            history_limit,
            max_messages_per_chat,
        })
    }
}

/// `GEMINI_API_KEY` plus `GEMINI_API_KEY_2` .. `GEMINI_API_KEY_100`,
/// in that order.
fn load_gemini_keys() -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(k) = env_str("GEMINI_API_KEY").and_then(non_empty) {
        keys.push(k);
    }
    for i in 2..=100 {
        if let Some(k) = env_str(&format!("GEMINI_API_KEY_{i}")).and_then(non_empty) {
            keys.push(k);
        }
    }
    keys
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
