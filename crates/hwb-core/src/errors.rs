/// Core error type for the bot backend.
///
/// Adapter crates map their provider-specific errors into this type so the
/// orchestrator can handle failures consistently (absorb vs. degrade).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Every credential/model fallback path of one provider failed.
    /// The provider simply contributes no candidate for this request.
    #[error("provider {provider} exhausted after {attempts} attempt(s)")]
    ProviderExhausted { provider: String, attempts: usize },

    /// Multi-mode fan-out produced zero candidates.
    #[error("all generator providers failed")]
    AllProvidersFailed,

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
