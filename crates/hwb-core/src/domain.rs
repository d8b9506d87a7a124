use chrono::{DateTime, Utc};

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Speaker label used when serializing history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in a conversation. Immutable once created.
#[derive(Clone, Debug)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Simple-vs-multi routing, derived once per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutingDecision {
    Simple,
    Multi,
}

/// Explicit user override for routing (`.` / `/` message prefixes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForcedMode {
    Simple,
    Multi,
}

/// One provider's answer to a single request, prior to scoring.
#[derive(Clone, Debug)]
pub struct CandidateAnswer {
    pub provider_label: String,
    pub response_text: String,
    pub used_reasoning_path: bool,
}

/// One validator's rating of a candidate set.
///
/// Invariant: `scores.len()` equals the number of candidates scored; the
/// decode layer pads/truncates to enforce it.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreSet {
    pub scores: Vec<f64>,
    pub best_index_hint: usize,
    pub rationale: String,
}

impl ScoreSet {
    /// The documented fallback when a validator fails or returns garbage:
    /// every candidate gets a flat 50.
    pub fn neutral(candidates: usize) -> Self {
        Self {
            scores: vec![50.0; candidates],
            best_index_hint: 0,
            rationale: "Validation failed - using fallback".to_string(),
        }
    }
}

/// One web-search result used as grounding context.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub content: String,
    pub url: String,
}

/// Raw image bytes for the vision-capable provider.
#[derive(Clone, Debug)]
pub struct ImageAttachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageAttachment {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        }
    }
}
