use async_trait::async_trait;

use crate::{
    domain::{CandidateAnswer, ConversationTurn, ImageAttachment, ScoreSet, SearchHit},
    Result,
};

/// Everything a generator adapter needs for one call.
///
/// The orchestrator builds one request per adapter: the vision-capable
/// adapter gets the raw `image` and no `ocr_text`; text-only adapters get
/// the pre-extracted `ocr_text` and never the image.
#[derive(Clone, Debug, Default)]
pub struct GenerateRequest {
    pub message: String,
    pub history: Vec<ConversationTurn>,
    pub web_context: Option<Vec<SearchHit>>,
    pub image: Option<ImageAttachment>,
    pub ocr_text: Option<String>,
    /// Topic hint: the user is asking about school work.
    pub school_topic: bool,
    /// The message reads as a translation task.
    pub translation: bool,
    /// Multi-AI fan-out vs. single-answer mode (affects the role instruction).
    pub multi_ai: bool,
}

/// One LLM backend producing a candidate answer.
///
/// `generate` fails with [`crate::Error::ProviderExhausted`] only after
/// every credential/model fallback path of the provider was attempted.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// Stable label for logs and scoring prompts.
    fn label(&self) -> &'static str;

    async fn generate(&self, req: &GenerateRequest) -> Result<CandidateAnswer>;
}

/// A scoring pass over a candidate set.
///
/// Implementations never fail the request: any backend or decode failure
/// is absorbed into [`ScoreSet::neutral`].
#[async_trait]
pub trait AnswerValidator: Send + Sync {
    fn label(&self) -> &'static str;

    async fn score(&self, question: &str, candidates: &[CandidateAnswer]) -> ScoreSet;
}

/// The large-context merge step behind the synthesizer.
#[async_trait]
pub trait MergeModel: Send + Sync {
    /// Combine the candidates into one unified answer. `avg_scores` is
    /// index-aligned with `candidates`.
    async fn merge(
        &self,
        question: &str,
        candidates: &[CandidateAnswer],
        avg_scores: &[f64],
    ) -> Result<String>;
}

/// Image-to-text extraction, provided by the host application.
///
/// Best-effort: an empty string means "nothing readable", errors are not
/// part of the contract.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract_text(&self, image: &ImageAttachment) -> String;
}
