//! Top-level answer generation: routing, fan-out, scoring, synthesis.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use crate::{
    classify::Classifier,
    domain::{CandidateAnswer, ConversationTurn, ForcedMode, ImageAttachment, RoutingDecision, ScoreSet},
    errors::Error,
    ports::{AnswerProvider, AnswerValidator, GenerateRequest, MergeModel, TextExtractor},
    search::WebSearch,
    synthesize::Synthesizer,
    Result,
};

/// The only user-visible failure text: shown when even the degraded
/// simple path cannot produce an answer.
pub const GENERIC_APOLOGY: &str = "⚠️ Ein Fehler ist aufgetreten. Bitte versuche es nochmal.";

/// One incoming chat message with everything the pipeline needs.
#[derive(Clone, Debug, Default)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<ConversationTurn>,
    pub school_topic: bool,
    pub image: Option<ImageAttachment>,
    pub forced: Option<ForcedMode>,
    /// Pre-extracted image text, if the caller already ran OCR.
    pub ocr_text: Option<String>,
}

/// Collaborators of the orchestrator. The vision-capable provider is
/// required (it also serves the degraded simple path); everything else is
/// optional and its absence just narrows the pipeline.
pub struct MultiAiDeps {
    pub vision: Arc<dyn AnswerProvider>,
    pub deepseek: Option<Arc<dyn AnswerProvider>>,
    pub llama: Option<Arc<dyn AnswerProvider>>,
    pub validators: Vec<Arc<dyn AnswerValidator>>,
    pub merge: Option<Arc<dyn MergeModel>>,
    pub search: Option<WebSearch>,
    pub extractor: Option<Arc<dyn TextExtractor>>,
}

#[derive(Clone, Debug)]
pub struct OrchestratorStats {
    pub total_processed: u64,
    pub simple_queries: u64,
    pub complex_queries: u64,
    pub web_searches: u64,
    /// Share of processed queries routed Multi, in percent.
    pub complexity_rate: f64,
}

pub struct MultiAiService {
    classifier: Classifier,
    vision: Arc<dyn AnswerProvider>,
    deepseek: Option<Arc<dyn AnswerProvider>>,
    llama: Option<Arc<dyn AnswerProvider>>,
    validators: Vec<Arc<dyn AnswerValidator>>,
    synthesizer: Synthesizer,
    search: Option<WebSearch>,
    extractor: Option<Arc<dyn TextExtractor>>,

    total_processed: AtomicU64,
    simple_queries: AtomicU64,
    complex_queries: AtomicU64,
    web_searches: AtomicU64,
}

impl MultiAiService {
    pub fn new(deps: MultiAiDeps) -> Self {
        Self {
            classifier: Classifier::new(),
            vision: deps.vision,
            deepseek: deps.deepseek,
            llama: deps.llama,
            validators: deps.validators,
            synthesizer: Synthesizer::new(deps.merge),
            search: deps.search,
            extractor: deps.extractor,
            total_processed: AtomicU64::new(0),
            simple_queries: AtomicU64::new(0),
            complex_queries: AtomicU64::new(0),
            web_searches: AtomicU64::new(0),
        }
    }

    /// Generate the final answer for one message. Never fails: every
    /// internal error is absorbed, compensated, or reduced to the fixed
    /// apology string.
    pub async fn generate_response(&self, req: ChatRequest) -> String {
        self.total_processed.fetch_add(1, Ordering::Relaxed);

        match self.classifier.classify(&req.message, req.forced) {
            RoutingDecision::Simple => {
                self.simple_queries.fetch_add(1, Ordering::Relaxed);
                tracing::info!("routing simple, single vision call");
                self.simple_answer(&req).await
            }
            RoutingDecision::Multi => {
                self.complex_queries.fetch_add(1, Ordering::Relaxed);
                tracing::info!("routing multi, starting fan-out");
                match self.multi_answer(&req).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "multi pipeline failed, degrading to simple");
                        self.simple_answer(&req).await
                    }
                }
            }
        }
    }

    pub fn stats(&self) -> OrchestratorStats {
        let total = self.total_processed.load(Ordering::Relaxed);
        let complex = self.complex_queries.load(Ordering::Relaxed);
        OrchestratorStats {
            total_processed: total,
            simple_queries: self.simple_queries.load(Ordering::Relaxed),
            complex_queries: complex,
            web_searches: self.web_searches.load(Ordering::Relaxed),
            complexity_rate: if total > 0 {
                complex as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }

    /// Single-answer mode: the vision adapter alone, no validation or
    /// synthesis. Any error becomes the apology string.
    async fn simple_answer(&self, req: &ChatRequest) -> String {
        let greq = GenerateRequest {
            message: req.message.clone(),
            history: req.history.clone(),
            web_context: None,
            image: req.image.clone(),
            ocr_text: None,
            school_topic: req.school_topic,
            translation: self.classifier.is_translation_task(&req.message),
            multi_ai: false,
        };

        match self.vision.generate(&greq).await {
            Ok(candidate) => candidate.response_text,
            Err(e) => {
                tracing::error!(error = %e, "simple path failed");
                GENERIC_APOLOGY.to_string()
            }
        }
    }

    async fn multi_answer(&self, req: &ChatRequest) -> Result<String> {
        let translation = self.classifier.is_translation_task(&req.message);

        let web_context = match &self.search {
            Some(search) if self.classifier.needs_web_search(&req.message) => {
                self.web_searches.fetch_add(1, Ordering::Relaxed);
                search.search(&req.message).await
            }
            _ => None,
        };

        // Text-only providers see extracted text, never the image itself.
        let ocr_text = self.resolve_ocr_text(req).await;

        let text_req = GenerateRequest {
            message: req.message.clone(),
            history: req.history.clone(),
            web_context: web_context.clone(),
            image: None,
            ocr_text,
            school_topic: req.school_topic,
            translation,
            multi_ai: true,
        };
        let vision_req = GenerateRequest {
            image: req.image.clone(),
            ocr_text: None,
            ..text_req.clone()
        };

        let (deepseek, llama, vision) = tokio::join!(
            run_provider(self.deepseek.as_deref(), &text_req),
            run_provider(self.llama.as_deref(), &text_req),
            run_provider(Some(self.vision.as_ref()), &vision_req),
        );

        let candidates: Vec<CandidateAnswer> =
            [deepseek, llama, vision].into_iter().flatten().collect();
        if candidates.is_empty() {
            return Err(Error::AllProvidersFailed);
        }
        tracing::info!(count = candidates.len(), "candidates generated");

        let score_sets = self.run_validators(&req.message, &candidates).await;
        tracing::info!(count = score_sets.len(), "validations finished");

        Ok(self
            .synthesizer
            .synthesize(&req.message, &candidates, &score_sets)
            .await)
    }

    async fn resolve_ocr_text(&self, req: &ChatRequest) -> Option<String> {
        if let Some(text) = &req.ocr_text {
            return Some(text.clone());
        }
        let (image, extractor) = match (&req.image, &self.extractor) {
            (Some(image), Some(extractor)) => (image, extractor),
            _ => return None,
        };

        let text = extractor.extract_text(image).await;
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// All validators concurrently. Each yields a ScoreSet (neutral on its
    /// own failures), so this cannot shrink the request.
    async fn run_validators(
        &self,
        question: &str,
        candidates: &[CandidateAnswer],
    ) -> Vec<ScoreSet> {
        let mut handles = Vec::with_capacity(self.validators.len());
        for validator in &self.validators {
            let validator = validator.clone();
            let question = question.to_string();
            let candidates = candidates.to_vec();
            handles.push(tokio::spawn(async move {
                validator.score(&question, &candidates).await
            }));
        }

        let mut sets = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(set) => sets.push(set),
                Err(e) => tracing::warn!(error = %e, "validator task panicked"),
            }
        }
        sets
    }
}

async fn run_provider(
    provider: Option<&dyn AnswerProvider>,
    req: &GenerateRequest,
) -> Option<CandidateAnswer> {
    let provider = provider?;
    match provider.generate(req).await {
        Ok(candidate) => Some(candidate),
        Err(e) => {
            tracing::warn!(provider = provider.label(), error = %e, "provider contributed no candidate");
            None
        }
    }
}
