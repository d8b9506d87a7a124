//! Console front-end for the multi-provider answer pipeline.
//!
//! The production transport (WhatsApp) lives outside this workspace; this
//! binary wires the real services to a stdin chat loop with the same
//! message conventions: `.` forces simple mode, `/` forces multi mode.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use hwb_core::{
    classify::{split_forced_prefix, Classifier},
    config::Config,
    conversation::ConversationStore,
    domain::{ForcedMode, Role},
    orchestrator::{ChatRequest, MultiAiDeps, MultiAiService},
    ports::{AnswerProvider, AnswerValidator, MergeModel},
    quota::{ModelTier, QuotaTracker},
    search::WebSearch,
};
use hwb_gemini::GeminiProvider;
use hwb_groq::{GroqClient, GroqMergeModel, LlamaProvider, LlamaValidator, QwenValidator};
use hwb_openrouter::DeepSeekProvider;

const CHAT_ID: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    hwb_core::logging::init("hwb")?;

    let cfg = Config::load().context("loading configuration")?;

    // Gemini is required: it serves the simple path and the degraded path.
    let quota = Arc::new(QuotaTracker::new(
        cfg.gemini_api_keys.clone(),
        cfg.quota_reset_utc_hour,
    )?);
    tracing::info!(keys = quota.key_count(), "gemini credential pool loaded");
    let vision = Arc::new(GeminiProvider::new(
        quota.clone(),
        cfg.provider_timeout,
        cfg.retry_backoff,
    ));

    // The other backends only narrow the pipeline when missing.
    let deepseek = match &cfg.openrouter_api_key {
        Some(key) => Some(Arc::new(DeepSeekProvider::new(key.clone(), cfg.provider_timeout))
            as Arc<dyn AnswerProvider>),
        None => {
            tracing::warn!("OPENROUTER_API_KEY not set, DeepSeek adapter disabled");
            None
        }
    };

    let (llama, validators, merge) = match &cfg.groq_api_key {
        Some(key) => {
            let client = Arc::new(GroqClient::new(key.clone(), cfg.provider_timeout));
            (
                Some(Arc::new(LlamaProvider::new(client.clone())) as Arc<dyn AnswerProvider>),
                vec![
                    Arc::new(LlamaValidator::new(client.clone())) as Arc<dyn AnswerValidator>,
                    Arc::new(QwenValidator::new(client.clone())) as Arc<dyn AnswerValidator>,
                ],
                Some(Arc::new(GroqMergeModel::new(client)) as Arc<dyn MergeModel>),
            )
        }
        None => {
            tracing::warn!("GROQ_API_KEY not set, Llama adapter and validators disabled");
            (None, Vec::new(), None)
        }
    };

    let search = cfg.tavily_api_key.as_ref().map(|k| WebSearch::new(k.clone()));
    if search.is_none() {
        tracing::warn!("TAVILY_API_KEY not set, web context disabled");
    }

    let service = MultiAiService::new(MultiAiDeps {
        vision,
        deepseek,
        llama,
        validators,
        merge,
        search,
        // Image OCR belongs to the host transport; the console loop has none.
        extractor: None,
    });
    let store = Arc::new(ConversationStore::new(cfg.max_messages_per_chat));
    let classifier = Classifier::new();

    // Hourly sweep of chats idle for over a week.
    {
        let store = store.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(60 * 60));
            loop {
                tick.tick().await;
                store.cleanup();
            }
        });
    }

    run_console(&cfg, &service, &store, &classifier, &quota).await
}

async fn run_console(
    cfg: &Config,
    service: &MultiAiService,
    store: &ConversationStore,
    classifier: &Classifier,
    quota: &QuotaTracker,
) -> anyhow::Result<()> {
    println!("hwb bereit. Nachricht eingeben ('.' = simple, '/' = multi, !stats, !vergiss):");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line == "!stats" {
            print_stats(service, store, quota);
            continue;
        }
        if line == "!vergiss" {
            store.clear(CHAT_ID);
            println!("✅ Alle Nachrichten in diesem Chat wurden vergessen.");
            continue;
        }

        let (forced, message) = split_forced_prefix(line);
        match forced {
            Some(ForcedMode::Simple) => store.note_simple_forced(),
            Some(ForcedMode::Multi) => store.note_multi_forced(),
            None => {}
        }
        if message.is_empty() {
            continue;
        }

        store.append_message(CHAT_ID, Role::User, message);
        let history = store.history(CHAT_ID, cfg.history_limit);

        let response = service
            .generate_response(ChatRequest {
                message: message.to_string(),
                history,
                school_topic: classifier.is_school_topic(message),
                image: None,
                forced,
                ocr_text: None,
            })
            .await;

        store.append_message(CHAT_ID, Role::Assistant, response.as_str());
        println!("{response}\n");
    }

    Ok(())
}

fn print_stats(service: &MultiAiService, store: &ConversationStore, quota: &QuotaTracker) {
    let orch = service.stats();
    let conv = store.stats();
    let tier = match quota.active_tier() {
        ModelTier::Primary => "primary",
        ModelTier::Fallback => "fallback",
    };

    println!("📊 Statistik");
    println!(
        "  Anfragen: {} (simple: {}, multi: {}, {:.1}% komplex)",
        orch.total_processed, orch.simple_queries, orch.complex_queries, orch.complexity_rate
    );
    println!("  Web-Suchen: {}", orch.web_searches);
    println!(
        "  Erzwungen: {} simple / {} multi",
        conv.simple_forced, conv.multi_forced
    );
    println!(
        "  Nachrichten: {} empfangen, {} gesendet in {} Chat(s)",
        conv.messages_received, conv.messages_sent, conv.total_chats
    );
    println!("  Gemini-Modellstufe: {tier}");
    println!("  Uptime: {}s", conv.uptime_secs);
}
