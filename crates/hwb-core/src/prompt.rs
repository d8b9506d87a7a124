//! Prompt composition shared by all generator adapters.
//!
//! Order: trailing history, optional web context, optional OCR block, then
//! the role instruction picked by {translation?} × {school topic?} (with a
//! shorter single-answer variant outside multi-AI mode), and the question.

use crate::{domain::ConversationTurn, ports::GenerateRequest};

/// Trailing turns included in every prompt.
pub const HISTORY_TURNS: usize = 50;

const TRANSLATION_INSTRUCTION: &str = "\
Du bist eine Übersetzungs-KI.

WICHTIG - Bei Übersetzungen IMMER strukturiert und ausführlich:
- Nutze Überschriften mit ** (z.B. **Übersetzung des Textes**)
- Nummeriere jede Zeile mit > (z.B. > Zeile 1: ...)
- Gib bei Übersetzungen JEDE Zeile einzeln an
- Füge Erklärungen zu wichtigen/schwierigen Wörtern hinzu mit ➡️ (z.B. ➡️ **Wort** (Bedeutung))
- Nutze Emojis zur Visualisierung
- Sei vollständig, präzise und übersichtlich";

const SCHOOL_MULTI_INSTRUCTION: &str = "\
Du bist eine hilfsbereite KI-Assistentin für Hausaufgaben.

WICHTIG - Antworte kurz aber vollständig:
- Gib ALLE wichtigen Informationen
- Sei präzise und klar
- Nutze Emojis wo sinnvoll
- Erkläre Schritt für Schritt, aber kompakt
- Keine unnötigen Details";

const DEFAULT_MULTI_INSTRUCTION: &str = "\
Du bist eine freundliche KI-Assistentin.

WICHTIG - Antworte kurz aber vollständig:
- Gib alle wichtigen Infos
- Sei klar und präzise
- Nutze Emojis wo passend
- Keine Ausschweifungen";

const SCHOOL_SIMPLE_INSTRUCTION: &str = "\
Du bist eine hilfsbereite KI-Assistentin. Hilf bei Hausaufgaben, erkläre \
Schritt für Schritt, aber sei kurz und präzise. Nutze Emojis wo passend.";

const DEFAULT_SIMPLE_INSTRUCTION: &str = "\
Du bist eine freundliche KI-Assistentin. Antworte kurz, natürlich und hilfreich.";

/// Build the single composed prompt string for one generator call.
pub fn compose(req: &GenerateRequest) -> String {
    let mut prompt = String::new();

    if !req.history.is_empty() {
        prompt.push_str(&history_block(&req.history));
    }

    if let Some(hits) = req.web_context.as_deref() {
        let serialized =
            serde_json::to_string_pretty(hits).unwrap_or_else(|_| "[]".to_string());
        prompt.push_str(&format!("Kontext aus Web-Recherche:\n{serialized}\n\n"));
    }

    if let Some(ocr) = req.ocr_text.as_deref() {
        if !ocr.trim().is_empty() {
            prompt.push_str(&format!(
                "[Bild-Kontext - OCR extrahierter Text]:\n{ocr}\n\n"
            ));
        }
    }

    prompt.push_str(role_instruction(req.translation, req.school_topic, req.multi_ai));
    prompt.push_str(&format!("\n\nFrage: {}", req.message));
    prompt
}

fn history_block(history: &[ConversationTurn]) -> String {
    let skip = history.len().saturating_sub(HISTORY_TURNS);

    let mut block = String::from("Bisheriges Gespräch:\n");
    for turn in history.iter().skip(skip) {
        block.push_str(&format!("{}: {}\n", turn.role.label(), turn.content));
    }
    block.push_str("\n---\n\n");
    block
}

fn role_instruction(translation: bool, school_topic: bool, multi_ai: bool) -> &'static str {
    if translation {
        return TRANSLATION_INSTRUCTION;
    }
    match (multi_ai, school_topic) {
        (true, true) => SCHOOL_MULTI_INSTRUCTION,
        (true, false) => DEFAULT_MULTI_INSTRUCTION,
        (false, true) => SCHOOL_SIMPLE_INSTRUCTION,
        (false, false) => DEFAULT_SIMPLE_INSTRUCTION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Role, SearchHit};

    fn turn(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn::new(role, content)
    }

    #[test]
    fn history_turns_are_speaker_labeled_oldest_first() {
        let req = GenerateRequest {
            message: "Und jetzt?".to_string(),
            history: vec![
                turn(Role::User, "Hallo"),
                turn(Role::Assistant, "Hi! 👋"),
            ],
            ..Default::default()
        };
        let prompt = compose(&req);

        let user_pos = prompt.find("User: Hallo").unwrap();
        let assistant_pos = prompt.find("Assistant: Hi! 👋").unwrap();
        assert!(user_pos < assistant_pos);
        assert!(prompt.starts_with("Bisheriges Gespräch:"));
        assert!(prompt.ends_with("Frage: Und jetzt?"));
    }

    #[test]
    fn only_the_last_fifty_turns_are_included() {
        let history: Vec<_> = (0..60)
            .map(|i| turn(Role::User, &format!("msg {i}")))
            .collect();
        let req = GenerateRequest {
            message: "x".to_string(),
            history,
            ..Default::default()
        };
        let prompt = compose(&req);

        assert!(!prompt.contains("msg 9\n"));
        assert!(prompt.contains("msg 10\n"));
        assert!(prompt.contains("msg 59\n"));
    }

    #[test]
    fn ocr_block_is_included_when_present() {
        let req = GenerateRequest {
            message: "Löse die Aufgabe".to_string(),
            ocr_text: Some("3x + 1 = 7".to_string()),
            ..Default::default()
        };
        let prompt = compose(&req);
        assert!(prompt.contains("[Bild-Kontext - OCR extrahierter Text]:\n3x + 1 = 7"));
    }

    #[test]
    fn blank_ocr_text_is_skipped() {
        let req = GenerateRequest {
            message: "x".to_string(),
            ocr_text: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!compose(&req).contains("Bild-Kontext"));
    }

    #[test]
    fn web_context_is_serialized() {
        let req = GenerateRequest {
            message: "x".to_string(),
            web_context: Some(vec![SearchHit {
                title: "T".to_string(),
                content: "C".to_string(),
                url: "https://example.com".to_string(),
            }]),
            ..Default::default()
        };
        let prompt = compose(&req);
        assert!(prompt.contains("Kontext aus Web-Recherche:"));
        assert!(prompt.contains("https://example.com"));
    }

    #[test]
    fn translation_wins_over_topic_matrix() {
        let req = GenerateRequest {
            message: "Übersetze das".to_string(),
            translation: true,
            school_topic: true,
            multi_ai: true,
            ..Default::default()
        };
        assert!(compose(&req).contains("Übersetzungs-KI"));
    }

    #[test]
    fn instruction_matrix_covers_both_modes() {
        let mk = |school_topic, multi_ai| GenerateRequest {
            message: "x".to_string(),
            school_topic,
            multi_ai,
            ..Default::default()
        };
        assert!(compose(&mk(true, true)).contains("für Hausaufgaben"));
        assert!(compose(&mk(false, true)).contains("Keine Ausschweifungen"));
        assert!(compose(&mk(true, false)).contains("Schritt für Schritt, aber sei kurz"));
        assert!(compose(&mk(false, false)).contains("kurz, natürlich und hilfreich"));
    }
}
