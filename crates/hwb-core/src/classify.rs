use regex::{Regex, RegexSet};

use crate::domain::{ForcedMode, RoutingDecision};

/// A message longer than this is routed Multi regardless of content.
const COMPLEX_LENGTH_THRESHOLD: usize = 400;
/// More question marks than this also mean Multi.
const COMPLEX_QUESTION_MARKS: usize = 2;

/// Phrasing patterns that mark a query as complex (any match ⇒ Multi).
///
/// Ordered: explanatory/comparative/analytical phrasing, essay and
/// interpretation requests, advanced math/science terms, recency terms.
const COMPLEX_PATTERNS: &[&str] = &[
    r"(?i)erkläre.*wie",
    r"(?i)warum.*funktioniert",
    r"(?i)unterschied zwischen",
    r"(?i)vergleiche",
    r"(?i)analysiere",
    r"(?i)beweise",
    r"(?i)schreibe.*aufsatz",
    r"(?i)schreibe.*essay",
    r"(?i)interpretation",
    r"(?i)zusammenfassung.*buch",
    r"(?i)charakterisierung",
    r"(?i)integral",
    r"(?i)ableitung",
    r"(?i)chemische.*reaktion",
    r"(?i)stöchiometrie",
    r"(?i)aktuelle.*informationen",
    r"(?i)neueste",
    r"(?i)heute",
    r"(?i)2024|2025",
    r"(?i)ereignisse",
    r"(?i)nachrichten",
];

/// Translation requests get the structured line-by-line instruction set.
const TRANSLATION_PATTERNS: &[&str] = &[
    r"(?i)übersetz",
    r"(?i)translate",
    r"(?i)ins deutsche",
    r"(?i)ins englische",
    r"(?i)ins französische",
    r"(?i)auf deutsch",
    r"(?i)auf englisch",
    r"(?i)auf französisch",
    r"(?i)what does.*mean",
    r"(?i)was bedeutet",
];

/// Recency/current-events wording that justifies a web-context lookup.
const RECENCY_PATTERN: &str = r"(?i)aktuelle|neueste|heute|2024|2025|nachrichten|ereignisse";

/// Keyword list for the school/homework topic hint.
const SCHOOL_KEYWORDS: &[&str] = &[
    "hausaufgaben",
    "aufgabe",
    "übung",
    "lernen",
    "schule",
    "test",
    "klassenarbeit",
    "prüfung",
    "klausur",
    "mathe",
    "deutsch",
    "english",
    "französisch",
    "latein",
    "physik",
    "chemie",
    "biologie",
    "geschichte",
    "erdkunde",
    "religion",
    "ethik",
    "formel",
    "gleichung",
    "lösung",
    "seite",
    "buch",
    "arbeitsblatt",
    "vokabeln",
    "grammatik",
];

/// Pure, data-driven message heuristics. No side effects, total.
pub struct Classifier {
    complex: RegexSet,
    translation: RegexSet,
    recency: Regex,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            complex: RegexSet::new(COMPLEX_PATTERNS).expect("complexity pattern table compiles"),
            translation: RegexSet::new(TRANSLATION_PATTERNS)
                .expect("translation pattern table compiles"),
            recency: Regex::new(RECENCY_PATTERN).expect("recency pattern compiles"),
        }
    }

    /// Routing decision for one request. A forced mode always wins; the
    /// heuristics are only consulted without one.
    pub fn classify(&self, message: &str, forced: Option<ForcedMode>) -> RoutingDecision {
        match forced {
            Some(ForcedMode::Simple) => return RoutingDecision::Simple,
            Some(ForcedMode::Multi) => return RoutingDecision::Multi,
            None => {}
        }

        if message.chars().count() > COMPLEX_LENGTH_THRESHOLD
            || message.matches('?').count() > COMPLEX_QUESTION_MARKS
            || self.complex.is_match(message)
        {
            RoutingDecision::Multi
        } else {
            RoutingDecision::Simple
        }
    }

    pub fn is_translation_task(&self, message: &str) -> bool {
        self.translation.is_match(message)
    }

    pub fn needs_web_search(&self, message: &str) -> bool {
        self.recency.is_match(message)
    }

    pub fn is_school_topic(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        SCHOOL_KEYWORDS.iter().any(|k| lower.contains(k))
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Split an optional forced-mode prefix off a raw incoming message:
/// `.` forces Simple, `/` forces Multi. The prefix is not part of the
/// message the pipeline sees.
pub fn split_forced_prefix(raw: &str) -> (Option<ForcedMode>, &str) {
    if let Some(rest) = raw.strip_prefix('.') {
        (Some(ForcedMode::Simple), rest.trim())
    } else if let Some(rest) = raw.strip_prefix('/') {
        (Some(ForcedMode::Multi), rest.trim())
    } else {
        (None, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_plain_question_is_simple() {
        let c = Classifier::new();
        assert_eq!(c.classify("Was ist 2+2?", None), RoutingDecision::Simple);
    }

    #[test]
    fn explanatory_phrasing_is_multi() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("Erkläre mir wie Photosynthese abläuft", None),
            RoutingDecision::Multi
        );
        assert_eq!(
            c.classify("Was ist der Unterschied zwischen DNA und RNA?", None),
            RoutingDecision::Multi
        );
    }

    #[test]
    fn long_message_is_multi_by_length_alone() {
        let c = Classifier::new();
        let msg = "a".repeat(401);
        assert_eq!(c.classify(&msg, None), RoutingDecision::Multi);
        // Exactly 400 chars is still simple.
        let msg = "a".repeat(400);
        assert_eq!(c.classify(&msg, None), RoutingDecision::Simple);
    }

    #[test]
    fn many_question_marks_are_multi() {
        let c = Classifier::new();
        assert_eq!(
            c.classify("Wer? Wann? Wo?", None),
            RoutingDecision::Multi
        );
        assert_eq!(c.classify("Wer? Wann?", None), RoutingDecision::Simple);
    }

    #[test]
    fn forced_mode_beats_heuristics() {
        let c = Classifier::new();
        let long = "a".repeat(500);
        assert_eq!(
            c.classify(&long, Some(ForcedMode::Simple)),
            RoutingDecision::Simple
        );
        assert_eq!(
            c.classify("hi", Some(ForcedMode::Multi)),
            RoutingDecision::Multi
        );
    }

    #[test]
    fn translation_detection() {
        let c = Classifier::new();
        assert!(c.is_translation_task("Übersetze das bitte ins Englische"));
        assert!(c.is_translation_task("what does 'Begriff' mean?"));
        assert!(!c.is_translation_task("Was ist 2+2?"));
    }

    #[test]
    fn recency_detection() {
        let c = Classifier::new();
        assert!(c.needs_web_search("Was sind die neuesten Nachrichten?"));
        assert!(!c.needs_web_search("Löse die Gleichung x+1=2"));
    }

    #[test]
    fn school_topic_detection() {
        let c = Classifier::new();
        assert!(c.is_school_topic("Hilf mir bei den Hausaufgaben in Mathe"));
        assert!(!c.is_school_topic("Wie wird das Wetter morgen?"));
    }

    #[test]
    fn forced_prefix_parsing() {
        assert_eq!(
            split_forced_prefix(". was ist 2+2?"),
            (Some(ForcedMode::Simple), "was ist 2+2?")
        );
        assert_eq!(
            split_forced_prefix("/erkläre das"),
            (Some(ForcedMode::Multi), "erkläre das")
        );
        assert_eq!(split_forced_prefix("hallo"), (None, "hallo"));
    }
}
