//! Heuristic intent classifier: keyword rules, no model call.
//!
//! Order of checks:
//! 1. empty text → `NoIntent`
//! 2. cancellation phrasing → `CancelIntent`
//! 3. action phrasing → `ServiceIntent` (rulebook category, or `concierge`)
//! 4. anything else, questions included → `NoIntent`

use tracing::debug;

use crate::pipeline::rules::Rulebook;
use crate::pipeline::types::Classification;
use crate::requests::model::{Category, Priority};

/// Phrases that mean the guest wants something done.
const ACTION_PHRASES: &[&str] = &[
    "i need",
    "i'd like",
    "i would like",
    "i want",
    "please bring",
    "please send",
    "bring me",
    "send me",
    "send up",
    "can you send me",
    "could you send",
    "can you bring",
    "could you bring",
    "can i get",
    "could i get",
    "can i have",
    "need a",
    "need some",
    "need more",
    "fix",
    "clean",
    "repair",
    "arrange",
    "book me",
];

/// Phrases that mean the guest wants a previous request dropped.
const CANCEL_PHRASES: &[&str] = &[
    "cancel my request",
    "cancel the request",
    "cancel my order",
    "cancel that",
    "cancel it",
    "never mind",
    "nevermind",
    "don't need it anymore",
    "do not need it anymore",
    "no longer need",
];

/// Leading words that make a message a question.
const QUESTION_OPENERS: &[&str] = &[
    "what", "when", "where", "who", "why", "how", "which", "is", "are", "do", "does", "can",
    "could", "would", "will", "may", "should",
];

/// Rule-based classifier over guest text.
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    rulebook: Rulebook,
}

impl HeuristicClassifier {
    pub fn new(rulebook: Rulebook) -> Self {
        Self { rulebook }
    }

    pub fn rulebook(&self) -> &Rulebook {
        &self.rulebook
    }

    /// Classify raw guest text.
    pub fn classify(&self, text: &str) -> Classification {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Classification::NoIntent;
        }
        let lowered = trimmed.to_lowercase();

        if contains_any(&lowered, CANCEL_PHRASES) {
            debug!("Cancellation phrasing detected");
            return Classification::CancelIntent {
                reason: trimmed.to_string(),
            };
        }

        if !contains_any(&lowered, ACTION_PHRASES) {
            if is_question(&lowered) {
                debug!("Question without action phrasing");
            }
            return Classification::NoIntent;
        }

        let (category, priority) = self
            .rulebook
            .resolve(&lowered)
            .unwrap_or((Category::Concierge, Priority::Normal));

        Classification::ServiceIntent {
            category,
            description: trimmed.to_string(),
            priority,
        }
    }
}

fn contains_any(lowered: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| lowered.contains(p))
}

/// Starts with an interrogative word, or ends in `?`.
pub fn is_question(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.ends_with('?') {
        return true;
    }
    let first_word = trimmed
        .split(|c: char| c.is_whitespace() || c == '\'')
        .next()
        .unwrap_or_default()
        .to_lowercase();
    QUESTION_OPENERS.contains(&first_word.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> HeuristicClassifier {
        HeuristicClassifier::new(Rulebook::default_rules())
    }

    #[test]
    fn towels_request() {
        assert_eq!(
            classifier().classify("Please bring me extra towels"),
            Classification::ServiceIntent {
                category: Category::Towels,
                description: "Please bring me extra towels".into(),
                priority: Priority::Normal,
            }
        );
    }

    #[test]
    fn checkout_question_is_no_intent() {
        assert_eq!(
            classifier().classify("What time is checkout?"),
            Classification::NoIntent
        );
    }

    #[test]
    fn maintenance_is_urgent() {
        let result = classifier().classify("I need someone to fix the leaking sink");
        assert_eq!(
            result,
            Classification::ServiceIntent {
                category: Category::Maintenance,
                description: "I need someone to fix the leaking sink".into(),
                priority: Priority::Urgent,
            }
        );
    }

    #[test]
    fn maintenance_keyword_makes_any_category_urgent() {
        for (text, expected) in [
            ("Please fix the broken coffee machine", Category::Refreshments),
            ("Please clean up, the toilet is leaking", Category::Housekeeping),
            ("I need the toilet fixed, the towel rail is broken", Category::Towels),
        ] {
            match classifier().classify(text) {
                Classification::ServiceIntent {
                    category, priority, ..
                } => {
                    assert_eq!(category, expected, "{text}");
                    assert_eq!(priority, Priority::Urgent, "{text}");
                }
                other => panic!("expected service intent for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn other_categories_are_normal() {
        for text in [
            "Can I get breakfast sent up?",
            "I need a taxi to the airport",
            "Please send a toothbrush",
            "I'd like a restaurant recommendation",
        ] {
            match classifier().classify(text) {
                Classification::ServiceIntent { priority, .. } => {
                    assert_eq!(priority, Priority::Normal, "{text}")
                }
                other => panic!("expected service intent for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn action_without_category_is_concierge() {
        assert_eq!(
            classifier().classify("  I need help with something  "),
            Classification::ServiceIntent {
                category: Category::Concierge,
                description: "I need help with something".into(),
                priority: Priority::Normal,
            }
        );
    }

    #[test]
    fn action_wins_over_question() {
        let result = classifier().classify("Can you send me more towels?");
        assert!(result.is_service());
    }

    #[test]
    fn plain_statement_is_no_intent() {
        assert_eq!(
            classifier().classify("Thanks, the room is lovely"),
            Classification::NoIntent
        );
    }

    #[test]
    fn empty_is_no_intent() {
        assert_eq!(classifier().classify("   "), Classification::NoIntent);
    }

    #[test]
    fn cancellation_detected_first() {
        assert_eq!(
            classifier().classify("Never mind, I don't need the towels"),
            Classification::CancelIntent {
                reason: "Never mind, I don't need the towels".into()
            }
        );
        assert!(matches!(
            classifier().classify("Please cancel my request"),
            Classification::CancelIntent { .. }
        ));
    }

    #[test]
    fn empty_rulebook_falls_back_to_concierge() {
        let classifier = HeuristicClassifier::new(Rulebook::empty());
        match classifier.classify("Please bring towels") {
            Classification::ServiceIntent { category, .. } => {
                assert_eq!(category, Category::Concierge)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn question_detection() {
        assert!(is_question("what time is breakfast"));
        assert!(is_question("Is the pool open?"));
        assert!(is_question("pool open?"));
        assert!(!is_question("The pool is great"));
    }
}
