//! Marker parser for model replies.
//!
//! The system prompt asks the model to lead with one of:
//!
//! ```text
//! SERVICE_REQUEST|<category>|<description>|<priority>
//! CANCEL_REQUEST|<reason>
//! ```
//!
//! followed by the guest-facing reply on the next line. Parsing never fails:
//! anything unrecognizable comes back as `NoIntent` with the reply untouched.

use tracing::{debug, warn};

use crate::pipeline::types::{Classification, ParsedReply};
use crate::requests::lifecycle::DEFAULT_CANCEL_REASON;
use crate::requests::model::{Category, Priority};

pub const SERVICE_MARKER: &str = "SERVICE_REQUEST|";
pub const CANCEL_MARKER: &str = "CANCEL_REQUEST|";

/// Whether the raw reply mentions either marker in any form.
///
/// Matches case-insensitively and without the trailing pipe, so malformed
/// or re-punctuated markers still count as the model having decided.
pub fn contains_marker(raw: &str) -> bool {
    let upper = raw.to_uppercase();
    upper.contains("SERVICE_REQUEST") || upper.contains("CANCEL_REQUEST")
}

/// Split a model reply into intent and remainder.
pub fn parse(raw: &str) -> ParsedReply {
    if let Some(idx) = raw.find(SERVICE_MARKER) {
        let (before, payload, after) = split_at_marker(raw, idx, SERVICE_MARKER.len());
        let fields: Vec<&str> = payload.split('|').map(str::trim).collect();
        if fields.len() < 2 || fields[1].is_empty() {
            warn!(payload = %payload, "Malformed SERVICE_REQUEST payload");
            return passthrough(raw);
        }
        if fields.len() > 3 {
            warn!(
                extra = fields.len() - 3,
                payload = %payload,
                "SERVICE_REQUEST payload has extra fields, ignoring them"
            );
        }

        let category = fields[0].parse().unwrap_or_else(|_| {
            debug!(category = %fields[0], "Unknown category from model, using concierge");
            Category::Concierge
        });
        let priority = fields
            .get(2)
            .and_then(|p| p.parse::<Priority>().ok())
            .unwrap_or_default();

        return ParsedReply {
            classification: Classification::ServiceIntent {
                category,
                description: fields[1].to_string(),
                priority,
            },
            remainder: join_remainder(before, after),
        };
    }

    if let Some(idx) = raw.find(CANCEL_MARKER) {
        let (before, payload, after) = split_at_marker(raw, idx, CANCEL_MARKER.len());
        let reason = payload.trim();
        let reason = if reason.is_empty() {
            DEFAULT_CANCEL_REASON.to_string()
        } else {
            reason.to_string()
        };
        return ParsedReply {
            classification: Classification::CancelIntent { reason },
            remainder: join_remainder(before, after),
        };
    }

    passthrough(raw)
}

fn passthrough(raw: &str) -> ParsedReply {
    ParsedReply {
        classification: Classification::NoIntent,
        remainder: raw.to_string(),
    }
}

/// Returns (text before the marker, first payload line, text after that line).
fn split_at_marker(raw: &str, idx: usize, marker_len: usize) -> (&str, &str, &str) {
    let before = &raw[..idx];
    let rest = &raw[idx + marker_len..];
    match rest.find('\n') {
        Some(nl) => (before, rest[..nl].trim_end_matches('\r'), &rest[nl + 1..]),
        None => (before, rest, ""),
    }
}

fn join_remainder(before: &str, after: &str) -> String {
    let before = before.trim();
    let after = after.trim();
    match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (false, true) => before.to_string(),
        (false, false) => format!("{before}\n\n{after}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_payload_fields_are_dropped() {
        let parsed = parse("SERVICE_REQUEST|maintenance|Leaking tap|urgent|room 204|asap\nOn it!");
        assert_eq!(
            parsed.classification,
            Classification::ServiceIntent {
                category: Category::Maintenance,
                description: "Leaking tap".into(),
                priority: Priority::Urgent,
            }
        );
        assert_eq!(parsed.remainder, "On it!");
    }

    #[test]
    fn service_marker_with_remainder() {
        let parsed = parse("SERVICE_REQUEST|towels|Need towels|normal\nOn it!");
        assert_eq!(
            parsed.classification,
            Classification::ServiceIntent {
                category: Category::Towels,
                description: "Need towels".into(),
                priority: Priority::Normal,
            }
        );
        assert_eq!(parsed.remainder, "On it!");
    }

    #[test]
    fn plain_reply_passes_through() {
        let parsed = parse("I can help with that.");
        assert_eq!(parsed.classification, Classification::NoIntent);
        assert_eq!(parsed.remainder, "I can help with that.");
    }

    #[test]
    fn priority_defaults_to_normal() {
        let parsed = parse("SERVICE_REQUEST|maintenance|AC is broken\nSending someone.");
        assert_eq!(
            parsed.classification,
            Classification::ServiceIntent {
                category: Category::Maintenance,
                description: "AC is broken".into(),
                priority: Priority::Normal,
            }
        );
    }

    #[test]
    fn urgent_priority_and_spaced_category() {
        let parsed = parse("SERVICE_REQUEST| Room Service | Club sandwich | URGENT ");
        assert_eq!(
            parsed.classification,
            Classification::ServiceIntent {
                category: Category::RoomService,
                description: "Club sandwich".into(),
                priority: Priority::Urgent,
            }
        );
        assert_eq!(parsed.remainder, "");
    }

    #[test]
    fn unknown_category_and_priority_fall_back() {
        let parsed = parse("SERVICE_REQUEST|spa|Massage at 5|asap\nBooked.");
        assert_eq!(
            parsed.classification,
            Classification::ServiceIntent {
                category: Category::Concierge,
                description: "Massage at 5".into(),
                priority: Priority::Normal,
            }
        );
    }

    #[test]
    fn text_before_marker_is_kept() {
        let parsed = parse("Of course!\nSERVICE_REQUEST|towels|2 towels|normal\nThey're on the way.");
        assert!(parsed.classification.is_service());
        assert_eq!(parsed.remainder, "Of course!\n\nThey're on the way.");
    }

    #[test]
    fn malformed_payload_is_no_intent_with_raw_reply() {
        let raw = "SERVICE_REQUEST|towels\nSure thing.";
        let parsed = parse(raw);
        assert_eq!(parsed.classification, Classification::NoIntent);
        assert_eq!(parsed.remainder, raw);
    }

    #[test]
    fn empty_description_is_malformed() {
        let raw = "SERVICE_REQUEST|towels||normal";
        assert_eq!(parse(raw).classification, Classification::NoIntent);
    }

    #[test]
    fn cancel_marker() {
        let parsed = parse("CANCEL_REQUEST|Guest changed plans\nNo problem, cancelled.");
        assert_eq!(
            parsed.classification,
            Classification::CancelIntent {
                reason: "Guest changed plans".into()
            }
        );
        assert_eq!(parsed.remainder, "No problem, cancelled.");
    }

    #[test]
    fn cancel_marker_empty_reason() {
        let parsed = parse("CANCEL_REQUEST|\nDone.");
        assert_eq!(
            parsed.classification,
            Classification::CancelIntent {
                reason: DEFAULT_CANCEL_REASON.into()
            }
        );
    }

    #[test]
    fn crlf_line_endings() {
        let parsed = parse("SERVICE_REQUEST|towels|Need towels|urgent\r\nOn it!");
        assert_eq!(
            parsed.classification,
            Classification::ServiceIntent {
                category: Category::Towels,
                description: "Need towels".into(),
                priority: Priority::Urgent,
            }
        );
        assert_eq!(parsed.remainder, "On it!");
    }

    #[test]
    fn marker_detection_is_loose() {
        assert!(contains_marker("SERVICE_REQUEST|towels"));
        assert!(contains_marker("service_request: towels"));
        assert!(contains_marker("Cancel_Request - none"));
        assert!(!contains_marker("I can help with your service request."));
    }
}
