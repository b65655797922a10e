//! Category rulebook, quick answers and quick-request replies.
//!
//! All run without a model call:
//! - `Rulebook` maps guest text to a request category by keyword
//! - `QuickAnswers` short-circuits wifi and checkout questions with canned replies
//! - `QuickReplies` answers the one-tap request buttons of the guest UI

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::HotelInfo;
use crate::requests::model::{Category, Priority};

/// Keywords and default priority for one category.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: Category,
    /// Lowercase trigger substrings.
    pub keywords: Vec<String>,
    pub priority: Priority,
}

impl CategoryRule {
    pub fn new(category: Category, keywords: &[&str], priority: Priority) -> Self {
        Self {
            category,
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            priority,
        }
    }

    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }
}

/// Ordered category table. The first rule whose keywords appear in the text wins.
#[derive(Debug, Clone)]
pub struct Rulebook {
    rules: Vec<CategoryRule>,
}

impl Rulebook {
    /// The stock hotel rulebook, one rule per category in `Category::ALL` order.
    pub fn default_rules() -> Self {
        use Category::*;
        let normal = Priority::Normal;
        let rules = vec![
            CategoryRule::new(
                Housekeeping,
                &[
                    "housekeeping",
                    "clean",
                    "tidy",
                    "maid",
                    "bedding",
                    "sheets",
                    "pillow",
                    "vacuum",
                    "trash",
                    "make the bed",
                ],
                normal,
            ),
            CategoryRule::new(Towels, &["towel", "bathrobe", "bath mat"], normal),
            CategoryRule::new(
                RoomService,
                &[
                    "room service",
                    "food",
                    "breakfast",
                    "lunch",
                    "dinner",
                    "meal",
                    "menu",
                    "hungry",
                    "sandwich",
                    "pizza",
                ],
                normal,
            ),
            CategoryRule::new(
                Refreshments,
                &[
                    "coffee",
                    "cup of tea",
                    "bottled water",
                    "bottle of water",
                    "drinking water",
                    "ice bucket",
                    "drinks",
                    "snack",
                    "soda",
                    "juice",
                    "minibar",
                ],
                normal,
            ),
            CategoryRule::new(
                Maintenance,
                &[
                    "maintenance",
                    "broken",
                    "fix",
                    "repair",
                    "leak",
                    "not working",
                    "doesn't work",
                    "plumbing",
                    "toilet",
                    "clogged",
                    "heating",
                    "air conditioning",
                    "thermostat",
                ],
                Priority::Urgent,
            ),
            CategoryRule::new(
                TechSupport,
                &[
                    "internet",
                    "wifi",
                    "wi-fi",
                    "tv",
                    "television",
                    "remote",
                    "charger",
                    "printer",
                    "computer",
                ],
                normal,
            ),
            CategoryRule::new(
                Amenities,
                &[
                    "amenit",
                    "toothbrush",
                    "toothpaste",
                    "shampoo",
                    "soap",
                    "razor",
                    "hair dryer",
                    "iron",
                    "blanket",
                    "baby cot",
                ],
                normal,
            ),
            CategoryRule::new(
                Transportation,
                &[
                    "taxi",
                    "shuttle",
                    "airport",
                    "uber",
                    "lyft",
                    "transport",
                    "car rental",
                    "rental car",
                    "a ride",
                ],
                normal,
            ),
            CategoryRule::new(
                LocalInfo,
                &[
                    "restaurant",
                    "recommend",
                    "nearby",
                    "attraction",
                    "museum",
                    "tour",
                    "directions",
                    "shopping",
                ],
                normal,
            ),
            CategoryRule::new(
                Concierge,
                &[
                    "concierge",
                    "reservation",
                    "book",
                    "ticket",
                    "wake-up call",
                    "wake up call",
                    "late checkout",
                ],
                normal,
            ),
        ];
        Self { rules }
    }

    /// A rulebook with no rules (everything falls into the default bucket).
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rules(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Category of the first matching rule, with the highest priority of
    /// every matching rule. A maintenance keyword anywhere in the text makes
    /// the request urgent even when another category is filed.
    pub fn resolve(&self, text: &str) -> Option<(Category, Priority)> {
        let lowered = text.to_lowercase();
        let mut hits = self.rules.iter().filter(|rule| rule.matches(&lowered));
        let first = hits.next()?;
        let priority = hits
            .map(|rule| rule.priority)
            .fold(first.priority, Priority::max);
        debug!(category = %first.category, priority = %priority, "Rulebook match");
        Some((first.category, priority))
    }
}

impl Default for Rulebook {
    fn default() -> Self {
        Self::default_rules()
    }
}

static WIFI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwi-?fi\b").expect("wifi pattern is valid")
});

static CHECKOUT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcheck[- ]?out\b").expect("checkout pattern is valid")
});

/// Which canned answer a message triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickTopic {
    Wifi,
    Checkout,
}

/// Canned replies for the two questions every guest asks.
#[derive(Debug, Clone)]
pub struct QuickAnswers {
    hotel: HotelInfo,
}

impl QuickAnswers {
    pub fn new(hotel: HotelInfo) -> Self {
        Self { hotel }
    }

    pub fn topic(&self, text: &str) -> Option<QuickTopic> {
        if WIFI_PATTERN.is_match(text) {
            Some(QuickTopic::Wifi)
        } else if CHECKOUT_PATTERN.is_match(text) {
            Some(QuickTopic::Checkout)
        } else {
            None
        }
    }

    /// The canned reply for `text`, if it asks about wifi or checkout.
    pub fn answer(&self, text: &str) -> Option<String> {
        self.topic(text).map(|topic| match topic {
            QuickTopic::Wifi => format!(
                "Here is your Wi-Fi password: {}",
                self.hotel.wifi_password
            ),
            QuickTopic::Checkout => format!("Check-out time is {}.", self.hotel.checkout_time),
        })
    }
}

/// Reply for a quick-request label with no entry in the table.
pub const QUICK_REQUEST_FALLBACK: &str = "Your request has been sent to the staff.";

/// Canned replies for the guest UI's quick-request buttons, keyed by label.
///
/// Labels match case-insensitively, ignoring any leading emoji or
/// punctuation, so "🧴 Extra Towels" and "extra towels" are the same button.
#[derive(Debug, Clone)]
pub struct QuickReplies {
    entries: Vec<(String, String)>,
}

impl QuickReplies {
    /// The stock buttons, filled in from hotel facts.
    pub fn new(hotel: &HotelInfo) -> Self {
        Self::with_entries(vec![
            (
                "Request Housekeeping".to_string(),
                "Housekeeping will arrive shortly.".to_string(),
            ),
            (
                "Extra Towels".to_string(),
                "Extra towels are on their way to your room.".to_string(),
            ),
            (
                "Room Service Menu".to_string(),
                format!(
                    "You can view the room service menu at: {}",
                    hotel.room_service_menu_url
                ),
            ),
            (
                "Check-Out Time".to_string(),
                format!("Check-out time is at {}.", hotel.checkout_time),
            ),
            (
                "Wi-Fi Info".to_string(),
                format!("Wi-Fi password: {}", hotel.wifi_password),
            ),
        ])
    }

    pub fn with_entries(entries: Vec<(String, String)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(label, reply)| (normalize_label(&label), reply))
            .collect();
        Self { entries }
    }

    /// The reply for `label`, or `None` for an unknown button.
    pub fn lookup(&self, label: &str) -> Option<&str> {
        let key = normalize_label(label);
        self.entries
            .iter()
            .find(|(known, _)| *known == key)
            .map(|(_, reply)| reply.as_str())
    }

    /// The reply for `label`, falling back to the generic acknowledgment.
    pub fn reply(&self, label: &str) -> &str {
        self.lookup(label).unwrap_or(QUICK_REQUEST_FALLBACK)
    }
}

impl Default for QuickReplies {
    fn default() -> Self {
        Self::new(&HotelInfo::default())
    }
}

fn normalize_label(label: &str) -> String {
    label
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_cover_every_category_in_order() {
        let rulebook = Rulebook::default_rules();
        let categories: Vec<Category> = rulebook.rules().iter().map(|r| r.category).collect();
        assert_eq!(categories, Category::ALL.to_vec());
    }

    #[test]
    fn only_maintenance_is_urgent() {
        let rulebook = Rulebook::default_rules();
        for rule in rulebook.rules() {
            let expected = if rule.category == Category::Maintenance {
                Priority::Urgent
            } else {
                Priority::Normal
            };
            assert_eq!(rule.priority, expected, "{}", rule.category);
        }
    }

    #[test]
    fn resolve_is_case_insensitive() {
        let rulebook = Rulebook::default_rules();
        assert_eq!(
            rulebook.resolve("The TOILET is CLOGGED"),
            Some((Category::Maintenance, Priority::Urgent))
        );
    }

    #[test]
    fn towels_win_over_housekeeping() {
        let rulebook = Rulebook::default_rules();
        let (category, _) = rulebook.resolve("Please bring me extra towels").unwrap();
        assert_eq!(category, Category::Towels);
    }

    #[test]
    fn first_declared_category_wins() {
        let rulebook = Rulebook::default_rules();
        // "clean" (housekeeping) and "towel" both match; housekeeping is declared first.
        let (category, _) = rulebook.resolve("clean the room and swap the towels").unwrap();
        assert_eq!(category, Category::Housekeeping);
    }

    #[test]
    fn resolve_escalates_to_highest_matching_priority() {
        let rulebook = Rulebook::default_rules();
        assert_eq!(
            rulebook.resolve("Please fix the broken coffee machine"),
            Some((Category::Refreshments, Priority::Urgent))
        );
        assert_eq!(
            rulebook.resolve("Please clean up, the toilet is leaking"),
            Some((Category::Housekeeping, Priority::Urgent))
        );
        assert_eq!(
            rulebook.resolve("I need the toilet fixed, the towel rail is broken"),
            Some((Category::Towels, Priority::Urgent))
        );
        assert_eq!(
            rulebook.resolve("clean the room and swap the towels"),
            Some((Category::Housekeeping, Priority::Normal))
        );
        assert!(rulebook.resolve("hello there").is_none());
    }

    #[test]
    fn resolve_misses() {
        assert!(Rulebook::empty().resolve("towels").is_none());
    }

    #[test]
    fn custom_rulebook() {
        let rulebook = Rulebook::with_rules(vec![CategoryRule::new(
            Category::Amenities,
            &["SPA"],
            Priority::Urgent,
        )]);
        assert_eq!(
            rulebook.resolve("book me a spa slot"),
            Some((Category::Amenities, Priority::Urgent))
        );
        assert!(rulebook.resolve("towels please").is_none());
    }

    #[test]
    fn quick_answers_wifi_and_checkout() {
        let answers = QuickAnswers::new(HotelInfo {
            wifi_password: "Sunset42".into(),
            checkout_time: "11:00 AM".into(),
            ..HotelInfo::default()
        });
        assert_eq!(
            answers.answer("what's the WiFi password?").unwrap(),
            "Here is your Wi-Fi password: Sunset42"
        );
        assert_eq!(answers.topic("Is the wi-fi free?"), Some(QuickTopic::Wifi));
        assert_eq!(
            answers.answer("What time is checkout?").unwrap(),
            "Check-out time is 11:00 AM."
        );
        assert_eq!(answers.topic("when is check-out"), Some(QuickTopic::Checkout));
        assert!(answers.answer("Please bring towels").is_none());
    }

    #[test]
    fn quick_replies_match_button_labels() {
        let replies = QuickReplies::new(&HotelInfo {
            wifi_password: "Sunset42".into(),
            checkout_time: "11:00 AM".into(),
            room_service_menu_url: "https://example.test/menu".into(),
        });
        assert_eq!(
            replies.reply("🧴 Extra Towels"),
            "Extra towels are on their way to your room."
        );
        assert_eq!(replies.reply("  wi-fi info "), "Wi-Fi password: Sunset42");
        assert_eq!(replies.reply("⏰ Check-Out Time"), "Check-out time is at 11:00 AM.");
        assert_eq!(
            replies.reply("Room Service Menu"),
            "You can view the room service menu at: https://example.test/menu"
        );
    }

    #[test]
    fn unknown_quick_request_gets_fallback() {
        let replies = QuickReplies::default();
        assert!(replies.lookup("🛁 Run me a bath").is_none());
        assert_eq!(replies.reply("🛁 Run me a bath"), QUICK_REQUEST_FALLBACK);

        let custom = QuickReplies::with_entries(vec![("Spa".into(), "The spa opens at 9.".into())]);
        assert_eq!(custom.reply("SPA"), "The spa opens at 9.");
        assert_eq!(custom.reply("Extra Towels"), QUICK_REQUEST_FALLBACK);
    }
}
