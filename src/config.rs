//! Configuration types, read from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::pipeline::rules::{QuickAnswers, QuickReplies, Rulebook};

/// System prompt describing the marker protocol the parser understands.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a virtual concierge for a luxury hotel. Help guests quickly and politely \
with questions and requests. Use a professional, friendly tone and be concise.

You can handle hotel information (Wi-Fi, check-in/out times, amenities), service \
requests (towels, housekeeping, room service, maintenance, transportation) and \
local recommendations.

When the guest asks for a service, begin your reply with exactly one line:
SERVICE_REQUEST|<category>|<short description>|<normal or urgent>
where <category> is one of: housekeeping, towels, room_service, refreshments, \
maintenance, tech_support, amenities, transportation, local_info, concierge.
When the guest wants to cancel a previous request, begin with exactly one line:
CANCEL_REQUEST|<reason>
After that line, write your reply to the guest. Never mention the marker line. \
If the request is unclear, ask for clarification and do not emit a marker.";

const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Read an optional env var, treating empty values as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse an env var, falling back to `default` when unset.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// HTTP server and persistence settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub db_path: PathBuf,
    /// How long a login session stays valid.
    pub session_ttl: chrono::Duration,
    /// Directory for the rolling file log. `None` logs to stderr only.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("./data/concierge.db"),
            session_ttl: chrono::Duration::hours(24),
            log_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ttl_hours: i64 = env_parse("HOTEL_SESSION_TTL_HOURS", 24)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "HOTEL_SESSION_TTL_HOURS".into(),
                message: "must be positive".into(),
            });
        }
        Ok(Self {
            port: env_parse("HOTEL_PORT", defaults.port)?,
            db_path: env_opt("HOTEL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            session_ttl: chrono::Duration::hours(ttl_hours),
            log_dir: env_opt("HOTEL_LOG_DIR").map(PathBuf::from),
        })
    }
}

/// Hotel facts served as quick answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotelInfo {
    pub wifi_password: String,
    pub checkout_time: String,
    pub room_service_menu_url: String,
}

impl Default for HotelInfo {
    fn default() -> Self {
        Self {
            wifi_password: "HotelGuest123".to_string(),
            checkout_time: "12:00 PM".to_string(),
            room_service_menu_url: "https://hotel.example.com/menu".to_string(),
        }
    }
}

impl HotelInfo {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            wifi_password: env_opt("HOTEL_WIFI_PASSWORD").unwrap_or(defaults.wifi_password),
            checkout_time: env_opt("HOTEL_CHECKOUT_TIME").unwrap_or(defaults.checkout_time),
            room_service_menu_url: env_opt("HOTEL_ROOM_SERVICE_MENU_URL")
                .unwrap_or(defaults.room_service_menu_url),
        }
    }
}

/// Model selection and credentials.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub backend: LlmBackend,
    /// `None` when no credential is configured; the assistant then runs
    /// without a model.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub timeout: Duration,
    pub system_prompt: String,
}

impl LlmSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match env_opt("HOTEL_LLM_BACKEND") {
            Some(raw) => raw.parse::<LlmBackend>().map_err(|message| ConfigError::InvalidValue {
                key: "HOTEL_LLM_BACKEND".into(),
                message,
            })?,
            None => LlmBackend::Anthropic,
        };

        let (key_var, default_model) = match backend {
            LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", DEFAULT_ANTHROPIC_MODEL),
            LlmBackend::OpenAi => ("OPENAI_API_KEY", DEFAULT_OPENAI_MODEL),
        };

        let timeout_secs: u64 = env_parse("HOTEL_MODEL_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "HOTEL_MODEL_TIMEOUT_SECS".into(),
                message: "must be at least 1".into(),
            });
        }

        Ok(Self {
            backend,
            api_key: env_opt(key_var).map(SecretString::from),
            model: env_opt("HOTEL_MODEL").unwrap_or_else(|| default_model.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            system_prompt: env_opt("HOTEL_SYSTEM_PROMPT")
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        })
    }

    /// Provider config, if a credential is present.
    pub fn llm_config(&self) -> Option<LlmConfig> {
        self.api_key.as_ref().map(|key| LlmConfig {
            backend: self.backend,
            api_key: key.clone(),
            model: self.model.clone(),
        })
    }
}

/// The single staff account allowed into the admin API.
#[derive(Debug, Clone)]
pub struct StaffCredentials {
    pub username: String,
    pub password: SecretString,
}

impl StaffCredentials {
    /// `Ok(None)` when no admin password is configured (staff login disabled).
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(password) = env_opt("HOTEL_ADMIN_PASSWORD") else {
            return Ok(None);
        };
        Ok(Some(Self {
            username: env_opt("HOTEL_ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
            password: SecretString::from(password),
        }))
    }
}

/// Everything the dispatcher needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub rulebook: Rulebook,
    pub quick_answers: QuickAnswers,
    /// Replies for the quick-request buttons.
    pub quick_replies: QuickReplies,
    pub system_prompt: String,
    pub model_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rulebook: Rulebook::default_rules(),
            quick_answers: QuickAnswers::new(HotelInfo::default()),
            quick_replies: QuickReplies::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model_timeout: Duration::from_secs(30),
        }
    }
}

impl PipelineConfig {
    pub fn new(hotel: HotelInfo, llm: &LlmSettings) -> Self {
        Self {
            rulebook: Rulebook::default_rules(),
            quick_replies: QuickReplies::new(&hotel),
            quick_answers: QuickAnswers::new(hotel),
            system_prompt: llm.system_prompt.clone(),
            model_timeout: llm.timeout,
        }
    }
}
