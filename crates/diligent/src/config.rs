//! Pipeline configuration.
//!
//! ```ignore
//! let config = PipelineConfig::default()
//!     .with_model("anthropic/claude-sonnet-4")
//!     .with_temperature(0.4)
//!     .with_session_logging(true);
//! ```

use std::path::PathBuf;

/// Default model for module invocations.
pub const DEFAULT_MODEL: &str = "openai/gpt-4";

/// System message sent with every module prompt.
pub const DEFAULT_PERSONA: &str = "You are the Deep Diligent Agent, a professional-grade AI \
research assistant. You provide executive-level insights with calm wisdom, sharp analysis, and \
deep empathy. Your responses are structured, actionable, and grounded in evidence.";

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_LOGS_DIR: &str = "logs";

pub const MODEL_ENV: &str = "DILIGENT_MODEL";
pub const TEMPLATES_DIR_ENV: &str = "DILIGENT_TEMPLATES_DIR";
pub const LOG_SESSIONS_ENV: &str = "LOG_SESSIONS";
pub const LOG_DIR_ENV: &str = "DILIGENT_LOG_DIR";

/// Settings shared by every module run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub model: String,
    pub persona: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Directory holding `DARA.md` and `DeepSpec_Prompt_Library.md`.
    /// `None` uses the templates compiled into the crate.
    pub templates_dir: Option<PathBuf>,
    /// Write every prompt/response pair under `logs_dir`.
    pub log_sessions: bool,
    pub logs_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            persona: DEFAULT_PERSONA.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            templates_dir: None,
            log_sessions: false,
            logs_dir: PathBuf::from(DEFAULT_LOGS_DIR),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `DILIGENT_MODEL`, `DILIGENT_TEMPLATES_DIR`,
    /// `LOG_SESSIONS` and `DILIGENT_LOG_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = get(MODEL_ENV) {
            config.model = model;
        }
        if let Some(dir) = get(TEMPLATES_DIR_ENV) {
            config.templates_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = get(LOG_SESSIONS_ENV) {
            config.log_sessions = parse_flag(&flag);
        }
        if let Some(dir) = get(LOG_DIR_ENV) {
            config.logs_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates_dir = Some(dir.into());
        self
    }

    pub fn with_session_logging(mut self, enabled: bool) -> Self {
        self.log_sessions = enabled;
        self
    }

    pub fn with_logs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.logs_dir = dir.into();
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
