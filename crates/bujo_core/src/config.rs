//! Environment-driven journal configuration.
//!
//! # Responsibility
//! - Resolve AI, editor and filesystem settings from environment variables.
//! - Derive the database, model and log locations from the data directory.
//!
//! # Invariants
//! - Resolution is pure over the lookup function; `from_env` only supplies
//!   `std::env::var`.
//! - Selecting the remote provider requires a remote API key.

use crate::ai::models::default_model_name;
use crate::ai::AiProvider;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_AI_ENABLED: &str = "BUJO_AI_ENABLED";
pub const ENV_AI_PROVIDER: &str = "BUJO_AI_PROVIDER";
pub const ENV_REMOTE_API_KEY: &str = "BUJO_REMOTE_API_KEY";
pub const ENV_LOCAL_MODEL: &str = "BUJO_LOCAL_MODEL";
pub const ENV_DATA_DIR: &str = "BUJO_DATA_DIR";
pub const ENV_PROMPT_DIR: &str = "BUJO_PROMPT_DIR";

const DEFAULT_EDITOR: &str = "vi";
const DATA_DIR_NAME: &str = ".bujo";
const DATABASE_FILE: &str = "bujo.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A boolean variable holds something other than a known switch word.
    InvalidBool { key: &'static str, value: String },
    InvalidProvider(String),
    /// `remote` was selected but no key is configured.
    MissingRemoteApiKey,
    /// Neither the data directory variable nor `HOME` is set.
    MissingDataDir,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBool { key, value } => {
                write!(f, "{key} must be a boolean, got `{value}`")
            }
            Self::InvalidProvider(value) => {
                write!(f, "{ENV_AI_PROVIDER} must be `remote` or `local`, got `{value}`")
            }
            Self::MissingRemoteApiKey => write!(
                f,
                "remote AI provider selected but {ENV_REMOTE_API_KEY} is not set"
            ),
            Self::MissingDataDir => write!(f, "set {ENV_DATA_DIR} or HOME"),
        }
    }
}

impl Error for ConfigError {}

/// Resolved configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct JournalConfig {
    pub ai_enabled: bool,
    pub ai_provider: AiProvider,
    pub remote_api_key: Option<String>,
    pub local_model_name: String,
    pub editor_command: String,
    pub data_dir: PathBuf,
    pub prompt_dir: PathBuf,
}

impl std::fmt::Debug for JournalConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalConfig")
            .field("ai_enabled", &self.ai_enabled)
            .field("ai_provider", &self.ai_provider)
            .field(
                "remote_api_key",
                &self.remote_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("local_model_name", &self.local_model_name)
            .field("editor_command", &self.editor_command)
            .field("data_dir", &self.data_dir)
            .field("prompt_dir", &self.prompt_dir)
            .finish()
    }
}

impl JournalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let ai_enabled = match get(ENV_AI_ENABLED) {
            Some(value) => parse_bool(ENV_AI_ENABLED, &value)?,
            None => false,
        };
        let remote_api_key = get(ENV_REMOTE_API_KEY);
        let ai_provider = match get(ENV_AI_PROVIDER) {
            Some(value) => {
                AiProvider::parse(&value).ok_or(ConfigError::InvalidProvider(value))?
            }
            None if remote_api_key.is_some() => AiProvider::Remote,
            None => AiProvider::Local,
        };
        if ai_provider == AiProvider::Remote && remote_api_key.is_none() {
            return Err(ConfigError::MissingRemoteApiKey);
        }

        let data_dir = match get(ENV_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => get("HOME")
                .map(|home| PathBuf::from(home).join(DATA_DIR_NAME))
                .ok_or(ConfigError::MissingDataDir)?,
        };
        let prompt_dir = get(ENV_PROMPT_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("prompts"));

        Ok(Self {
            ai_enabled,
            ai_provider,
            remote_api_key,
            local_model_name: get(ENV_LOCAL_MODEL)
                .unwrap_or_else(|| default_model_name().to_string()),
            editor_command: get("VISUAL")
                .or_else(|| get("EDITOR"))
                .unwrap_or_else(|| DEFAULT_EDITOR.to_string()),
            data_dir,
            prompt_dir,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_string(),
        }),
    }
}
