//! AI reflection support.
//!
//! # Responsibility
//! - Define the adapter seam the reflection generator drives.
//! - Host prompt templates and the local model registry.
//!
//! # Invariants
//! - Output is a lazy token sequence; the consumer pulls and may stop early.
//! - Adapters and the consumer both honor the cancellation token.

pub mod models;
pub mod prompt;
pub mod reflection;

use crate::cancel::CancellationToken;
use crate::model::ValidationError;
use crate::repo::RepoError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use models::{
    catalog, default_model, download_model, find_model, DirectorySource, DownloadReport,
    ModelInfo, ModelSource, ModelSpec, ModelVersion,
};
pub use prompt::{PromptTemplate, PromptType};
pub use reflection::ReflectionGenerator;

/// Lazily produced output tokens.
pub type TokenStream = Box<dyn Iterator<Item = Result<String, AiError>>>;

/// Backend used to draft reflections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiProvider {
    Remote,
    Local,
}

impl AiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "remote" => Some(Self::Remote),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// Error for reflection generation and model management.
#[derive(Debug)]
pub enum AiError {
    /// AI features are switched off in configuration.
    Disabled,
    Cancelled,
    /// Adapter or model source failure, reported verbatim.
    Provider(String),
    Validation(ValidationError),
    Io(std::io::Error),
    Repo(RepoError),
}

impl Display for AiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => write!(f, "AI features are disabled"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Provider(message) => write!(f, "AI provider error: {message}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "io error: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for AiError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<std::io::Error> for AiError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<RepoError> for AiError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Cancelled => Self::Cancelled,
            other => Self::Repo(other),
        }
    }
}

/// Text generation backend.
pub trait AiAdapter {
    fn provider(&self) -> AiProvider;

    /// Starts generating a completion for `prompt`.
    ///
    /// Implementations return `AiError::Cancelled` when `cancel` is tripped
    /// before or during generation.
    fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<TokenStream, AiError>;
}

impl<A: AiAdapter + ?Sized> AiAdapter for &A {
    fn provider(&self) -> AiProvider {
        (**self).provider()
    }

    fn generate(&self, prompt: &str, cancel: &CancellationToken) -> Result<TokenStream, AiError> {
        (**self).generate(prompt, cancel)
    }
}
