//! Local model catalog and atomic download.
//!
//! # Responsibility
//! - Describe the downloadable models and resolve `name[:variant]` specs.
//! - Stream a model into place with a single hashing pass.
//!
//! # Invariants
//! - A download writes `<dest>.tmp` and renames it only after every byte
//!   was written and flushed; any failure removes the temp file.
//! - The destination is never partially written.

use super::AiError;
use crate::cancel::CancellationToken;
use crate::model::ValidationError;
use log::{info, warn};
use sha2::{Digest, Sha256};
use std::fmt::{Display, Formatter, Write as _};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const CHUNK_SIZE: usize = 64 * 1024;
const DEFAULT_MODEL_NAME: &str = "tinyllama";

/// Semantic version of a model release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ModelVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parses `major.minor.patch`.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidModelSpec(value.to_string());
        let mut parts = value.trim().split('.');
        let mut next = || -> Result<u32, ValidationError> {
            parts
                .next()
                .filter(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|part| part.parse().ok())
                .ok_or_else(invalid)
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl Display for ModelVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// User-facing model reference, `name` or `name:variant`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelSpec {
    pub name: String,
    pub variant: Option<String>,
}

impl ModelSpec {
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidModelSpec(value.to_string());
        let trimmed = value.trim();
        let (name, variant) = match trimmed.split_once(':') {
            Some((name, variant)) => (name, Some(variant)),
            None => (trimmed, None),
        };
        if !is_spec_part(name) {
            return Err(invalid());
        }
        if let Some(variant) = variant {
            if !is_spec_part(variant) {
                return Err(invalid());
            }
        }
        Ok(Self {
            name: name.to_ascii_lowercase(),
            variant: variant.map(str::to_ascii_lowercase),
        })
    }
}

impl Display for ModelSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}:{}", self.name, variant),
            None => write!(f, "{}", self.name),
        }
    }
}

fn is_spec_part(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}

/// One downloadable model build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: &'static str,
    pub variant: &'static str,
    pub version: ModelVersion,
    pub size_bytes: u64,
    pub description: &'static str,
    pub remote_repo: &'static str,
    pub remote_filename: &'static str,
}

impl ModelInfo {
    pub fn spec(&self) -> ModelSpec {
        ModelSpec {
            name: self.name.to_string(),
            variant: Some(self.variant.to_string()),
        }
    }
}

static CATALOG: [ModelInfo; 4] = [
    ModelInfo {
        name: "tinyllama",
        variant: "q4_k_m",
        version: ModelVersion::new(1, 1, 0),
        size_bytes: 668_788_096,
        description: "TinyLlama 1.1B chat, 4-bit. Fast on any laptop.",
        remote_repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
        remote_filename: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
    },
    ModelInfo {
        name: "tinyllama",
        variant: "q8_0",
        version: ModelVersion::new(1, 1, 0),
        size_bytes: 1_169_807_648,
        description: "TinyLlama 1.1B chat, 8-bit.",
        remote_repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
        remote_filename: "tinyllama-1.1b-chat-v1.0.Q8_0.gguf",
    },
    ModelInfo {
        name: "phi-2",
        variant: "q4_k_m",
        version: ModelVersion::new(2, 0, 0),
        size_bytes: 1_789_239_136,
        description: "Phi-2 2.7B, 4-bit. Better prose, slower.",
        remote_repo: "TheBloke/phi-2-GGUF",
        remote_filename: "phi-2.Q4_K_M.gguf",
    },
    ModelInfo {
        name: "mistral-7b-instruct",
        variant: "q4_k_m",
        version: ModelVersion::new(0, 2, 0),
        size_bytes: 4_368_439_584,
        description: "Mistral 7B instruct v0.2, 4-bit. Needs 8 GB of memory.",
        remote_repo: "TheBloke/Mistral-7B-Instruct-v0.2-GGUF",
        remote_filename: "mistral-7b-instruct-v0.2.Q4_K_M.gguf",
    },
];

/// Built-in models; the first entry of each name is its default variant.
pub fn catalog() -> &'static [ModelInfo] {
    &CATALOG
}

/// Resolves a spec; a spec without variant picks the name's default variant.
pub fn find_model(spec: &ModelSpec) -> Option<&'static ModelInfo> {
    catalog().iter().find(|model| {
        model.name == spec.name
            && spec
                .variant
                .as_deref()
                .map_or(true, |variant| model.variant == variant)
    })
}

pub fn default_model() -> &'static ModelInfo {
    &CATALOG[0]
}

/// Name used when configuration does not pick a local model.
pub fn default_model_name() -> &'static str {
    DEFAULT_MODEL_NAME
}

/// Byte source for model downloads.
pub trait ModelSource {
    fn open(&self, model: &ModelInfo) -> Result<Box<dyn Read>, AiError>;
}

/// Mirror laid out as `<root>/<remote_repo>/<remote_filename>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, model: &ModelInfo) -> PathBuf {
        self.root.join(model.remote_repo).join(model.remote_filename)
    }
}

impl ModelSource for DirectorySource {
    fn open(&self, model: &ModelInfo) -> Result<Box<dyn Read>, AiError> {
        let file = File::open(self.path_for(model))?;
        Ok(Box::new(file))
    }
}

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the written file.
    pub sha256: String,
}

/// Downloads `model` from `source` into `dest` atomically.
///
/// # Errors
/// - `Cancelled` when `cancel` trips between chunks.
/// - `Io` / `Provider` for source or filesystem failures.
pub fn download_model<S>(
    source: &S,
    model: &ModelInfo,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<DownloadReport, AiError>
where
    S: ModelSource + ?Sized,
{
    let temp_path = temp_path_for(dest);
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }

    info!(
        "event=model_download module=ai status=start model={} version={}",
        model.spec(),
        model.version
    );
    let streamed = source
        .open(model)
        .and_then(|reader| stream_to_file(reader, &temp_path, cancel))
        .and_then(|outcome| {
            std::fs::rename(&temp_path, dest)?;
            Ok(outcome)
        });

    match streamed {
        Ok((bytes, sha256)) => {
            info!(
                "event=model_download module=ai status=ok model={} bytes={}",
                model.spec(),
                bytes
            );
            Ok(DownloadReport {
                path: dest.to_path_buf(),
                bytes,
                sha256,
            })
        }
        Err(err) => {
            let _ = std::fs::remove_file(&temp_path);
            warn!(
                "event=model_download module=ai status=error model={} error={}",
                model.spec(),
                err
            );
            Err(err)
        }
    }
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn stream_to_file(
    mut reader: Box<dyn Read>,
    temp_path: &Path,
    cancel: &CancellationToken,
) -> Result<(u64, String), AiError> {
    let mut writer = BufWriter::new(File::create(temp_path)?);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(AiError::Io(err)),
        };
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for byte in digest {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    Ok((total, hex))
}
