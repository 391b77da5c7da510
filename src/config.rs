//! Configuration from environment variables.
//!
//! The process is `.env`-driven (loaded best-effort in `main`); every knob
//! has a default except the model endpoint and API key, which are allowed
//! to be absent at load time — the client constructor turns absence into a
//! hard error, and `main` logs a warning so a missing `.env` is obvious.
//!
//! `load` goes through an injectable lookup function; tests pass a map
//! instead of mutating process env.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::AppError;

/// Default SQLite path, relative to the working directory.
const DEFAULT_SQLITE_STORAGE: &str = "./data/memory.sqlite";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_SHORT_MEMORY_SIZE: usize = 8;
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1000;
const DEFAULT_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Fully-resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Azure resource base URL (`AZURE_OPENAI_ENDPOINT`). `None` until the
    /// model client is needed.
    pub endpoint: Option<String>,
    /// API key (`AZURE_OPENAI_APIKEY`). Never written to disk or logs.
    pub api_key: Option<String>,
    /// Deployment name interpolated into the request URL (`AZURE_OPENAI_MODEL`).
    pub model: String,
    /// SQLite file path (`SQLITE_STORAGE`), `~` already expanded.
    pub sqlite_path: PathBuf,
    /// Short-term buffer capacity N (`SHORT_MEMORY_SIZE`).
    pub short_memory_size: usize,
    /// Generation temperature (`MODEL_TEMPERATURE`).
    pub temperature: f32,
    /// Max output tokens per reply (`MODEL_MAX_TOKENS`).
    pub max_tokens: u32,
    /// Per-attempt HTTP timeout (`REQUEST_TIMEOUT_MS`).
    pub request_timeout: Duration,
    /// Log level string (`PALAVER_LOG`; `RUST_LOG` wins when set).
    pub log_level: String,
}

impl Config {
    /// `true` when the model client cannot be constructed from this config.
    pub fn missing_credentials(&self) -> bool {
        self.endpoint.is_none() || self.api_key.is_none()
    }
}

/// Load configuration from process environment.
pub fn load() -> Result<Config, AppError> {
    from_lookup(|key| env::var(key).ok())
}

/// Build a `Config` from any string-to-string lookup.
///
/// Unset variables fall back to defaults; set-but-malformed numeric values
/// are an error rather than a silent default.
pub fn from_lookup<F>(lookup: F) -> Result<Config, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let endpoint = lookup("AZURE_OPENAI_ENDPOINT").filter(|s| !s.is_empty());
    let api_key = lookup("AZURE_OPENAI_APIKEY").filter(|s| !s.is_empty());
    let model = lookup("AZURE_OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let sqlite_path = expand_home(
        &lookup("SQLITE_STORAGE").unwrap_or_else(|| DEFAULT_SQLITE_STORAGE.to_string()),
    );

    let short_memory_size =
        parse_var(&lookup, "SHORT_MEMORY_SIZE", DEFAULT_SHORT_MEMORY_SIZE)?;
    if short_memory_size == 0 {
        return Err(AppError::Config(
            "SHORT_MEMORY_SIZE must be at least 1".to_string(),
        ));
    }

    let temperature = parse_var(&lookup, "MODEL_TEMPERATURE", DEFAULT_TEMPERATURE)?;
    let max_tokens = parse_var(&lookup, "MODEL_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
    let timeout_ms = parse_var(&lookup, "REQUEST_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;

    let log_level = lookup("PALAVER_LOG").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

    Ok(Config {
        endpoint,
        api_key,
        model,
        sqlite_path,
        short_memory_size,
        temperature,
        max_tokens,
        request_timeout: Duration::from_millis(timeout_ms),
        log_level,
    })
}

/// Parse an optional env value, defaulting when unset.
fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("invalid {key} value '{raw}': {e}"))),
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for unit tests — no credentials, store path under `dir`.
#[cfg(test)]
impl Config {
    pub fn test_default(dir: &std::path::Path) -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            sqlite_path: dir.join("memory.sqlite"),
            short_memory_size: DEFAULT_SHORT_MEMORY_SIZE,
            temperature: 0.0,
            max_tokens: 64,
            request_timeout: Duration::from_secs(1),
            log_level: "info".to_string(),
        }
    }
}
