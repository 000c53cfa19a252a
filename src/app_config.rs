use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::chunking::{DelimiterClass, ReplacePattern};
use crate::session::prompts::PromptTemplate;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language code (ISO) or English name
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO) or English name
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Chunking config
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Per-chunk session config
    #[serde(default)]
    pub session: SessionConfig,

    /// Model provider config
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// How documents are split into chunks
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChunkingConfig {
    /// Chunks below this many characters are merged with a neighbour
    #[serde(default = "default_min_chunk_size")]
    pub min_size: usize,

    /// Chunks above this many characters are divided further
    #[serde(default = "default_max_chunk_size")]
    pub max_size: usize,

    /// Delimiter classes in priority order
    #[serde(default = "DelimiterClass::defaults")]
    pub delimiter_classes: Vec<DelimiterClass>,

    /// Regex substitutions
    #[serde(default)]
    pub replacements: Vec<ReplacePattern>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_chunk_size(),
            max_size: default_max_chunk_size(),
            delimiter_classes: DelimiterClass::defaults(),
            replacements: Vec::new(),
        }
    }
}

/// Per-chunk exchange with the model
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    /// Upper bound on declared portions per chunk
    #[serde(default = "default_max_portions")]
    pub max_portions: usize,

    /// Lowest plausible translated/source length ratio
    #[serde(default = "default_min_length_ratio")]
    pub min_length_ratio: f64,

    /// Highest plausible translated/source length ratio
    #[serde(default = "default_max_length_ratio")]
    pub max_length_ratio: f64,

    /// Re-prompts after a malformed reply
    #[serde(default = "default_max_protocol_retries")]
    pub max_protocol_retries: u32,

    /// Reframed requests after a refusal
    #[serde(default = "default_max_refusal_reframes")]
    pub max_refusal_reframes: u32,

    /// Retries after a timeout or transient provider error
    #[serde(default = "default_max_timeout_retries")]
    pub max_timeout_retries: u32,

    /// Deadline of one model call in seconds
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// First retry delay in milliseconds, doubled on each attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Memory units injected as reference per call
    #[serde(default = "default_memory_neighbours")]
    pub memory_neighbours: usize,

    /// Characters of the previous chunk carried into the next one
    #[serde(default = "default_carry_over_chars")]
    pub carry_over_chars: usize,

    /// System prompt template for translation
    /// Supports {source_language}, {target_language}, {max_portions} and {continuation_token}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_portions: default_max_portions(),
            min_length_ratio: default_min_length_ratio(),
            max_length_ratio: default_max_length_ratio(),
            max_protocol_retries: default_max_protocol_retries(),
            max_refusal_reframes: default_max_refusal_reframes(),
            max_timeout_retries: default_max_timeout_retries(),
            call_timeout_secs: default_call_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
            memory_neighbours: default_memory_neighbours(),
            carry_over_chars: default_carry_over_chars(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Ollama service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    /// Service endpoint URL
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    /// Model name (e.g., "llama3", "qwen2.5")
    #[serde(default = "default_ollama_model")]
    pub model: String,

    /// Embedding model; the local n-gram embedder is used when empty
    #[serde(default)]
    pub embedding_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_ollama_model(),
            embedding_model: String::new(),
            temperature: default_temperature(),
        }
    }
}

/// Log level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "ja".to_string()
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_min_chunk_size() -> usize {
    64
}

fn default_max_chunk_size() -> usize {
    512
}

fn default_max_portions() -> usize {
    32
}

fn default_min_length_ratio() -> f64 {
    0.5
}

fn default_max_length_ratio() -> f64 {
    2.0
}

fn default_max_protocol_retries() -> u32 {
    2
}

fn default_max_refusal_reframes() -> u32 {
    2
}

fn default_max_timeout_retries() -> u32 {
    3
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_memory_neighbours() -> usize {
    3
}

fn default_carry_over_chars() -> usize {
    200
}

fn default_system_prompt() -> String {
    PromptTemplate::PORTION_TRANSLATOR.to_string()
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1".to_string()
}

fn default_temperature() -> f32 {
    0.3
}

impl Config {
    /// Load the configuration from a JSON file.
    /// A missing or blank file is replaced by the default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read config file: {}", path.display()));
            }
        };

        if content.trim().is_empty() {
            warn!("Config file '{}' missing or empty, creating default config.", path.display());
            let config = Config::default();
            config.save(path)?;
            return Ok(config);
        }

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, json).with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        let chunking = &self.chunking;
        if chunking.max_size == 0 {
            return Err(anyhow!("chunking.max_size must be greater than 0"));
        }
        if chunking.min_size > chunking.max_size {
            return Err(anyhow!(
                "chunking.min_size ({}) exceeds chunking.max_size ({})",
                chunking.min_size,
                chunking.max_size
            ));
        }
        if chunking.delimiter_classes.is_empty() {
            return Err(anyhow!("At least one delimiter class is required"));
        }
        for class in &chunking.delimiter_classes {
            class.compile()?;
        }
        for replacement in &chunking.replacements {
            regex::Regex::new(&replacement.pattern)
                .with_context(|| format!("Invalid replacement pattern '{}'", replacement.name))?;
        }

        let session = &self.session;
        if session.max_portions == 0 {
            return Err(anyhow!("session.max_portions must be at least 1"));
        }
        if !(session.min_length_ratio > 0.0 && session.min_length_ratio <= session.max_length_ratio) {
            return Err(anyhow!(
                "Invalid length ratio bounds [{}, {}]",
                session.min_length_ratio,
                session.max_length_ratio
            ));
        }
        if session.call_timeout_secs == 0 {
            return Err(anyhow!("session.call_timeout_secs must be greater than 0"));
        }

        if self.provider.endpoint.trim().is_empty() {
            return Err(anyhow!("provider.endpoint is required"));
        }
        if self.provider.model.trim().is_empty() {
            return Err(anyhow!("provider.model is required"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            chunking: ChunkingConfig::default(),
            session: SessionConfig::default(),
            provider: ProviderConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
