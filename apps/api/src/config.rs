use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::LlmSettings;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const MAX_LLM_ATTEMPTS: u32 = 10;

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub llm_model: String,
    /// Low by default to bias the reasoning service toward consistent output.
    pub llm_temperature: f32,
    pub llm_timeout_secs: u64,
    pub llm_max_retries: u32,
    /// Resumes scored concurrently within one batch.
    pub scoring_concurrency: usize,
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Config {
            openai_api_key: lookup("OPENAI_API_KEY").with_context(|| {
                "Required environment variable 'OPENAI_API_KEY' is not set".to_string()
            })?,
            openai_base_url: lookup("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            llm_model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm_temperature: parse_or(&lookup, "LLM_TEMPERATURE", 0.2)?,
            llm_timeout_secs: parse_or(&lookup, "LLM_TIMEOUT_SECS", 60)?,
            llm_max_retries: parse_or(&lookup, "LLM_MAX_RETRIES", 3)?,
            scoring_concurrency: parse_or(&lookup, "SCORING_CONCURRENCY", 4)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        };

        if !(0.0..=2.0).contains(&config.llm_temperature) {
            bail!("LLM_TEMPERATURE must be between 0 and 2");
        }
        if config.scoring_concurrency == 0 {
            bail!("SCORING_CONCURRENCY must be at least 1");
        }
        if !(1..=MAX_LLM_ATTEMPTS).contains(&config.llm_max_retries) {
            bail!("LLM_MAX_RETRIES must be between 1 and {MAX_LLM_ATTEMPTS}");
        }

        Ok(config)
    }

    pub fn llm_settings(&self) -> LlmSettings {
        LlmSettings {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            model: self.llm_model.clone(),
            temperature: self.llm_temperature,
            timeout: Duration::from_secs(self.llm_timeout_secs),
            max_attempts: self.llm_max_retries,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}
