use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::llm::{ChatClient, ChatConfig, OPENAI_BASE_URL, PERPLEXITY_BASE_URL};
use crate::models::DEFAULT_MAX_DURATION_SECS;
use crate::pipeline::Pipeline;
use crate::stages::{
    LlmDiagnosisGenerator, LlmExtractor, PerplexityTreatmentRecommender, TranscriberConfig,
    WhisperTranscriber,
};

/// Process-wide settings, read once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Empty when OPENAI_API_KEY is unset
    pub openai_api_key: String,
    pub openai_base_url: String,
    /// Chat model used for extraction and diagnosis
    pub medical_model: String,
    pub transcription_model: String,
    pub perplexity_api_key: String,
    pub perplexity_base_url: String,
    pub perplexity_model: String,
    pub download_timeout: Duration,
    pub max_file_size_mb: u64,
    /// Default cap on audio length when a request omits one
    pub max_audio_duration: u32,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_base_url: OPENAI_BASE_URL.to_string(),
            medical_model: "gpt-4".to_string(),
            transcription_model: "whisper-1".to_string(),
            perplexity_api_key: String::new(),
            perplexity_base_url: PERPLEXITY_BASE_URL.to_string(),
            perplexity_model: "sonar".to_string(),
            download_timeout: Duration::from_secs(30),
            max_file_size_mb: 50,
            max_audio_duration: DEFAULT_MAX_DURATION_SECS,
            log_level: "INFO".to_string(),
        }
    }
}

impl AppConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset or blank keys keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY").unwrap_or_default(),
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai_base_url),
            medical_model: get("MEDICAL_MODEL").unwrap_or(defaults.medical_model),
            transcription_model: get("TRANSCRIPTION_MODEL")
                .unwrap_or(defaults.transcription_model),
            perplexity_api_key: get("PERPLEXITY_API_KEY").unwrap_or_default(),
            perplexity_base_url: get("PERPLEXITY_BASE_URL")
                .unwrap_or(defaults.perplexity_base_url),
            perplexity_model: get("PERPLEXITY_MODEL").unwrap_or(defaults.perplexity_model),
            download_timeout: Duration::from_secs(
                parse_number(&get, "DOWNLOAD_TIMEOUT")?.unwrap_or(30),
            ),
            max_file_size_mb: parse_number(&get, "MAX_FILE_SIZE_MB")?
                .unwrap_or(defaults.max_file_size_mb),
            max_audio_duration: parse_number(&get, "MAX_AUDIO_DURATION")?
                .unwrap_or(defaults.max_audio_duration),
            log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }

    pub fn max_download_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn parse_number<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw))
        })
        .transpose()
}

/// Build every stage adapter once and wire them into a pipeline
pub fn build_pipeline(config: &AppConfig) -> Result<Pipeline> {
    let transcriber = WhisperTranscriber::new(TranscriberConfig {
        api_key: config.openai_api_key.clone(),
        base_url: config.openai_base_url.clone(),
        model: config.transcription_model.clone(),
        download_timeout: config.download_timeout,
        max_download_bytes: config.max_download_bytes(),
        ..Default::default()
    })
    .context("Failed to create transcription client")?;

    let openai = |temperature: f64, max_tokens: u32, timeout_secs: u64| {
        let chat = ChatConfig::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
            config.medical_model.clone(),
        )
        .with_sampling(temperature, max_tokens)
        .with_timeout(Duration::from_secs(timeout_secs));
        ChatClient::new("OpenAI", chat)
    };

    let extractor = LlmExtractor::new(
        openai(0.1, 1000, 30).context("Failed to create extraction client")?,
    );
    let diagnosis = LlmDiagnosisGenerator::new(
        openai(0.2, 2000, 45).context("Failed to create diagnosis client")?,
    );

    let perplexity = ChatConfig::new(
        config.perplexity_api_key.clone(),
        config.perplexity_base_url.clone(),
        config.perplexity_model.clone(),
    )
    .with_sampling(0.0, 4000)
    .with_timeout(Duration::from_secs(45));
    let treatment = PerplexityTreatmentRecommender::new(
        ChatClient::new("Perplexity", perplexity).context("Failed to create treatment client")?,
    );

    info!(
        "Pipeline ready: chat model {}, transcription model {}, treatment model {}",
        config.medical_model, config.transcription_model, config.perplexity_model
    );
    Ok(Pipeline::new(
        Arc::new(transcriber),
        Arc::new(extractor),
        Arc::new(diagnosis),
        Arc::new(treatment),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.max_download_bytes(), 50 * 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MEDICAL_MODEL", "gpt-4o"),
            ("DOWNLOAD_TIMEOUT", "10"),
            ("MAX_FILE_SIZE_MB", " 5 "),
            ("MAX_AUDIO_DURATION", "600"),
            ("PERPLEXITY_MODEL", ""),
        ]))
        .unwrap();

        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.medical_model, "gpt-4o");
        assert_eq!(config.download_timeout, Duration::from_secs(10));
        assert_eq!(config.max_file_size_mb, 5);
        assert_eq!(config.max_audio_duration, 600);
        assert_eq!(config.perplexity_model, "sonar");
    }

    #[test]
    fn test_bad_number_is_error() {
        let err = AppConfig::from_lookup(lookup(&[("MAX_FILE_SIZE_MB", "fifty")])).unwrap_err();
        assert!(err.to_string().contains("MAX_FILE_SIZE_MB"));
    }

    #[test]
    fn test_pipeline_without_keys_is_degraded() {
        let pipeline = build_pipeline(&AppConfig::default()).unwrap();
        let health = pipeline.health();
        assert_eq!(health.status, "degraded");
        assert!(!health.transcriber_ready);
        assert!(!health.treatment_ready);
    }

    #[test]
    fn test_pipeline_with_keys_is_healthy() {
        let config = AppConfig {
            openai_api_key: "sk-test".to_string(),
            perplexity_api_key: "pplx-test".to_string(),
            ..Default::default()
        };
        assert_eq!(build_pipeline(&config).unwrap().health().status, "healthy");
    }
}
