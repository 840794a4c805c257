use std::io::Write;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, error, info};

use super::Transcriber;
use crate::error::{PipelineError, PipelineResult};
use crate::llm::OPENAI_BASE_URL;
use crate::models::{AudioInput, Transcription};

const DOWNLOAD_USER_AGENT: &str = "Mozilla/5.0 (compatible; medscribe/0.1)";

/// Configuration for the Whisper transcription adapter
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    pub api_key: String,
    pub base_url: String,
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
    /// Bound on the transcription call
    pub timeout: Duration,
    /// Bound on the audio download
    pub download_timeout: Duration,
    pub max_download_bytes: u64,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(60),
            download_timeout: Duration::from_secs(30),
            max_download_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Audio fetched for one transcription call.
///
/// The backing file is deleted when this value is dropped.
pub struct DownloadedAudio {
    file: NamedTempFile,
    pub content_type: String,
    pub file_name: String,
}

impl DownloadedAudio {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Transcription through an OpenAI Whisper-compatible endpoint
pub struct WhisperTranscriber {
    client: Client,
    config: TranscriberConfig,
}

impl WhisperTranscriber {
    pub fn new(config: TranscriberConfig) -> PipelineResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PipelineError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Download the audio into a temporary file, enforcing the size limit
    pub async fn download(&self, url: &str) -> PipelineResult<DownloadedAudio> {
        info!("Downloading audio: {}", url);
        let limit = self.config.max_download_bytes;

        let mut response = self
            .client
            .get(url)
            .header(USER_AGENT, DOWNLOAD_USER_AGENT)
            .timeout(self.config.download_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::UpstreamUnavailable(format!(
                "audio download failed: {}",
                status
            )));
        }

        let declared_len = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared_len.is_some_and(|len| len > limit) {
            return Err(PipelineError::PayloadTooLarge(format!(
                "audio file exceeds {} bytes",
                limit
            )));
        }

        let header_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());
        let content_type = match header_type {
            Some(ct) if ct.starts_with("audio/") || ct.starts_with("video/") => ct,
            Some(ct) if ct == "application/octet-stream" => guess_content_type(url).to_string(),
            None => guess_content_type(url).to_string(),
            Some(ct) => {
                return Err(PipelineError::UnsupportedMediaType(format!(
                    "expected audio, got {}",
                    ct
                )));
            }
        };

        let mut file = tempfile::Builder::new()
            .prefix("medscribe-audio-")
            .tempfile()
            .map_err(|e| PipelineError::Internal(format!("failed to create temp file: {}", e)))?;

        let mut downloaded: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            downloaded += chunk.len() as u64;
            if downloaded > limit {
                return Err(PipelineError::PayloadTooLarge(format!(
                    "audio file exceeds {} bytes during download",
                    limit
                )));
            }
            file.write_all(&chunk)
                .map_err(|e| PipelineError::Internal(format!("failed to buffer audio: {}", e)))?;
        }
        file.flush()
            .map_err(|e| PipelineError::Internal(format!("failed to buffer audio: {}", e)))?;

        debug!("Downloaded {} bytes to {:?}", downloaded, file.path());
        Ok(DownloadedAudio {
            file,
            content_type,
            file_name: file_name_from_url(url),
        })
    }

    async fn send_for_transcription(
        &self,
        audio: &DownloadedAudio,
        language: Option<&str>,
    ) -> PipelineResult<WhisperResponse> {
        let bytes = tokio::fs::read(audio.path())
            .await
            .map_err(|e| PipelineError::Internal(format!("failed to read audio: {}", e)))?;

        let part = Part::bytes(bytes)
            .file_name(audio.file_name.clone())
            .mime_str(&audio.content_type)
            .map_err(|e| PipelineError::Internal(format!("invalid content type: {}", e)))?;
        let mut form = Form::new()
            .part("file", part)
            .text("model", self.config.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = language {
            form = form.text("language", language_code(language));
        }

        let url = format!(
            "{}/audio/transcriptions",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        info!("Transcription API response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Transcription API error: {} - {}", status, body);
            return Err(PipelineError::UpstreamUnavailable(format!(
                "transcription API error: {} - {}",
                status, body
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            PipelineError::UpstreamSchemaViolation(format!("unexpected transcription body: {}", e))
        })
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &AudioInput) -> PipelineResult<Transcription> {
        if !self.is_ready() {
            return Err(PipelineError::UpstreamUnavailable(
                "OpenAI API key not configured".to_string(),
            ));
        }

        let downloaded = self.download(&audio.audio_url).await?;
        let response = self
            .send_for_transcription(&downloaded, audio.language.as_deref())
            .await?;
        drop(downloaded);

        let text = response.text.ok_or_else(|| {
            PipelineError::UpstreamSchemaViolation("missing required field `text`".to_string())
        })?;
        let duration = response.duration.unwrap_or(0.0);
        if duration > audio.max_duration as f64 {
            return Err(PipelineError::validation(
                "max_duration",
                format!(
                    "audio lasts {:.0}s, longer than the {}s maximum",
                    duration, audio.max_duration
                ),
            ));
        }

        info!("Transcription completed: {:.1}s of audio", duration);
        Ok(Transcription {
            transcription: text,
            duration_seconds: duration,
            language_detected: audio
                .language
                .clone()
                .or(response.language)
                .unwrap_or_else(|| "auto".to_string()),
            model_used: format!("openai-{}", self.config.model),
        })
    }

    fn is_ready(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: Option<String>,
    duration: Option<f64>,
    language: Option<String>,
}

/// ISO 639-1 code for a language name
fn language_code(language: &str) -> String {
    let lower = language.trim().to_lowercase();
    match lower.as_str() {
        "spanish" => "es".to_string(),
        "english" => "en".to_string(),
        "french" => "fr".to_string(),
        "german" => "de".to_string(),
        "italian" => "it".to_string(),
        other => other.chars().take(2).collect(),
    }
}

fn file_name_from_url(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|u| u.rsplit('/').next())
        .filter(|name| !name.is_empty() && name.contains('.'))
        .unwrap_or("audio.mp3")
        .to_string()
}

fn guess_content_type(url: &str) -> &'static str {
    let name = file_name_from_url(url).to_lowercase();
    match name.rsplit('.').next().unwrap_or("") {
        "wav" => "audio/wav",
        "mp4" => "audio/mp4",
        "m4a" => "audio/m4a",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "webm" => "audio/webm",
        _ => "audio/mpeg",
    }
}
