use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{AudioInput, ExtractionResult, PipelineOptions};
use crate::pipeline::PipelineInput;

/// Languages accepted for transcription hints
pub const SUPPORTED_LANGUAGES: [&str; 5] = ["spanish", "english", "french", "german", "italian"];

pub const MIN_TEXT_CHARS: usize = 10;
pub const MAX_AUDIO_DURATION_LIMIT: u32 = 1800;
pub const MAX_DIAGNOSES_LIMIT: u8 = 5;
const MAX_PATIENT_AGE: u8 = 150;

/// Inbound request accepted by the CLI. Exactly one input is used:
/// audio, then text, then already-extracted medical information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineRequest {
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub max_duration: Option<u32>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub medical_info: Option<ExtractionResult>,
    #[serde(default)]
    pub include_differential: Option<bool>,
    #[serde(default)]
    pub max_diagnoses: Option<u8>,
}

impl PipelineRequest {
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PipelineError::validation("body", format!("malformed request: {}", e)))
    }

    pub fn from_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::validation("input", format!("failed to read {:?}: {}", path, e))
        })?;
        Self::from_json(&content)
    }

    /// Check every field and pick the pipeline input.
    /// `default_max_duration` applies when the request omits `max_duration`.
    pub fn validate(
        self,
        default_max_duration: u32,
    ) -> PipelineResult<(PipelineInput, PipelineOptions)> {
        let options = self.options()?;

        if let Some(audio_url) = self.audio_url {
            let audio_url = audio_url.trim().to_string();
            if !(audio_url.starts_with("http://") || audio_url.starts_with("https://")) {
                return Err(PipelineError::validation(
                    "audio_url",
                    "must be an http(s) URL",
                ));
            }

            let language = self
                .language
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty());
            if let Some(language) = &language {
                if !SUPPORTED_LANGUAGES.contains(&language.as_str()) {
                    return Err(PipelineError::validation(
                        "language",
                        format!(
                            "unsupported language {:?}, expected one of {}",
                            language,
                            SUPPORTED_LANGUAGES.join(", ")
                        ),
                    ));
                }
            }

            let max_duration = self.max_duration.unwrap_or(default_max_duration);
            if !(1..=MAX_AUDIO_DURATION_LIMIT).contains(&max_duration) {
                return Err(PipelineError::validation(
                    "max_duration",
                    format!("must be between 1 and {} seconds", MAX_AUDIO_DURATION_LIMIT),
                ));
            }

            let audio = AudioInput {
                audio_url,
                language,
                max_duration,
            };
            return Ok((PipelineInput::Audio(audio), options));
        }

        if let Some(text) = self.text {
            if text.trim().chars().count() < MIN_TEXT_CHARS {
                return Err(PipelineError::validation(
                    "text",
                    format!("must be at least {} characters", MIN_TEXT_CHARS),
                ));
            }
            return Ok((PipelineInput::Text(text), options));
        }

        if let Some(info) = self.medical_info {
            if info.patient_info.age.is_some_and(|age| age > MAX_PATIENT_AGE) {
                return Err(PipelineError::validation(
                    "medical_info.patient_info.age",
                    format!("must be between 0 and {}", MAX_PATIENT_AGE),
                ));
            }
            if let Some(i) = info.symptoms.iter().position(|s| s.symptom.trim().is_empty()) {
                return Err(PipelineError::validation(
                    format!("medical_info.symptoms[{}].symptom", i),
                    "must not be empty",
                ));
            }
            return Ok((PipelineInput::Extraction(info), options));
        }

        Err(PipelineError::validation(
            "text",
            "one of audio_url, text or medical_info is required",
        ))
    }

    fn options(&self) -> PipelineResult<PipelineOptions> {
        let defaults = PipelineOptions::default();
        let max_diagnoses = self.max_diagnoses.unwrap_or(defaults.max_diagnoses);
        if !(1..=MAX_DIAGNOSES_LIMIT).contains(&max_diagnoses) {
            return Err(PipelineError::validation(
                "max_diagnoses",
                format!("must be between 1 and {}", MAX_DIAGNOSES_LIMIT),
            ));
        }

        Ok(PipelineOptions {
            include_differential: self
                .include_differential
                .unwrap_or(defaults.include_differential),
            max_diagnoses,
        })
    }
}
