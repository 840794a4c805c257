use serde::{Deserialize, Serialize};

/// Default cap on audio length in seconds
pub const DEFAULT_MAX_DURATION_SECS: u32 = 300;

/// Reference to remote audio to transcribe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInput {
    pub audio_url: String,
    /// Language name (e.g. "spanish"); auto-detected when absent
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default = "default_max_duration")]
    pub max_duration: u32,
}

fn default_max_duration() -> u32 {
    DEFAULT_MAX_DURATION_SECS
}

impl AudioInput {
    pub fn new(audio_url: impl Into<String>) -> Self {
        Self {
            audio_url: audio_url.into(),
            language: None,
            max_duration: DEFAULT_MAX_DURATION_SECS,
        }
    }
}

/// Result of the transcription stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub transcription: String,
    pub duration_seconds: f64,
    pub language_detected: String,
    pub model_used: String,
}

impl Transcription {
    pub fn has_text(&self) -> bool {
        !self.transcription.trim().is_empty()
    }
}
