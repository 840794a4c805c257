use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DiagnosisBundle, ExtractionResult, Transcription};
use crate::error::{ErrorKind, PipelineError};

/// Pipeline stages, declared in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageName {
    Transcription,
    Extraction,
    Diagnosis,
}

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Transcription => "transcription",
            StageName::Extraction => "extraction",
            StageName::Diagnosis => "diagnosis",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a successful stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StagePayload {
    Transcription(Transcription),
    Extraction(ExtractionResult),
    Diagnosis(DiagnosisBundle),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Success(StagePayload),
    Failure { message: String, kind: ErrorKind },
}

impl StageOutcome {
    pub fn failure(err: &PipelineError) -> Self {
        StageOutcome::Failure {
            message: err.to_string(),
            kind: err.kind(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Success(_))
    }

    pub fn payload(&self) -> Option<&StagePayload> {
        match self {
            StageOutcome::Success(payload) => Some(payload),
            StageOutcome::Failure { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Caller-tunable options for the diagnosis stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub include_differential: bool,
    /// 1-5
    pub max_diagnoses: u8,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            include_differential: true,
            max_diagnoses: 3,
        }
    }
}

/// Record of a single request's pass through the pipeline.
///
/// Created per request and dropped once the envelope is built.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub run_id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Keyed by stage; iteration follows pipeline order
    pub outcomes: BTreeMap<StageName, StageOutcome>,
    pub status: RunStatus,
    pub failed_stage: Option<StageName>,
    /// True iff a stage succeeded before a later one failed
    pub partial: bool,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            outcomes: BTreeMap::new(),
            status: RunStatus::Succeeded,
            failed_stage: None,
            partial: false,
        }
    }

    pub fn record_success(&mut self, stage: StageName, payload: StagePayload) {
        self.outcomes.insert(stage, StageOutcome::Success(payload));
    }

    /// Record a terminal failure; no further stage may be recorded after this
    pub fn record_failure(&mut self, stage: StageName, err: &PipelineError) {
        self.partial = self.outcomes.values().any(StageOutcome::is_success);
        self.outcomes.insert(stage, StageOutcome::failure(err));
        self.status = RunStatus::Failed;
        self.failed_stage = Some(stage);
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// Payloads of every stage that completed successfully
    pub fn completed(&self) -> impl Iterator<Item = (StageName, &StagePayload)> {
        self.outcomes
            .iter()
            .filter_map(|(stage, outcome)| outcome.payload().map(|p| (*stage, p)))
    }

    pub fn transcription(&self) -> Option<&Transcription> {
        match self.outcomes.get(&StageName::Transcription)?.payload()? {
            StagePayload::Transcription(t) => Some(t),
            _ => None,
        }
    }

    pub fn extraction(&self) -> Option<&ExtractionResult> {
        match self.outcomes.get(&StageName::Extraction)?.payload()? {
            StagePayload::Extraction(e) => Some(e),
            _ => None,
        }
    }

    pub fn diagnosis(&self) -> Option<&DiagnosisBundle> {
        match self.outcomes.get(&StageName::Diagnosis)?.payload()? {
            StagePayload::Diagnosis(d) => Some(d),
            _ => None,
        }
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
