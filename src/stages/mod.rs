//! Stage adapters: one capability per pipeline stage, each wrapping a
//! single remote call.

pub mod diagnosis;
pub mod extraction;
pub mod transcription;
pub mod treatment;

pub use diagnosis::*;
pub use extraction::*;
pub use transcription::*;
pub use treatment::*;

use async_trait::async_trait;

use crate::error::PipelineResult;
use crate::models::{
    AudioInput, Diagnosis, ExtractionResult, PipelineOptions, Transcription, TreatmentPlan,
};

/// Speech-to-text
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioInput) -> PipelineResult<Transcription>;

    /// Credentials present
    fn is_ready(&self) -> bool;
}

/// Free text to structured medical information
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, text: &str) -> PipelineResult<ExtractionResult>;

    fn is_ready(&self) -> bool;
}

/// Ranked ICD-10 diagnoses, most confident first
#[async_trait]
pub trait DiagnosisGenerator: Send + Sync {
    async fn generate(
        &self,
        extraction: &ExtractionResult,
        options: &PipelineOptions,
    ) -> PipelineResult<Vec<Diagnosis>>;

    fn is_ready(&self) -> bool;
}

/// Evidence-based treatment plan for one diagnosis
#[async_trait]
pub trait TreatmentRecommender: Send + Sync {
    async fn recommend(
        &self,
        diagnosis: &Diagnosis,
        patient_age: Option<u8>,
        patient_gender: Option<&str>,
    ) -> PipelineResult<TreatmentPlan>;

    fn is_ready(&self) -> bool;
}
