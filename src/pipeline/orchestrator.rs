use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    AudioInput, DiagnosisBundle, ExtractionResult, PipelineOptions, PipelineRun, StageName,
    StagePayload,
};
use crate::stages::{DiagnosisGenerator, Extractor, Transcriber, TreatmentRecommender};

/// What the caller handed in; determines the first stage that runs
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineInput {
    /// Starts at transcription
    Audio(AudioInput),
    /// Starts at extraction
    Text(String),
    /// Starts at diagnosis
    Extraction(ExtractionResult),
}

/// Notified synchronously before each stage starts
pub trait StageObserver: Sync {
    fn on_stage_start(&self, stage: StageName);
}

impl<F: Fn(StageName) + Sync> StageObserver for F {
    fn on_stage_start(&self, stage: StageName) {
        self(stage)
    }
}

/// Adapter readiness for health reporting
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub transcriber_ready: bool,
    pub extractor_ready: bool,
    pub diagnosis_ready: bool,
    pub treatment_ready: bool,
    pub timestamp: DateTime<Utc>,
}

/// Sequences the stage adapters for one request at a time.
///
/// Stages run strictly in order and the first failure ends the run. The
/// adapters are shared read-only, so one `Pipeline` can serve concurrent
/// runs.
#[derive(Clone)]
pub struct Pipeline {
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn Extractor>,
    diagnosis: Arc<dyn DiagnosisGenerator>,
    treatment: Arc<dyn TreatmentRecommender>,
}

impl Pipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn Extractor>,
        diagnosis: Arc<dyn DiagnosisGenerator>,
        treatment: Arc<dyn TreatmentRecommender>,
    ) -> Self {
        Self {
            transcriber,
            extractor,
            diagnosis,
            treatment,
        }
    }

    pub fn health(&self) -> HealthReport {
        let transcriber_ready = self.transcriber.is_ready();
        let extractor_ready = self.extractor.is_ready();
        let diagnosis_ready = self.diagnosis.is_ready();
        let treatment_ready = self.treatment.is_ready();
        let all_ready = transcriber_ready && extractor_ready && diagnosis_ready && treatment_ready;

        HealthReport {
            status: if all_ready { "healthy" } else { "degraded" },
            transcriber_ready,
            extractor_ready,
            diagnosis_ready,
            treatment_ready,
            timestamp: Utc::now(),
        }
    }

    /// Execute every applicable stage for `input`
    pub async fn run(
        &self,
        input: PipelineInput,
        options: &PipelineOptions,
        observer: Option<&dyn StageObserver>,
    ) -> PipelineRun {
        let started = Instant::now();
        let mut run = PipelineRun::new();
        info!("Run {} started", run.run_id);

        self.execute(input, options, observer, &mut run).await;

        run.elapsed = started.elapsed();
        match run.failed_stage {
            Some(stage) => warn!(
                "Run {} failed at {} after {:.2}s (partial: {})",
                run.run_id,
                stage,
                run.elapsed.as_secs_f64(),
                run.partial
            ),
            None => info!(
                "Run {} completed in {:.2}s",
                run.run_id,
                run.elapsed.as_secs_f64()
            ),
        }
        run
    }

    async fn execute(
        &self,
        input: PipelineInput,
        options: &PipelineOptions,
        observer: Option<&dyn StageObserver>,
        run: &mut PipelineRun,
    ) {
        let notify = |stage: StageName| {
            if let Some(observer) = observer {
                observer.on_stage_start(stage);
            }
        };

        let extraction = match input {
            PipelineInput::Extraction(extraction) => extraction,
            PipelineInput::Text(text) => {
                notify(StageName::Extraction);
                match self.extract(&text, run).await {
                    Some(extraction) => extraction,
                    None => return,
                }
            }
            PipelineInput::Audio(audio) => {
                notify(StageName::Transcription);
                info!("Stage transcription: {}", audio.audio_url);
                let text = match self.transcriber.transcribe(&audio).await {
                    Ok(transcription) => {
                        let text = transcription
                            .has_text()
                            .then(|| transcription.transcription.clone());
                        run.record_success(
                            StageName::Transcription,
                            StagePayload::Transcription(transcription),
                        );
                        text
                    }
                    Err(e) => {
                        run.record_failure(StageName::Transcription, &e);
                        return;
                    }
                };
                let Some(text) = text else {
                    info!("Transcription is empty, stopping after transcription");
                    return;
                };

                notify(StageName::Extraction);
                match self.extract(&text, run).await {
                    Some(extraction) => extraction,
                    None => return,
                }
            }
        };

        notify(StageName::Diagnosis);
        match self.diagnose(&extraction, options).await {
            Ok(bundle) => run.record_success(StageName::Diagnosis, StagePayload::Diagnosis(bundle)),
            Err(e) => run.record_failure(StageName::Diagnosis, &e),
        }
    }

    /// Returns `None` once the failure has been recorded
    async fn extract(&self, text: &str, run: &mut PipelineRun) -> Option<ExtractionResult> {
        info!("Stage extraction: {} chars", text.len());
        match self.extractor.extract(text).await {
            Ok(extraction) => {
                run.record_success(
                    StageName::Extraction,
                    StagePayload::Extraction(extraction.clone()),
                );
                Some(extraction)
            }
            Err(e) => {
                run.record_failure(StageName::Extraction, &e);
                None
            }
        }
    }

    /// Compound stage: diagnoses, then a treatment plan for the primary one.
    /// A treatment failure fails the whole stage.
    async fn diagnose(
        &self,
        extraction: &ExtractionResult,
        options: &PipelineOptions,
    ) -> PipelineResult<DiagnosisBundle> {
        info!("Stage diagnosis: {} symptoms", extraction.symptoms.len());
        let mut diagnoses = self
            .diagnosis
            .generate(extraction, options)
            .await?
            .into_iter();

        let primary = diagnoses.next().ok_or_else(|| {
            PipelineError::UpstreamSchemaViolation(
                "no diagnoses could be generated from the provided medical information".to_string(),
            )
        })?;
        let differential = if options.include_differential {
            diagnoses.filter(|d| !d.same_condition(&primary)).collect()
        } else {
            Vec::new()
        };
        info!(
            "Primary diagnosis: {} ({})",
            primary.diagnosis_name, primary.icd_10_code.code
        );

        let patient = &extraction.patient_info;
        let plan = self
            .treatment
            .recommend(&primary, patient.age, patient.gender.as_deref())
            .await?;

        Ok(DiagnosisBundle {
            primary_diagnosis: primary,
            differential_diagnoses: differential,
            treatment_plan: plan.items,
            evidence_citations: plan.citations,
        })
    }
}
