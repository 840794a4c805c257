use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ErrorKind, PipelineError};
use crate::models::{PipelineRun, StageOutcome};

/// Caller-visible error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

/// Uniform response wrapper: `{success, result, error, metadata}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<ErrorBody>,
    pub metadata: Map<String, Value>,
    #[serde(skip)]
    kind: Option<ErrorKind>,
}

impl Envelope {
    /// Failure envelope for errors raised before any stage ran
    pub fn from_error(err: &PipelineError) -> Self {
        let mut metadata = Map::new();
        metadata.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
        metadata.insert("run_id".into(), json!(uuid::Uuid::new_v4()));

        Self::failure(err.to_string(), err.kind(), metadata)
    }

    fn failure(message: String, kind: ErrorKind, metadata: Map<String, Value>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(ErrorBody {
                message,
                code: kind.code().to_string(),
            }),
            metadata,
            kind: Some(kind),
        }
    }

    pub fn status_code(&self) -> u16 {
        if self.success {
            return 200;
        }
        self.kind.unwrap_or(ErrorKind::Internal).status_code()
    }
}

/// Project a finished run into its envelope. Never fails: every run state,
/// including an inconsistent one, yields a well-formed envelope.
pub fn build_envelope(run: &PipelineRun) -> Envelope {
    let mut metadata = Map::new();
    metadata.insert("timestamp".into(), json!(run.started_at.to_rfc3339()));
    metadata.insert("run_id".into(), json!(run.run_id));
    metadata.insert(
        "processing_time_seconds".into(),
        json!(round2(run.elapsed.as_secs_f64())),
    );

    if let Some(transcription) = run.transcription() {
        metadata.insert(
            "transcription_duration_seconds".into(),
            json!(transcription.duration_seconds),
        );
    }
    if let Some(extraction) = run.extraction() {
        metadata.insert("symptoms_found".into(), json!(extraction.symptoms.len()));
    }
    if let Some(bundle) = run.diagnosis() {
        metadata.insert("diagnoses_generated".into(), json!(bundle.diagnosis_count()));
        metadata.insert(
            "treatment_recommendations".into(),
            json!(bundle.treatment_plan.len()),
        );
        metadata.insert(
            "evidence_citations".into(),
            json!(bundle.evidence_citations.len()),
        );
        metadata.insert(
            "primary_diagnosis_confidence".into(),
            json!(bundle.primary_diagnosis.confidence_score),
        );
        metadata.insert(
            "icd_10_code".into(),
            json!(bundle.primary_diagnosis.icd_10_code.code),
        );
    }

    let completed = completed_results(run);
    if run.is_success() {
        return Envelope {
            success: true,
            result: Some(Value::Object(completed)),
            error: None,
            metadata,
            kind: None,
        };
    }

    let (message, kind) = match run
        .failed_stage
        .and_then(|stage| run.outcomes.get(&stage))
    {
        Some(StageOutcome::Failure { message, kind }) => (message.clone(), *kind),
        _ => (
            "run failed without a recorded stage failure".to_string(),
            ErrorKind::Internal,
        ),
    };

    if let Some(stage) = run.failed_stage {
        metadata.insert("failed_stage".into(), json!(stage));
    }
    metadata.insert("partial".into(), json!(run.partial));
    metadata.insert("partial_results".into(), Value::Object(completed));

    Envelope::failure(message, kind, metadata)
}

fn completed_results(run: &PipelineRun) -> Map<String, Value> {
    run.completed()
        .map(|(stage, payload)| {
            let value = serde_json::to_value(payload).unwrap_or(Value::Null);
            (stage.as_str().to_string(), value)
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Diagnosis, DiagnosisBundle, ExtractionResult, IcdCode, PatientInfo, Priority,
        RunStatus, StageName, StagePayload, Symptom, TreatmentItem,
    };
    use std::time::Duration;

    fn extraction() -> ExtractionResult {
        ExtractionResult {
            patient_info: PatientInfo {
                age: Some(58),
                ..Default::default()
            },
            symptoms: vec![Symptom::new("chest pain"), Symptom::new("sweating")],
            reason_for_consultation: "chest pain".to_string(),
            additional_notes: None,
        }
    }

    fn bundle() -> DiagnosisBundle {
        DiagnosisBundle {
            primary_diagnosis: Diagnosis {
                diagnosis_name: "Acute myocardial infarction".to_string(),
                icd_10_code: IcdCode {
                    code: "I21.9".to_string(),
                    description: "Acute myocardial infarction, unspecified".to_string(),
                    category: "Ischemic heart diseases".to_string(),
                },
                confidence_score: 0.82,
                reasoning: "classic presentation".to_string(),
                supporting_symptoms: vec!["chest pain".to_string()],
            },
            differential_diagnoses: vec![],
            treatment_plan: vec![TreatmentItem {
                category: "clinical".to_string(),
                recommendation: "Aspirin 325 mg chewed".to_string(),
                priority: Priority::High,
                duration: None,
                notes: None,
            }],
            evidence_citations: vec!["https://www.ahajournals.org".to_string()],
        }
    }

    fn successful_run() -> PipelineRun {
        let mut run = PipelineRun::new();
        run.record_success(StageName::Extraction, StagePayload::Extraction(extraction()));
        run.record_success(StageName::Diagnosis, StagePayload::Diagnosis(bundle()));
        run.elapsed = Duration::from_millis(3456);
        run
    }

    #[test]
    fn test_success_envelope() {
        let envelope = build_envelope(&successful_run());

        assert!(envelope.success);
        assert!(envelope.error.is_none());
        assert_eq!(envelope.status_code(), 200);

        let result = envelope.result.as_ref().unwrap();
        assert_eq!(result["extraction"]["symptoms"].as_array().unwrap().len(), 2);
        assert_eq!(
            result["diagnosis"]["primary_diagnosis"]["icd_10_code"]["code"],
            "I21.9"
        );

        let metadata = &envelope.metadata;
        assert_eq!(metadata["processing_time_seconds"], json!(3.46));
        assert_eq!(metadata["symptoms_found"], json!(2));
        assert_eq!(metadata["diagnoses_generated"], json!(1));
        assert_eq!(metadata["treatment_recommendations"], json!(1));
        assert_eq!(metadata["evidence_citations"], json!(1));
        assert_eq!(metadata["primary_diagnosis_confidence"], json!(0.82));
        assert_eq!(metadata["icd_10_code"], json!("I21.9"));
        assert!(metadata.contains_key("timestamp"));
        assert!(!metadata.contains_key("partial_results"));
    }

    #[test]
    fn test_first_stage_failure() {
        let mut run = PipelineRun::new();
        run.record_failure(
            StageName::Transcription,
            &PipelineError::UnsupportedMediaType("text/html".to_string()),
        );

        let envelope = build_envelope(&run);

        assert!(!envelope.success);
        assert!(envelope.result.is_none());
        assert_eq!(envelope.error.as_ref().unwrap().code, "invalid_content_type");
        assert_eq!(envelope.status_code(), 415);
        assert_eq!(envelope.metadata["failed_stage"], json!("transcription"));
        assert_eq!(envelope.metadata["partial"], json!(false));
        assert_eq!(envelope.metadata["partial_results"], json!({}));
    }

    #[test]
    fn test_partial_failure_carries_completed_stages() {
        let mut run = PipelineRun::new();
        run.record_success(StageName::Extraction, StagePayload::Extraction(extraction()));
        run.record_failure(
            StageName::Diagnosis,
            &PipelineError::UpstreamFormat("no JSON".to_string()),
        );

        let envelope = build_envelope(&run);
        let partial = envelope.metadata["partial_results"].as_object().unwrap();

        assert_eq!(partial.keys().collect::<Vec<_>>(), vec!["extraction"]);
        assert_eq!(envelope.metadata["partial"], json!(true));
        assert_eq!(envelope.metadata["symptoms_found"], json!(2));
        assert_eq!(envelope.error.as_ref().unwrap().code, "upstream_format_error");
        assert_eq!(envelope.status_code(), 400);
    }

    #[test]
    fn test_inconsistent_run_is_internal_error() {
        let mut run = PipelineRun::new();
        run.status = RunStatus::Failed;

        let envelope = build_envelope(&run);

        assert!(!envelope.success);
        assert_eq!(envelope.error.as_ref().unwrap().code, "internal_error");
        assert_eq!(envelope.status_code(), 500);
    }

    #[test]
    fn test_build_is_idempotent() {
        let run = successful_run();
        assert_eq!(build_envelope(&run), build_envelope(&run));
    }

    #[test]
    fn test_from_validation_error() {
        let envelope = Envelope::from_error(&PipelineError::validation("text", "too short"));

        assert_eq!(envelope.status_code(), 400);
        assert_eq!(envelope.error.as_ref().unwrap().code, "validation_error");

        let wire = serde_json::to_value(&envelope).unwrap();
        assert_eq!(wire["result"], Value::Null);
        assert!(wire["metadata"]["timestamp"].is_string());
        assert!(wire.get("kind").is_none());
    }
}
