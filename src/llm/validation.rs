//! Validation of provider-shaped model output into domain types.
//!
//! Wire structs accept anything loosely typed and ignore unknown fields;
//! the conversion functions enforce the fields the domain requires.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::normalizer::{normalize, normalize_value};
use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    Diagnosis, ExtractionResult, IcdCode, PatientInfo, Priority, Severity, Symptom, TreatmentItem,
};

/// Category given to pathway steps that do not name their own
pub const DEFAULT_TREATMENT_CATEGORY: &str = "clinical";

const MAX_PATIENT_AGE: f64 = 150.0;

fn required<T>(value: Option<T>, field: &str) -> PipelineResult<T> {
    value.ok_or_else(|| {
        PipelineError::UpstreamSchemaViolation(format!("missing required field `{}`", field))
    })
}

fn required_text(value: Option<String>, field: &str) -> PipelineResult<String> {
    let text = required(value, field)?;
    if text.trim().is_empty() {
        return Err(PipelineError::UpstreamSchemaViolation(format!(
            "required field `{}` is empty",
            field
        )));
    }
    Ok(text)
}

/// Models often spell absent values as "null" or "unknown"
fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|v| {
        let v = v.trim();
        !v.is_empty() && !v.eq_ignore_ascii_case("null") && !v.eq_ignore_ascii_case("unknown")
    })
}

#[derive(Debug, Default, Deserialize)]
struct PatientWire {
    name: Option<String>,
    age: Option<f64>,
    identification_number: Option<String>,
    gender: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SymptomWire {
    symptom: Option<String>,
    duration: Option<String>,
    severity: Option<String>,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExtractionWire {
    patient_info: Option<PatientWire>,
    symptoms: Option<Vec<SymptomWire>>,
    reason_for_consultation: Option<String>,
    additional_notes: Option<String>,
}

/// Parse extraction-model text into an [`ExtractionResult`]
pub fn parse_extraction(content: &str) -> PipelineResult<ExtractionResult> {
    let wire: ExtractionWire = normalize(content)?;
    let patient = wire.patient_info.unwrap_or_default();

    let age = match patient.age {
        Some(age) if !(0.0..=MAX_PATIENT_AGE).contains(&age) => {
            return Err(PipelineError::UpstreamSchemaViolation(format!(
                "patient age {} outside 0-150",
                age
            )));
        }
        Some(age) => Some(age.round() as u8),
        None => None,
    };

    let symptoms = wire
        .symptoms
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, s)| -> PipelineResult<Symptom> {
            let severity = optional_text(s.severity).and_then(|label| {
                let parsed = Severity::parse(&label);
                if parsed.is_none() {
                    warn!("Ignoring unknown severity '{}' on symptom {}", label, i);
                }
                parsed
            });
            Ok(Symptom {
                symptom: required_text(s.symptom, &format!("symptoms[{}].symptom", i))?,
                duration: optional_text(s.duration),
                severity,
                location: optional_text(s.location),
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    Ok(ExtractionResult {
        patient_info: PatientInfo {
            name: optional_text(patient.name),
            age,
            identification_number: optional_text(patient.identification_number),
            gender: optional_text(patient.gender),
        },
        symptoms,
        reason_for_consultation: required_text(
            wire.reason_for_consultation,
            "reason_for_consultation",
        )?,
        additional_notes: optional_text(wire.additional_notes),
    })
}

#[derive(Debug, Deserialize)]
struct IcdWire {
    code: Option<String>,
    description: Option<String>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiagnosisWire {
    diagnosis_name: Option<String>,
    icd_10_code: Option<IcdWire>,
    confidence_score: Option<f64>,
    reasoning: Option<String>,
    supporting_symptoms: Option<Vec<String>>,
}

impl DiagnosisWire {
    fn into_domain(self, index: usize) -> PipelineResult<Diagnosis> {
        let field = |name: &str| format!("diagnoses[{}].{}", index, name);
        let icd = required(self.icd_10_code, &field("icd_10_code"))?;

        let confidence = required(self.confidence_score, &field("confidence_score"))?;
        if !confidence.is_finite() {
            return Err(PipelineError::UpstreamSchemaViolation(format!(
                "{} is not a number",
                field("confidence_score")
            )));
        }
        let clamped = confidence.clamp(0.0, 1.0);
        if clamped != confidence {
            warn!("Clamped confidence {} to {} on diagnosis {}", confidence, clamped, index);
        }

        Ok(Diagnosis {
            diagnosis_name: required_text(self.diagnosis_name, &field("diagnosis_name"))?,
            icd_10_code: IcdCode {
                code: required_text(icd.code, &field("icd_10_code.code"))?,
                description: required_text(icd.description, &field("icd_10_code.description"))?,
                category: required_text(icd.category, &field("icd_10_code.category"))?,
            },
            confidence_score: clamped,
            reasoning: required_text(self.reasoning, &field("reasoning"))?,
            supporting_symptoms: self.supporting_symptoms.unwrap_or_default(),
        })
    }
}

/// Parse diagnosis-model text into a ranked diagnosis list.
///
/// The list is sorted by descending confidence, repeated ICD-10 codes are
/// dropped (keeping the most confident), it is truncated to `max`, and each
/// diagnosis' supporting symptoms follow the extraction's symptom order.
pub fn parse_diagnoses(
    content: &str,
    extraction: &ExtractionResult,
    max: usize,
) -> PipelineResult<Vec<Diagnosis>> {
    let value = normalize_value(content)?;
    let candidates = match value {
        Value::Array(items) => Value::Array(items),
        Value::Object(mut map) => map.remove("diagnoses").ok_or_else(|| {
            PipelineError::UpstreamSchemaViolation("missing required field `diagnoses`".to_string())
        })?,
        other => {
            return Err(PipelineError::UpstreamSchemaViolation(format!(
                "expected diagnosis list, got {}",
                other
            )));
        }
    };
    let wire: Vec<DiagnosisWire> = serde_json::from_value(candidates)
        .map_err(|e| PipelineError::UpstreamSchemaViolation(e.to_string()))?;

    let mut diagnoses = wire
        .into_iter()
        .enumerate()
        .map(|(i, d)| d.into_domain(i))
        .collect::<PipelineResult<Vec<_>>>()?;

    if diagnoses.is_empty() {
        return Err(PipelineError::UpstreamSchemaViolation(
            "no diagnoses could be generated from the provided medical information".to_string(),
        ));
    }

    // Stable sort keeps the model's order among equal confidences
    diagnoses.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));

    let mut ranked: Vec<Diagnosis> = Vec::with_capacity(diagnoses.len());
    for diagnosis in diagnoses {
        if ranked.iter().any(|d| d.same_condition(&diagnosis)) {
            debug!("Dropping repeated diagnosis {}", diagnosis.icd_10_code.code);
            continue;
        }
        ranked.push(diagnosis);
    }
    ranked.truncate(max.max(1));

    for diagnosis in &mut ranked {
        order_by_extraction(&mut diagnosis.supporting_symptoms, extraction);
    }

    Ok(ranked)
}

/// Sort symptom references into extraction order; unknown ones go last
fn order_by_extraction(symptoms: &mut [String], extraction: &ExtractionResult) {
    symptoms.sort_by_key(|s| extraction.symptom_position(s).unwrap_or(usize::MAX));
}

#[derive(Debug, Deserialize)]
struct PathwayStepWire {
    category: Option<String>,
    recommendation: Option<String>,
    priority: Option<String>,
    duration: Option<String>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PathwayWire {
    clinical_pathway: Option<Vec<PathwayStepWire>>,
}

/// The single item returned when no pathway can be recovered
pub fn fallback_treatment_item() -> TreatmentItem {
    TreatmentItem {
        category: DEFAULT_TREATMENT_CATEGORY.to_string(),
        recommendation:
            "Clinical pathway available - see evidence sources for detailed protocol".to_string(),
        priority: Priority::High,
        duration: None,
        notes: Some(
            "Structured pathway could not be parsed from the model output. See citations for evidence."
                .to_string(),
        ),
    }
}

/// Parse treatment-model text into a non-empty plan.
///
/// Never fails: unparsable text, or a pathway with no usable step, yields
/// exactly one high-priority fallback item.
pub fn parse_treatment_plan(content: &str) -> Vec<TreatmentItem> {
    let wire: PathwayWire = match normalize(content) {
        Ok(wire) => wire,
        Err(e) => {
            warn!("Treatment pathway parsing failed, using fallback: {}", e);
            return vec![fallback_treatment_item()];
        }
    };

    let items: Vec<TreatmentItem> = wire
        .clinical_pathway
        .unwrap_or_default()
        .into_iter()
        .filter_map(|step| {
            let recommendation = optional_text(step.recommendation)?;
            let priority = step
                .priority
                .as_deref()
                .and_then(Priority::parse)
                .unwrap_or(Priority::Medium);
            Some(TreatmentItem {
                category: optional_text(step.category)
                    .unwrap_or_else(|| DEFAULT_TREATMENT_CATEGORY.to_string()),
                recommendation,
                priority,
                duration: optional_text(step.duration),
                notes: optional_text(step.notes)
                    .or_else(|| Some("Based on clinical guidelines".to_string())),
            })
        })
        .collect();

    if items.is_empty() {
        warn!("Treatment pathway had no usable steps, using fallback");
        return vec![fallback_treatment_item()];
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extraction_with(symptoms: &[&str]) -> ExtractionResult {
        ExtractionResult {
            patient_info: PatientInfo::default(),
            symptoms: symptoms.iter().map(|s| Symptom::new(*s)).collect(),
            reason_for_consultation: "evaluation".to_string(),
            additional_notes: None,
        }
    }

    fn diagnosis_json(name: &str, code: &str, confidence: f64, symptoms: &[&str]) -> Value {
        serde_json::json!({
            "diagnosis_name": name,
            "icd_10_code": {"code": code, "description": name, "category": "Test"},
            "confidence_score": confidence,
            "reasoning": "fits",
            "supporting_symptoms": symptoms,
        })
    }

    #[test]
    fn test_parse_extraction() {
        let content = r#"```json
{
    "patient_info": {"name": "John Smith", "age": 45, "identification_number": null, "gender": "male"},
    "symptoms": [
        {"symptom": "severe headache", "duration": "3 days", "severity": "Severe", "location": null},
        {"symptom": "nausea", "duration": null, "severity": "null", "location": null}
    ],
    "reason_for_consultation": "severe headache",
    "additional_notes": null,
    "unexpected": "ignored"
}
```"#;

        let result = parse_extraction(content).unwrap();
        assert_eq!(result.patient_info.name.as_deref(), Some("John Smith"));
        assert_eq!(result.patient_info.age, Some(45));
        assert_eq!(result.patient_info.identification_number, None);
        assert_eq!(result.symptoms.len(), 2);
        assert_eq!(result.symptoms[0].severity, Some(Severity::Severe));
        assert_eq!(result.symptoms[1].symptom, "nausea");
        assert_eq!(result.symptoms[1].severity, None);
    }

    #[test]
    fn test_extraction_missing_reason_is_schema_violation() {
        let err = parse_extraction(r#"{"symptoms": []}"#).unwrap_err();
        match err {
            PipelineError::UpstreamSchemaViolation(msg) => {
                assert!(msg.contains("reason_for_consultation"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_extraction_symptom_without_description() {
        let err = parse_extraction(
            r#"{"symptoms": [{"duration": "1 day"}], "reason_for_consultation": "x"}"#,
        )
        .unwrap_err();
        match err {
            PipelineError::UpstreamSchemaViolation(msg) => assert!(msg.contains("symptoms[0]")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_extraction_age_out_of_range() {
        let err = parse_extraction(
            r#"{"patient_info": {"age": 212}, "reason_for_consultation": "x"}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamSchemaViolation(_)));
    }

    #[test]
    fn test_extraction_prose_only_is_format_error() {
        let err = parse_extraction("I could not find any medical information.").unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamFormat(_)));
    }

    #[test]
    fn test_diagnoses_ranked_and_bounded() {
        let content = serde_json::json!({
            "diagnoses": [
                diagnosis_json("Tension headache", "G44.2", 0.4, &["headache"]),
                diagnosis_json("Migraine", "G43.1", 1.7, &["nausea", "headache"]),
                diagnosis_json("Sinusitis", "J32.9", -0.2, &[]),
            ]
        })
        .to_string();
        let extraction = extraction_with(&["headache", "nausea"]);

        let diagnoses = parse_diagnoses(&content, &extraction, 3).unwrap();

        assert_eq!(diagnoses.len(), 3);
        assert_eq!(diagnoses[0].diagnosis_name, "Migraine");
        assert_eq!(diagnoses[0].confidence_score, 1.0);
        assert_eq!(diagnoses[2].confidence_score, 0.0);
        for pair in diagnoses.windows(2) {
            assert!(pair[0].confidence_score >= pair[1].confidence_score);
        }
        // Supporting symptoms follow extraction order
        assert_eq!(diagnoses[0].supporting_symptoms, vec!["headache", "nausea"]);
    }

    #[test]
    fn test_diagnoses_drop_repeated_primary_and_truncate() {
        let content = serde_json::json!([
            diagnosis_json("Migraine", "G43.1", 0.9, &[]),
            diagnosis_json("Migraine with aura", "g43.1", 0.8, &[]),
            diagnosis_json("Cluster headache", "G44.0", 0.5, &[]),
            diagnosis_json("Sinusitis", "J32.9", 0.3, &[]),
        ])
        .to_string();

        let diagnoses = parse_diagnoses(
            &format!("```json\n{}\n```", content),
            &extraction_with(&[]),
            2,
        )
        .unwrap();

        assert_eq!(diagnoses.len(), 2);
        assert_eq!(diagnoses[0].icd_10_code.code, "G43.1");
        assert_eq!(diagnoses[1].icd_10_code.code, "G44.0");
    }

    #[test]
    fn test_diagnoses_empty_is_schema_violation() {
        let err = parse_diagnoses(r#"{"diagnoses": []}"#, &extraction_with(&[]), 3).unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamSchemaViolation(_)));
    }

    #[test]
    fn test_diagnosis_missing_icd_is_schema_violation() {
        let content = r#"{"diagnoses": [{"diagnosis_name": "Flu", "confidence_score": 0.6, "reasoning": "fever"}]}"#;
        let err = parse_diagnoses(content, &extraction_with(&[]), 3).unwrap_err();
        match err {
            PipelineError::UpstreamSchemaViolation(msg) => assert!(msg.contains("icd_10_code")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_treatment_plan_parsed() {
        let content = r#"Based on AHA/ACC guidance:
```json
{"clinical_pathway": [
    {"recommendation": "Aspirin 325 mg chewed", "priority": "HIGH", "duration": "once", "notes": "AHA 2023"},
    {"recommendation": "Serial troponins", "priority": "urgent"},
    {"priority": "low"}
]}
```"#;

        let plan = parse_treatment_plan(content);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].priority, Priority::High);
        assert_eq!(plan[0].category, DEFAULT_TREATMENT_CATEGORY);
        assert_eq!(plan[1].priority, Priority::Medium);
        assert_eq!(plan[1].notes.as_deref(), Some("Based on clinical guidelines"));
    }

    #[test]
    fn test_treatment_plan_fallback_on_unparsable_text() {
        let plan = parse_treatment_plan("Start aspirin and refer to cardiology {see notes");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].priority, Priority::High);
        assert_eq!(plan[0].category, "clinical");
        assert!(plan[0].notes.is_some());
    }

    #[test]
    fn test_treatment_plan_fallback_on_empty_pathway() {
        let plan = parse_treatment_plan(r#"{"clinical_pathway": []}"#);
        assert_eq!(plan, vec![fallback_treatment_item()]);
    }
}
