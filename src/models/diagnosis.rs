use serde::{Deserialize, Serialize};

/// ICD-10 coding for a diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcdCode {
    pub code: String,
    pub description: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub diagnosis_name: String,
    pub icd_10_code: IcdCode,
    /// Confidence score, always within [0, 1]
    pub confidence_score: f64,
    pub reasoning: String,
    /// Symptom descriptions, in extraction order
    pub supporting_symptoms: Vec<String>,
}

impl Diagnosis {
    /// Two diagnoses are the same condition if they share an ICD-10 code
    pub fn same_condition(&self, other: &Diagnosis) -> bool {
        self.icd_10_code.code.eq_ignore_ascii_case(&other.icd_10_code.code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

/// A single step of the treatment plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentItem {
    /// e.g. medication, lifestyle, monitoring, follow_up, clinical
    pub category: String,
    pub recommendation: String,
    pub priority: Priority,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Treatment plan together with the sources it was built from
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreatmentPlan {
    pub items: Vec<TreatmentItem>,
    pub citations: Vec<String>,
}

/// Output of the compound diagnosis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisBundle {
    pub primary_diagnosis: Diagnosis,
    /// Never contains the primary diagnosis
    #[serde(default)]
    pub differential_diagnoses: Vec<Diagnosis>,
    pub treatment_plan: Vec<TreatmentItem>,
    #[serde(default)]
    pub evidence_citations: Vec<String>,
}

impl DiagnosisBundle {
    /// Number of diagnoses reported (primary plus differential)
    pub fn diagnosis_count(&self) -> usize {
        1 + self.differential_diagnoses.len()
    }
}
