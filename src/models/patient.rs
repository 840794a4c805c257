use serde::{Deserialize, Serialize};

/// Demographics extracted from the consultation text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default)]
    pub name: Option<String>,
    /// Age in years (0-150)
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub identification_number: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Lenient parse of model-provided severity labels
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "mild" => Some(Severity::Mild),
            "moderate" => Some(Severity::Moderate),
            "severe" => Some(Severity::Severe),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    /// Symptom description, referenced by name from diagnoses
    pub symptom: String,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub location: Option<String>,
}

impl Symptom {
    pub fn new(symptom: impl Into<String>) -> Self {
        Self {
            symptom: symptom.into(),
            duration: None,
            severity: None,
            location: None,
        }
    }

    /// One-line summary used in prompts
    pub fn describe(&self) -> String {
        let mut desc = self.symptom.clone();
        if let Some(duration) = &self.duration {
            desc.push_str(&format!(" (duration: {})", duration));
        }
        if let Some(severity) = self.severity {
            desc.push_str(&format!(" (severity: {})", severity.as_str()));
        }
        if let Some(location) = &self.location {
            desc.push_str(&format!(" (location: {})", location));
        }
        desc
    }
}

/// Structured medical information extracted from free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub patient_info: PatientInfo,
    /// Order is meaningful: diagnoses reference symptoms by description
    #[serde(default)]
    pub symptoms: Vec<Symptom>,
    pub reason_for_consultation: String,
    #[serde(default)]
    pub additional_notes: Option<String>,
}

impl ExtractionResult {
    /// Position of a symptom description in extraction order
    pub fn symptom_position(&self, description: &str) -> Option<usize> {
        let needle = description.trim().to_lowercase();
        self.symptoms
            .iter()
            .position(|s| s.symptom.trim().to_lowercase() == needle)
    }
}
