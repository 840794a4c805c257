use crate::models::{Diagnosis, ExtractionResult};

/// System prompt for the extraction stage
pub const EXTRACTION_SYSTEM_PROMPT: &str = "You are a medical assistant specialized in extracting \
structured information from medical texts. Respond ONLY with valid JSON following exactly the \
provided schema.";

/// System prompt for the diagnosis stage
pub const DIAGNOSIS_SYSTEM_PROMPT: &str = "You are an experienced physician with expertise in \
ICD-10 coding. Analyze medical information and provide accurate diagnoses with proper ICD-10 \
codes. Always respond with valid JSON only.";

/// System prompt for the treatment stage
pub const TREATMENT_SYSTEM_PROMPT: &str = "You are a medical AI that provides evidence-based \
clinical pathways in JSON format. Always respond with valid JSON structure only. Never include \
explanations outside the JSON.";

/// Build the user prompt asking for an extraction record
pub fn build_extraction_prompt(text: &str) -> String {
    format!(
        r#"Extract medical information from the following text and return a JSON with exactly this structure:

{{
    "patient_info": {{
        "name": "patient name or null",
        "age": age_number or null,
        "identification_number": "ID or null",
        "gender": "gender or null"
    }},
    "symptoms": [
        {{
            "symptom": "symptom description",
            "duration": "duration or null",
            "severity": "mild/moderate/severe or null",
            "location": "location or null"
        }}
    ],
    "reason_for_consultation": "main reason for consultation",
    "additional_notes": "additional notes or null"
}}

Medical text:
{text}

Respond ONLY with valid JSON, no additional explanations:
"#
    )
}

/// Build the user prompt asking for ranked ICD-10 diagnoses
pub fn build_diagnosis_prompt(extraction: &ExtractionResult, max_diagnoses: u8) -> String {
    let patient = &extraction.patient_info;
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Based on the following medical information, provide {} most likely diagnoses with proper ICD-10 codes.\n\n",
        max_diagnoses
    ));
    prompt.push_str(&format!(
        "Patient: {}, Age: {}, Gender: {}\n\n",
        patient.name.as_deref().unwrap_or("Unknown"),
        patient
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        patient.gender.as_deref().unwrap_or("Unknown")
    ));
    prompt.push_str(&format!(
        "Reason for consultation: {}\n\n",
        extraction.reason_for_consultation
    ));

    prompt.push_str("Symptoms:\n");
    for symptom in &extraction.symptoms {
        prompt.push_str(&format!("- {}\n", symptom.describe()));
    }
    prompt.push('\n');

    if let Some(notes) = &extraction.additional_notes {
        prompt.push_str(&format!("Additional notes: {}\n\n", notes));
    }

    prompt.push_str(
        r#"Provide a JSON response with exactly this structure:

{
    "diagnoses": [
        {
            "diagnosis_name": "Primary diagnosis name",
            "icd_10_code": {
                "code": "ICD-10 code (e.g., G43.1)",
                "description": "Full ICD-10 description",
                "category": "ICD-10 category (e.g., Diseases of the nervous system)"
            },
            "confidence_score": 0.85,
            "reasoning": "Clinical reasoning explaining why this diagnosis fits the symptoms",
            "supporting_symptoms": ["symptom1", "symptom2"]
        }
    ]
}

Order diagnoses by likelihood (most probable first). Use the symptom descriptions exactly as listed above in supporting_symptoms.
Respond ONLY with valid JSON:
"#,
    );

    prompt
}

/// Build the user prompt asking for a clinical pathway for the primary diagnosis
pub fn build_treatment_prompt(
    diagnosis: &Diagnosis,
    patient_age: Option<u8>,
    patient_gender: Option<&str>,
) -> String {
    let age = patient_age
        .map(|a| format!("{} years old", a))
        .unwrap_or_else(|| "age unknown".to_string());
    let gender = patient_gender.map(|g| format!(", {}", g)).unwrap_or_default();

    format!(
        r#"Act as a clinical research assistant and develop a comprehensive care pathway for primary diagnosis: {name} (ICD-10: {code}).

Patient profile: {age}{gender}

Base it on recent research and current clinical practice guidelines from US, Canada, and Europe (prioritize 2023-2025 sources: AHA/ACC, NICE, ESC, USPSTF, CDC, CADTH).

Return ONLY this JSON structure:

{{
    "clinical_pathway": [
        {{
            "recommendation": "Specific clinical recommendation with dosage/details",
            "priority": "high/medium/low",
            "duration": "timeframe or null",
            "notes": "evidence source and additional context"
        }}
    ]
}}

Include: initial assessment, treatment approach, monitoring requirements, key contraindications, and follow-up. Cite guidelines in the notes field.

JSON only - no additional text:
"#,
        name = diagnosis.diagnosis_name.to_uppercase(),
        code = diagnosis.icd_10_code.code,
    )
}
