use async_trait::async_trait;
use tracing::info;

use super::DiagnosisGenerator;
use crate::error::PipelineResult;
use crate::llm::{build_diagnosis_prompt, parse_diagnoses, ChatClient, DIAGNOSIS_SYSTEM_PROMPT};
use crate::models::{Diagnosis, ExtractionResult, PipelineOptions};

/// ICD-10 diagnosis generation backed by a chat-completions model
pub struct LlmDiagnosisGenerator {
    client: ChatClient,
}

impl LlmDiagnosisGenerator {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DiagnosisGenerator for LlmDiagnosisGenerator {
    async fn generate(
        &self,
        extraction: &ExtractionResult,
        options: &PipelineOptions,
    ) -> PipelineResult<Vec<Diagnosis>> {
        info!(
            "Generating up to {} diagnoses with {}",
            options.max_diagnoses,
            self.client.model()
        );

        let prompt = build_diagnosis_prompt(extraction, options.max_diagnoses);
        let reply = self
            .client
            .send_message(DIAGNOSIS_SYSTEM_PROMPT, &prompt)
            .await?;
        let diagnoses = parse_diagnoses(&reply.content, extraction, options.max_diagnoses as usize)?;

        info!("Generated {} diagnoses with ICD-10 codes", diagnoses.len());
        Ok(diagnoses)
    }

    fn is_ready(&self) -> bool {
        self.client.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::llm::ChatConfig;
    use crate::models::{PatientInfo, Symptom};
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator_for(server: &MockServer) -> LlmDiagnosisGenerator {
        let config = ChatConfig::new("key", server.uri(), "gpt-4").with_sampling(0.2, 2000);
        LlmDiagnosisGenerator::new(ChatClient::new("OpenAI", config).unwrap())
    }

    fn extraction() -> ExtractionResult {
        ExtractionResult {
            patient_info: PatientInfo::default(),
            symptoms: vec![Symptom::new("fever"), Symptom::new("cough")],
            reason_for_consultation: "fever".to_string(),
            additional_notes: None,
        }
    }

    #[tokio::test]
    async fn test_generate_ranks_by_confidence() {
        let server = MockServer::start().await;
        let content = json!({
            "diagnoses": [
                {
                    "diagnosis_name": "Acute bronchitis",
                    "icd_10_code": {"code": "J20.9", "description": "Acute bronchitis, unspecified", "category": "Diseases of the respiratory system"},
                    "confidence_score": 0.35,
                    "reasoning": "cough",
                    "supporting_symptoms": ["cough"]
                },
                {
                    "diagnosis_name": "Influenza",
                    "icd_10_code": {"code": "J11.1", "description": "Influenza with other respiratory manifestations", "category": "Diseases of the respiratory system"},
                    "confidence_score": 0.7,
                    "reasoning": "fever and cough",
                    "supporting_symptoms": ["cough", "fever"]
                }
            ]
        })
        .to_string();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": content}}]
            })))
            .mount(&server)
            .await;

        let diagnoses = generator_for(&server)
            .generate(&extraction(), &PipelineOptions::default())
            .await
            .unwrap();

        assert_eq!(diagnoses[0].icd_10_code.code, "J11.1");
        assert_eq!(diagnoses[0].supporting_symptoms, vec!["fever", "cough"]);
        assert!(diagnoses.iter().all(|d| (0.0..=1.0).contains(&d.confidence_score)));
    }

    #[tokio::test]
    async fn test_generate_upstream_down() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = generator_for(&server)
            .generate(&extraction(), &PipelineOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamUnavailable(_)));
    }
}
