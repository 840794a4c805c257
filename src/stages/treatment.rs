use async_trait::async_trait;
use tracing::info;

use super::TreatmentRecommender;
use crate::error::PipelineResult;
use crate::llm::{build_treatment_prompt, parse_treatment_plan, ChatClient, TREATMENT_SYSTEM_PROMPT};
use crate::models::{Diagnosis, TreatmentPlan};

/// Treatment pathway generation backed by Perplexity, which returns
/// literature citations next to the completion
pub struct PerplexityTreatmentRecommender {
    client: ChatClient,
}

impl PerplexityTreatmentRecommender {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TreatmentRecommender for PerplexityTreatmentRecommender {
    async fn recommend(
        &self,
        diagnosis: &Diagnosis,
        patient_age: Option<u8>,
        patient_gender: Option<&str>,
    ) -> PipelineResult<TreatmentPlan> {
        info!(
            "Getting treatment recommendations for {} ({})",
            diagnosis.diagnosis_name, diagnosis.icd_10_code.code
        );

        let prompt = build_treatment_prompt(diagnosis, patient_age, patient_gender);
        let reply = self
            .client
            .send_message(TREATMENT_SYSTEM_PROMPT, &prompt)
            .await?;

        let items = parse_treatment_plan(&reply.content);
        info!(
            "Parsed {} recommendations with {} citations",
            items.len(),
            reply.citations.len()
        );

        Ok(TreatmentPlan {
            items,
            citations: reply.citations,
        })
    }

    fn is_ready(&self) -> bool {
        self.client.is_ready()
    }
}
