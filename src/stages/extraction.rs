use async_trait::async_trait;
use tracing::info;

use super::Extractor;
use crate::error::PipelineResult;
use crate::llm::{build_extraction_prompt, parse_extraction, ChatClient, EXTRACTION_SYSTEM_PROMPT};
use crate::models::ExtractionResult;

/// Extraction backed by a chat-completions model
pub struct LlmExtractor {
    client: ChatClient,
}

impl LlmExtractor {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Extractor for LlmExtractor {
    async fn extract(&self, text: &str) -> PipelineResult<ExtractionResult> {
        let preview: String = text.chars().take(100).collect();
        info!("Extracting medical information from text: {}...", preview);

        let prompt = build_extraction_prompt(text);
        let reply = self
            .client
            .send_message(EXTRACTION_SYSTEM_PROMPT, &prompt)
            .await?;
        let result = parse_extraction(&reply.content)?;

        info!("Extracted {} symptoms", result.symptoms.len());
        Ok(result)
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
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        }))
    }

    fn extractor_for(server: &MockServer) -> LlmExtractor {
        let config = ChatConfig::new("key", server.uri(), "gpt-4");
        LlmExtractor::new(ChatClient::new("OpenAI", config).unwrap())
    }

    #[tokio::test]
    async fn test_extract_from_fenced_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4"})))
            .respond_with(completion(
                "Sure!\n```json\n{\"patient_info\": {\"age\": 30}, \"symptoms\": [{\"symptom\": \"cough\"}], \"reason_for_consultation\": \"cough\"}\n```",
            ))
            .mount(&server)
            .await;

        let result = extractor_for(&server).extract("Patient has a cough").await.unwrap();

        assert_eq!(result.patient_info.age, Some(30));
        assert_eq!(result.symptoms.len(), 1);
        assert_eq!(result.reason_for_consultation, "cough");
    }

    #[tokio::test]
    async fn test_extract_prose_reply_is_format_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(completion("I'm sorry, I can't help with that."))
            .mount(&server)
            .await;

        let err = extractor_for(&server).extract("Patient has a cough").await.unwrap_err();
        assert!(matches!(err, PipelineError::UpstreamFormat(_)));
    }
}
