use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Which extraction strategy located the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    JsonFence,
    GenericFence,
    BraceSpan,
    Verbatim,
}

/// Locate the machine-readable part of a model response.
///
/// Strategies, first match wins:
/// 1. a fence tagged ```` ```json ````, taking the first such block
/// 2. the whole text wrapped in bare ```` ``` ```` fences
/// 3. the span from the first `{` to the last `}`
/// 4. the text itself
///
/// The brace span does not understand strings or escapes, so braces in the
/// surrounding prose can widen it.
pub fn extract_payload(content: &str) -> (&str, PayloadSource) {
    let content = content.trim();

    if let Some(start) = content.find("```json") {
        let after_fence = &content[start + "```json".len()..];
        if let Some(end) = after_fence.find("```") {
            return (after_fence[..end].trim(), PayloadSource::JsonFence);
        }
    }

    if content.len() >= 6 && content.starts_with("```") && content.ends_with("```") {
        return (content[3..content.len() - 3].trim(), PayloadSource::GenericFence);
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            return (&content[start..=end], PayloadSource::BraceSpan);
        }
    }

    (content, PayloadSource::Verbatim)
}

/// Extract and strictly parse the payload as a JSON value
pub fn normalize_value(content: &str) -> PipelineResult<Value> {
    let (payload, source) = extract_payload(content);
    debug!("Model payload located via {:?}", source);
    serde_json::from_str(payload).map_err(|e| {
        warn!("Could not parse model payload ({:?}): {}", source, e);
        PipelineError::UpstreamFormat(format!("no valid JSON payload in model output: {}", e))
    })
}

/// Extract the payload and deserialize it into `T`.
///
/// Unparsable text is a format error; JSON whose shape does not match `T`
/// is a schema violation.
pub fn normalize<T: DeserializeOwned>(content: &str) -> PipelineResult<T> {
    let value = normalize_value(content)?;
    serde_json::from_value(value)
        .map_err(|e| PipelineError::UpstreamSchemaViolation(e.to_string()))
}
