use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use thiserror::Error;

use super::ApiDefinition;
use crate::{GENERATE_PATH, ROOT_PATH, TAGS_PATH};

// Enum for the model server endpoints the relay talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OllamaApi {
    Root,
    Generate,
    Tags,
}

impl ApiDefinition for OllamaApi {
    fn endpoint(&self) -> &'static str {
        match self {
            OllamaApi::Root => ROOT_PATH,
            OllamaApi::Generate => GENERATE_PATH,
            OllamaApi::Tags => TAGS_PATH,
        }
    }
}

/// Body of a `POST /api/generate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
}

impl GenerateRequest {
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        system: Option<String>,
        stream: bool,
    ) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system,
            stream,
        }
    }
}

/// Fully buffered answer of a non-streaming generate call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    /// Nanoseconds, as reported by the model server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("line is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("line is JSON but not an object")]
    NotAnObject,
}

/// One decoded line of the upstream NDJSON stream.
///
/// `metadata` keeps the whole object so completion records travel to the
/// client with their timing fields intact.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRecord {
    pub response: Option<String>,
    pub done: bool,
    pub error: Option<String>,
    pub metadata: Map<String, Value>,
}

impl UpstreamRecord {
    /// Parses one newline-stripped line straight from the byte buffer.
    pub fn parse(line: &[u8]) -> Result<Self, RecordError> {
        std::str::from_utf8(line)?.parse()
    }

    /// The text fragment carried by this record, if any and non-empty.
    pub fn fragment(&self) -> Option<&str> {
        self.response.as_deref().filter(|text| !text.is_empty())
    }

    pub fn is_final(&self) -> bool {
        self.done
    }

    pub fn into_metadata(self) -> Map<String, Value> {
        self.metadata
    }
}

impl FromStr for UpstreamRecord {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let metadata = match serde_json::from_str::<Value>(line.trim())? {
            Value::Object(map) => map,
            _ => return Err(RecordError::NotAnObject),
        };

        let response = metadata
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let done = metadata
            .get("done")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let error = metadata.get("error").map(|err| match err {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        });

        Ok(UpstreamRecord {
            response,
            done,
            error,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_generate_request_serialization() {
        let request = GenerateRequest::new("qwen2.5-coder", "print(1)", None, true);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"model": "qwen2.5-coder", "prompt": "print(1)", "stream": true})
        );

        let request = GenerateRequest::new(
            "qwen2.5-coder",
            "print(1)",
            Some("convert".to_string()),
            false,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["system"], "convert");
        assert_eq!(value["stream"], false);
    }

    #[test]
    fn test_generate_response_keeps_unknown_fields() {
        let body = r#"{"model":"llama3","response":"x = 1","done":true,"total_duration":1200,"eval_count":4}"#;
        let response: GenerateResponse = serde_json::from_str(body).unwrap();

        assert_eq!(response.model.as_deref(), Some("llama3"));
        assert_eq!(response.response, "x = 1");
        assert_eq!(response.total_duration, Some(1200));
        assert_eq!(response.extra["eval_count"], 4);
    }

    #[test]
    fn test_generate_response_missing_fields_default() {
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.response, "");
        assert_eq!(response.model, None);
        assert_eq!(response.total_duration, None);
    }

    #[test]
    fn test_parse_fragment_record() {
        let record: UpstreamRecord = r#"{"model":"llama3","response":"import","done":false}"#
            .parse()
            .unwrap();
        assert_eq!(record.fragment(), Some("import"));
        assert!(!record.is_final());
        assert_eq!(record.error, None);
    }

    #[test]
    fn test_parse_completion_record_keeps_metadata() {
        let record = UpstreamRecord::parse(br#"{"response":"","done":true,"total_duration":500}"#)
            .unwrap();
        assert_eq!(record.fragment(), None);
        assert!(record.is_final());
        assert_eq!(record.metadata["total_duration"], 500);
        assert_eq!(record.metadata["done"], true);
    }

    #[test]
    fn test_parse_error_record() {
        let record: UpstreamRecord = r#"{"error":"model crashed"}"#.parse().unwrap();
        assert_eq!(record.error.as_deref(), Some("model crashed"));

        let record: UpstreamRecord = r#"{"error":{"code":1}}"#.parse().unwrap();
        assert_eq!(record.error.as_deref(), Some(r#"{"code":1}"#));
    }

    #[test]
    fn test_parse_rejects_non_records() {
        assert!(matches!(
            "keepalive".parse::<UpstreamRecord>(),
            Err(RecordError::InvalidJson(_))
        ));
        assert!(matches!(
            "[1,2]".parse::<UpstreamRecord>(),
            Err(RecordError::NotAnObject)
        ));
        assert!(matches!(
            UpstreamRecord::parse(&[0x7b, 0xff, 0x7d]),
            Err(RecordError::InvalidUtf8(_))
        ));
        assert!(matches!(
            r#"{"response":"trunc"#.parse::<UpstreamRecord>(),
            Err(RecordError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_non_string_response_is_ignored() {
        let record: UpstreamRecord = r#"{"response":42}"#.parse().unwrap();
        assert_eq!(record.fragment(), None);
    }
}
