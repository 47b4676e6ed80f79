use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::fmt;

/// Client-facing event derived from the upstream records, in upstream order.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Chunk(String),
    Done(Map<String, Value>),
    Error(String),
}

impl OutboundEvent {
    /// `Done` and `Error` end a stream; exactly one of them is ever emitted.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutboundEvent::Chunk(_))
    }

    /// The JSON payload carried after `data: `
    pub fn payload(&self) -> Value {
        match self {
            OutboundEvent::Chunk(text) => json!({ "chunk": text }),
            OutboundEvent::Done(meta) => json!({ "done": true, "meta": meta }),
            OutboundEvent::Error(message) => json!({ "error": message }),
        }
    }

    /// Complete wire frame including the blank-line terminator.
    pub fn to_frame(&self) -> Bytes {
        Bytes::from(self.to_string())
    }
}

impl fmt::Display for OutboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data: {}\n\n", self.payload())
    }
}

impl From<OutboundEvent> for Bytes {
    fn from(event: OutboundEvent) -> Self {
        event.to_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_chunk_frame() {
        let event = OutboundEvent::Chunk("import".to_string());
        assert_eq!(event.to_string(), "data: {\"chunk\":\"import\"}\n\n");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_chunk_frame_escapes_newlines() {
        let event = OutboundEvent::Chunk("a\n\nb".to_string());
        let frame = event.to_frame();
        assert_eq!(&frame[..], b"data: {\"chunk\":\"a\\n\\nb\"}\n\n");
    }

    #[test]
    fn test_done_frame_carries_meta() {
        let mut meta = Map::new();
        meta.insert("done".to_string(), Value::Bool(true));
        meta.insert("total_duration".to_string(), json!(500));

        let event = OutboundEvent::Done(meta);
        assert!(event.is_terminal());

        let payload = event.payload();
        assert_eq!(payload["done"], true);
        assert_eq!(payload["meta"]["total_duration"], 500);
        assert!(event.to_string().starts_with("data: {"));
        assert!(event.to_string().ends_with("}\n\n"));
    }

    #[test]
    fn test_error_frame() {
        let frame: Bytes = OutboundEvent::Error("boom".to_string()).into();
        assert_eq!(&frame[..], b"data: {\"error\":\"boom\"}\n\n");
    }
}
