//! relaywire: wire shapes for relaying a local model server's NDJSON
//! generation stream to browser clients as Server-Sent Events.
//!
//! Nothing in this crate performs I/O. The server feeds raw upstream chunks
//! into a [`ConversionRelay`] and writes the [`OutboundEvent`]s it returns.

pub mod apis;
pub mod streaming;

// Re-export important types
pub use apis::ollama::{GenerateRequest, GenerateResponse, OllamaApi, RecordError, UpstreamRecord};
pub use apis::ApiDefinition;
pub use streaming::ndjson::NdjsonReassembler;
pub use streaming::relay::{ConversionRelay, RelayState};
pub use streaming::sse::OutboundEvent;

pub const GENERATE_PATH: &str = "/api/generate";
pub const TAGS_PATH: &str = "/api/tags";
pub const ROOT_PATH: &str = "/";
