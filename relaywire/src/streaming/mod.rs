pub mod ndjson;
pub mod relay;
pub mod sse;

pub use ndjson::NdjsonReassembler;
pub use relay::{ConversionRelay, RelayState, UNEXPECTED_END_MESSAGE};
pub use sse::OutboundEvent;
