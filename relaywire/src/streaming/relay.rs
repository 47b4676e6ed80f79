use log::{debug, warn};

use crate::apis::ollama::{RecordError, UpstreamRecord};
use crate::streaming::ndjson::NdjsonReassembler;
use crate::streaming::sse::OutboundEvent;

pub const UNEXPECTED_END_MESSAGE: &str = "upstream stream ended before completion";
const DISCARDED_PREVIEW_LEN: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    AwaitingRequest,
    Streaming,
    Terminated,
}

/// Per-request state machine turning upstream NDJSON bytes into outbound events.
///
/// Driven by two signals: [`on_bytes`](Self::on_bytes) for every chunk and
/// [`on_end`](Self::on_end) once the upstream stream finishes. Once
/// `Terminated` it ignores further input, which is what guarantees a single
/// `Done` or `Error` per request.
pub struct ConversionRelay {
    state: RelayState,
    reassembler: NdjsonReassembler,
    emitted_chunks: usize,
    discarded_lines: usize,
}

impl Default for ConversionRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionRelay {
    pub fn new() -> Self {
        Self {
            state: RelayState::AwaitingRequest,
            reassembler: NdjsonReassembler::new(),
            emitted_chunks: 0,
            discarded_lines: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == RelayState::Terminated
    }

    /// The upstream stream is open; start accepting bytes.
    pub fn start(&mut self) {
        if self.state == RelayState::AwaitingRequest {
            self.state = RelayState::Streaming;
        }
    }

    pub fn on_bytes(&mut self, chunk: &[u8]) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        if self.state != RelayState::Streaming {
            return events;
        }

        for line in self.reassembler.push(chunk) {
            self.apply_line(&line, &mut events);
            if self.is_terminated() {
                break;
            }
        }
        events
    }

    /// Upstream finished, cleanly (`Ok`) or with a transport error.
    ///
    /// A trailing unterminated record is given one parse attempt. If no
    /// terminal event has been produced by then, an `Error` closes the
    /// sequence.
    pub fn on_end(&mut self, outcome: Result<(), String>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        if self.state != RelayState::Streaming {
            return events;
        }

        if let Some(tail) = self.reassembler.finish() {
            self.apply_line(&tail, &mut events);
        }

        if !self.is_terminated() {
            let message = match outcome {
                Ok(()) => UNEXPECTED_END_MESSAGE.to_string(),
                Err(message) => message,
            };
            events.push(OutboundEvent::Error(message));
            self.state = RelayState::Terminated;
        }
        events
    }

    /// Downstream went away. No further events are produced.
    pub fn on_disconnect(&mut self) {
        if !self.is_terminated() {
            debug!(
                "downstream disconnected after {} chunks, dropping {} buffered bytes",
                self.emitted_chunks,
                self.reassembler.buffered_size()
            );
        }
        self.state = RelayState::Terminated;
    }

    pub fn emitted_chunks(&self) -> usize {
        self.emitted_chunks
    }

    pub fn discarded_lines(&self) -> usize {
        self.discarded_lines
    }

    fn apply_line(&mut self, line: &[u8], events: &mut Vec<OutboundEvent>) {
        match UpstreamRecord::parse(line) {
            Ok(record) => self.apply_record(record, events),
            Err(err) => self.discard_line(line, &err),
        }
    }

    fn apply_record(&mut self, record: UpstreamRecord, events: &mut Vec<OutboundEvent>) {
        if let Some(fragment) = record.fragment() {
            events.push(OutboundEvent::Chunk(fragment.to_owned()));
            self.emitted_chunks += 1;
        }

        if let Some(message) = record.error.clone() {
            events.push(OutboundEvent::Error(message));
            self.state = RelayState::Terminated;
        } else if record.is_final() {
            events.push(OutboundEvent::Done(record.into_metadata()));
            self.state = RelayState::Terminated;
        }
    }

    /// Unparseable lines are keepalives or framing noise: log and drop them,
    /// never reattach them to the buffer.
    fn discard_line(&mut self, line: &[u8], err: &RecordError) {
        self.discarded_lines += 1;
        let preview = String::from_utf8_lossy(line);
        let preview: String = preview.chars().take(DISCARDED_PREVIEW_LEN).collect();
        warn!(
            "discarding upstream line ({} bytes, {} discarded so far): {}: {}",
            line.len(),
            self.discarded_lines,
            err,
            preview
        );
    }
}
