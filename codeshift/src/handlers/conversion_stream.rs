use std::time::Instant;

use bytes::Bytes;
use relaywire::{ConversionRelay, OutboundEvent};
use tracing::{debug, info, warn};

use crate::handlers::utils::StreamProcessor;

/// Feeds upstream NDJSON chunks through a [`ConversionRelay`] and renders the
/// resulting events as SSE frames.
pub struct ConversionStreamProcessor {
    relay: ConversionRelay,
    request_id: String,
    model: String,
    start_time: Instant,
    first_chunk_ms: Option<u64>,
}

impl ConversionStreamProcessor {
    pub fn new(request_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            relay: ConversionRelay::new(),
            request_id: request_id.into(),
            model: model.into(),
            start_time: Instant::now(),
            first_chunk_ms: None,
        }
    }

    fn render(&mut self, events: Vec<OutboundEvent>) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(events.len());
        for event in events {
            match &event {
                OutboundEvent::Chunk(_) => {
                    if self.first_chunk_ms.is_none() {
                        let elapsed = self.start_time.elapsed().as_millis() as u64;
                        self.first_chunk_ms = Some(elapsed);
                        debug!(request_id = %self.request_id, time_to_first_chunk_ms = elapsed, "first chunk relayed");
                    }
                }
                OutboundEvent::Done(_) => {
                    info!(
                        request_id = %self.request_id,
                        model = %self.model,
                        chunks = self.relay.emitted_chunks(),
                        discarded_lines = self.relay.discarded_lines(),
                        duration_ms = self.start_time.elapsed().as_millis() as u64,
                        "conversion stream completed"
                    );
                }
                OutboundEvent::Error(message) => {
                    warn!(
                        request_id = %self.request_id,
                        model = %self.model,
                        chunks = self.relay.emitted_chunks(),
                        error = %message,
                        "conversion stream failed"
                    );
                }
            }
            frames.push(event.to_frame());
        }
        frames
    }
}

impl StreamProcessor for ConversionStreamProcessor {
    fn on_start(&mut self) {
        self.relay.start();
    }

    fn process_chunk(&mut self, chunk: Bytes) -> Vec<Bytes> {
        let events = self.relay.on_bytes(&chunk);
        self.render(events)
    }

    fn on_complete(&mut self) -> Vec<Bytes> {
        let events = self.relay.on_end(Ok(()));
        self.render(events)
    }

    fn on_error(&mut self, error: &str) -> Vec<Bytes> {
        let events = self.relay.on_end(Err(error.to_string()));
        self.render(events)
    }

    fn on_disconnect(&mut self) {
        if !self.relay.is_terminated() {
            info!(
                request_id = %self.request_id,
                chunks = self.relay.emitted_chunks(),
                "client disconnected before the conversion finished"
            );
        }
        self.relay.on_disconnect();
    }

    fn is_finished(&self) -> bool {
        self.relay.is_terminated()
    }
}
