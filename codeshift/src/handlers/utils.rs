use std::fmt::Display;

use bytes::Bytes;
use futures::Stream;
use http_body_util::combinators::BoxBody;
use http_body_util::StreamBody;
use hyper::body::Frame;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Trait for turning upstream chunks into downstream frames
/// Implementors own all per-request parsing state; the driver only moves bytes.
pub trait StreamProcessor: Send + 'static {
    /// Called once before the first chunk
    fn on_start(&mut self) {}

    /// Process an incoming chunk of bytes into zero or more frames
    fn process_chunk(&mut self, chunk: Bytes) -> Vec<Bytes>;

    /// Called when the upstream stream ends cleanly
    fn on_complete(&mut self) -> Vec<Bytes> {
        Vec::new()
    }

    /// Called when the upstream stream fails mid-way
    fn on_error(&mut self, _error: &str) -> Vec<Bytes> {
        Vec::new()
    }

    /// Called when the downstream client has gone away
    fn on_disconnect(&mut self) {}

    /// Once true the driver stops reading and closes the response
    fn is_finished(&self) -> bool {
        false
    }
}

/// Result of creating a streaming response
pub struct StreamingResponse {
    pub body: BoxBody<Bytes, hyper::Error>,
    pub processor_handle: tokio::task::JoinHandle<()>,
}

/// Pump `byte_stream` through `processor` into a chunked response body.
///
/// The body is backed by a channel of `buffer_size` frames. The relay task
/// awaits each send, so a slow client stops upstream reads instead of growing
/// a buffer. When the client disconnects the task returns at once and the
/// upstream stream is dropped with it.
pub fn create_streaming_response<S, E, P>(
    mut byte_stream: S,
    mut processor: P,
    buffer_size: usize,
) -> StreamingResponse
where
    S: Stream<Item = Result<Bytes, E>> + Send + Unpin + 'static,
    E: Display + Send + 'static,
    P: StreamProcessor,
{
    let (tx, rx) = mpsc::channel::<Bytes>(buffer_size);

    // Spawn a task to process and forward chunks
    let processor_handle = tokio::spawn(async move {
        processor.on_start();

        loop {
            let item = tokio::select! {
                item = byte_stream.next() => item,
                _ = tx.closed() => {
                    debug!("client disconnected while waiting for upstream");
                    processor.on_disconnect();
                    return;
                }
            };

            let frames = match item {
                Some(Ok(chunk)) => processor.process_chunk(chunk),
                Some(Err(err)) => {
                    warn!(error = %err, "error receiving chunk");
                    let frames = processor.on_error(&err.to_string());
                    if send_frames(&tx, frames).await.is_err() {
                        processor.on_disconnect();
                    }
                    return;
                }
                None => {
                    let frames = processor.on_complete();
                    if send_frames(&tx, frames).await.is_err() {
                        processor.on_disconnect();
                    }
                    return;
                }
            };

            if send_frames(&tx, frames).await.is_err() {
                debug!("client disconnected, abandoning upstream stream");
                processor.on_disconnect();
                return;
            }

            if processor.is_finished() {
                return;
            }
        }
    });

    // Convert channel receiver to HTTP stream
    let stream = ReceiverStream::new(rx).map(|chunk| Ok::<_, hyper::Error>(Frame::data(chunk)));
    let stream_body = BoxBody::new(StreamBody::new(stream));

    StreamingResponse {
        body: stream_body,
        processor_handle,
    }
}

async fn send_frames(
    tx: &mpsc::Sender<Bytes>,
    frames: Vec<Bytes>,
) -> Result<(), mpsc::error::SendError<Bytes>> {
    for frame in frames {
        tx.send(frame).await?;
    }
    Ok(())
}

/// Shorten text for log lines, respecting char boundaries
pub fn truncate_message(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        return message.to_string();
    }
    let truncated: String = message.chars().take(max_chars).collect();
    format!("{}...", truncated)
}
