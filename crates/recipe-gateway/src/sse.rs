//! Server-sent-events decoding for streamed upstream responses
//!
//! Network chunks do not respect line boundaries, so raw bytes are buffered
//! and only complete lines are decoded. This also keeps multi-byte UTF-8
//! sequences split across chunks intact.

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use tracing::debug;

use crate::error::GatewayError;
use crate::gemini::GenerateContentResponse;

/// Lazy sequence of generated text fragments
pub type TextStream = BoxStream<'static, Result<String, GatewayError>>;

/// One meaningful line of the upstream event stream
#[derive(Debug)]
pub enum SseEvent {
    /// Generated text delta
    Text(String),
    /// Terminal sentinel
    Done,
    /// Upstream reported an error in-band
    Error(GatewayError),
}

/// Incremental line decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no line terminator
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning events for every line they complete
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=from + offset).collect();
            if let Some(event) = decode_line(&line) {
                events.push(event);
            }
            from = 0;
        }
        self.scanned = self.buffer.len();

        events
    }

    /// Decode whatever is left once the byte stream has ended
    pub fn finish(&mut self) -> Option<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        decode_line(&rest)
    }

    /// Bytes held back waiting for a line terminator
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(&['\r', '\n'][..]);

    // Comments, `event:`, `id:` and blank separators carry no text
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(response) => {
            if let Some(err) = response.error {
                return Some(SseEvent::Error(GatewayError::Upstream {
                    status: err.code,
                    body: err.message,
                }));
            }
            response.text().map(SseEvent::Text)
        }
        Err(e) => {
            debug!("Skipping malformed stream event: {}", e);
            None
        }
    }
}

/// Turn an upstream SSE byte stream into a stream of text fragments
///
/// Ends at the terminal sentinel, at the end of the byte stream, or after
/// yielding the first error.
pub fn decode_sse_stream<S, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<GatewayError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    let err: GatewayError = e.into();
                    yield Err(err);
                    return;
                }
            };

            for event in decoder.feed(&chunk) {
                match event {
                    SseEvent::Text(text) => yield Ok(text),
                    SseEvent::Done => return,
                    SseEvent::Error(err) => {
                        yield Err(err);
                        return;
                    }
                }
            }
        }

        match decoder.finish() {
            Some(SseEvent::Text(text)) => yield Ok(text),
            Some(SseEvent::Error(err)) => yield Err(err),
            Some(SseEvent::Done) | None => {}
        }
    };

    stream.boxed()
}
