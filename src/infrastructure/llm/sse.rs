//! Server-sent event decoding for streamed completions

use std::collections::VecDeque;

use futures::{Stream, StreamExt};

use super::http_client::ByteStream;
use crate::domain::DomainError;

/// Splits a byte stream into `data:` payloads
///
/// Lines may span network chunks; a partial line is held as raw bytes
/// until its newline arrives, so multi-byte characters cut by a chunk
/// boundary decode intact. A trailing unterminated line is flushed at EOF.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every payload completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            if let Some(data) = data_payload(&decode_line(line)) {
                payloads.push(data);
            }
        }
        payloads
    }

    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payload(&decode_line(rest))
    }
}

/// Decode one complete line; invalid sequences become U+FFFD
fn decode_line(line: Vec<u8>) -> String {
    String::from_utf8(line)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn data_payload(line: &str) -> Option<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    (!data.is_empty()).then(|| data.to_string())
}

/// Turn a raw byte stream into a stream of SSE data payloads
pub fn sse_events(bytes: ByteStream) -> impl Stream<Item = Result<String, DomainError>> + Send {
    struct State {
        bytes: ByteStream,
        decoder: SseDecoder,
        ready: VecDeque<String>,
        done: bool,
    }

    let state = State {
        bytes,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(payload) = state.ready.pop_front() {
                return Some((Ok(payload), state));
            }

            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.ready.extend(state.decoder.feed(&chunk)),
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    state.ready.extend(state.decoder.finish());
                }
            }
        }
    })
}
