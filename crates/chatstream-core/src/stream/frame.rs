//! SSE frame parser for chat-completion streams
//!
//! Wire format:
//! ```text
//! data: {"choices":[{"delta":{"role":"assistant"}}]}
//!
//! data: {"choices":[{"delta":{"content":"Hello"}}]}
//!
//! data: [DONE]
//! ```
//!
//! Reads may start or stop anywhere, including inside a frame or inside a
//! multi-byte character, so raw bytes are buffered until a full frame arrives.

use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::models::Delta;

/// Sentinel line that ends the logical stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

#[derive(Deserialize, Debug)]
struct StreamPayload {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<Value>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Debug, Default)]
struct StreamDelta {
    content: Option<String>,
    role: Option<String>,
}

#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    /// Bytes before this offset are known not to start a separator
    scanned: usize,
    done: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a `[DONE]` line has been seen. Later input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Bytes held back waiting for the rest of their frame.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Parse every frame completed by `bytes`, keeping any trailing partial frame.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Delta>, ParseError> {
        let mut deltas = Vec::new();
        if self.done {
            return Ok(deltas);
        }

        self.buffer.extend_from_slice(bytes);

        while let Some((end, separator_len)) = find_frame_boundary(&self.buffer, self.scanned) {
            let frame: Vec<u8> = self.buffer.drain(..end + separator_len).collect();
            self.scanned = 0;
            self.parse_frame(&frame[..end], &mut deltas)?;
            if self.done {
                self.buffer.clear();
                return Ok(deltas);
            }
        }
        // A separator is at most three bytes, so only the tail needs a rescan
        self.scanned = self.buffer.len().saturating_sub(2);

        Ok(deltas)
    }

    /// Parse whatever is left once the transport has closed.
    ///
    /// The last frame of a stream is not always followed by a blank line.
    pub fn finish(&mut self) -> Result<Vec<Delta>, ParseError> {
        let mut deltas = Vec::new();
        if self.done || self.buffer.is_empty() {
            self.buffer.clear();
            return Ok(deltas);
        }

        let frame = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        self.parse_frame(&frame, &mut deltas)?;
        Ok(deltas)
    }

    fn parse_frame(&mut self, frame: &[u8], deltas: &mut Vec<Delta>) -> Result<(), ParseError> {
        // Invalid sequences become U+FFFD instead of failing the stream
        let text = String::from_utf8_lossy(frame);

        for line in text.lines() {
            let line = line.trim();
            // Blank lines and SSE comments (`: keep-alive`)
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let payload = line
                .strip_prefix(DATA_PREFIX)
                .map(str::trim)
                .unwrap_or(line);
            if payload.is_empty() {
                continue;
            }
            if payload == DONE_SENTINEL {
                tracing::trace!("Stream sentinel received");
                self.done = true;
                return Ok(());
            }

            deltas.push(parse_payload(payload)?);
        }

        Ok(())
    }
}

/// Position and length of the first blank-line separator (`\n\n` or `\r\n\r\n`)
/// starting at or after `from`.
fn find_frame_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    buffer.iter().enumerate().skip(from).find_map(|(pos, byte)| {
        if *byte != b'\n' {
            return None;
        }
        let mut next = pos + 1;
        if buffer.get(next) == Some(&b'\r') {
            next += 1;
        }
        (buffer.get(next) == Some(&b'\n')).then_some((pos, next + 1 - pos))
    })
}

fn parse_payload(payload: &str) -> Result<Delta, ParseError> {
    let parsed: StreamPayload =
        serde_json::from_str(payload).map_err(|source| ParseError::Json {
            line: payload.to_string(),
            source,
        })?;

    if let Some(error) = parsed.error {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ParseError::Remote(message));
    }

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or(ParseError::MissingChoices)?;

    Ok(Delta {
        content: normalize_content(choice.delta.content.unwrap_or_default()),
        role: choice.delta.role.unwrap_or_default(),
    })
}

/// Repair code fences that arrive as a backtick followed by whitespace.
///
/// Only the current delta is touched: "` ``js" becomes "```js".
pub fn normalize_content(content: String) -> String {
    match content.strip_prefix('`') {
        Some(rest) if rest.starts_with(char::is_whitespace) => {
            format!("`{}", rest.trim_start())
        }
        _ => content,
    }
}
