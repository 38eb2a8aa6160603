use crate::error::{Result, StreamError};
use tracing::warn;

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes can be pushed in arbitrary chunks; a frame is emitted once its
/// terminating blank line arrives. Only `data:` fields matter to the crawler
/// protocol, so `event:`, `id:` and `retry:` are skipped. A frame whose data
/// is not valid UTF-8 comes out as [`StreamError::Malformed`].
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    data: Option<Vec<u8>>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every frame it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<String>> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.line);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if let Some(frame) = self.process_line(&line) {
                    frames.push(frame);
                }
            } else {
                self.line.push(byte);
            }
        }

        frames
    }

    /// Flush a trailing frame when the body ends without a blank line.
    pub fn finish(&mut self) -> Option<Result<String>> {
        if !self.line.is_empty() {
            let mut line = std::mem::take(&mut self.line);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            // a complete frame cannot come out of a non-empty line
            let _ = self.process_line(&line);
        }
        self.data.take().map(decode)
    }

    fn process_line(&mut self, line: &[u8]) -> Option<Result<String>> {
        if line.is_empty() {
            return self.data.take().map(decode);
        }
        if line[0] == b':' {
            return None;
        }

        let (field, value) = match line.iter().position(|&b| b == b':') {
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &[][..]),
        };

        if field == b"data" {
            match self.data.as_mut() {
                Some(data) => {
                    data.push(b'\n');
                    data.extend_from_slice(value);
                }
                None => self.data = Some(value.to_vec()),
            }
        }

        None
    }
}

fn decode(data: Vec<u8>) -> Result<String> {
    String::from_utf8(data).map_err(|e| {
        warn!("Dropping event with invalid UTF-8: {}", e);
        StreamError::Malformed(format!("invalid UTF-8 in event data: {}", e))
    })
}
