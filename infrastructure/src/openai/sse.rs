//! Server-Sent Events decoding
//!
//! Splits a chunked HTTP body into `data:` payloads. Chunks can end
//! anywhere, including inside a multi-byte character, so bytes are
//! buffered until a full line is available.

/// Incremental decoder for SSE `data:` lines.
///
/// ```
/// use chatstream_infrastructure::openai::SseDecoder;
///
/// let mut decoder = SseDecoder::new();
/// assert!(decoder.push(b"data: {\"a\"").is_empty());
/// assert_eq!(decoder.push(b":1}\n\n"), vec!["{\"a\":1}"]);
/// ```
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push incoming bytes and return every completed `data:` payload.
    ///
    /// Comment lines, blank separators and other fields (`event:`, `id:`)
    /// are dropped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        data_payload(&rest)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    line.trim()
        .strip_prefix("data:")
        .map(|payload| payload.trim_start().to_string())
}
