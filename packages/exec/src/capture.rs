// ABOUTME: Output capture pipeline for child stdout/stderr
// ABOUTME: Drains streams with a per-stream byte bound, then decodes with replacement and marks truncation

use crate::error::{ExecError, Result};
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Appended to a stream's text when it was cut at the byte limit
pub const TRUNCATION_MARKER: &str = "\n...[TRUNCATED]...";

/// Read buffer size used while draining a pipe
const READ_CHUNK_SIZE: usize = 8192;

/// Keeps the first `limit` bytes written to it and counts the rest
#[derive(Debug, Clone)]
pub struct BoundedBuffer {
    bytes: Vec<u8>,
    limit: usize,
    total: u64,
}

impl BoundedBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            total: 0,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        let room = self.limit.saturating_sub(self.bytes.len());
        let keep = room.min(chunk.len());
        self.bytes.extend_from_slice(&chunk[..keep]);
        self.total += chunk.len() as u64;
    }

    /// Bytes seen in total, including the discarded tail
    pub fn total_bytes(&self) -> u64 {
        self.total
    }

    pub fn is_truncated(&self) -> bool {
        self.total > self.limit as u64
    }

    pub fn kept(&self) -> &[u8] {
        &self.bytes
    }
}

/// Read a pipe to EOF, retaining at most `limit` bytes.
///
/// A missing pipe yields an empty buffer.
pub async fn drain<R>(reader: Option<R>, limit: usize) -> std::io::Result<BoundedBuffer>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = BoundedBuffer::new(limit);
    let Some(mut reader) = reader else {
        return Ok(buffer);
    };

    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.push(&chunk[..n]);
    }
    Ok(buffer)
}

/// A resolved text encoding used for both stdin and captured output
#[derive(Debug, Clone, Copy)]
pub struct TextCodec {
    encoding: &'static Encoding,
}

impl TextCodec {
    /// Look up an encoding by its WHATWG label (`utf-8`, `latin1`, `shift_jis`, ...)
    ///
    /// Labels follow the WHATWG Encoding Standard, so `latin1`, `iso-8859-1`
    /// and `ascii` all resolve to windows-1252: bytes 0x80..=0x9F decode to
    /// their cp1252 characters (0x80 is `€`), not to C1 control codes.
    pub fn for_label(label: &str) -> Result<Self> {
        Encoding::for_label(label.trim().as_bytes())
            .map(|encoding| Self { encoding })
            .ok_or_else(|| ExecError::validation(format!("Unknown encoding: {label}")))
    }

    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }

    /// Decode bytes, substituting U+FFFD for malformed sequences. Never fails.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _had_errors) = self.encoding.decode_without_bom_handling(bytes);
        text.into_owned()
    }

    /// Encode input text for the child's stdin.
    ///
    /// Fails with `Validation` when the text has characters the encoding
    /// cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        // encoding_rs only encodes to ASCII-compatible encodings
        if self.encoding == UTF_16LE {
            return Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect());
        }
        if self.encoding == UTF_16BE {
            return Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect());
        }
        let (bytes, _, had_errors) = self.encoding.encode(text);
        if had_errors {
            return Err(ExecError::validation(format!(
                "Stdin contains characters that cannot be encoded as {}",
                self.name()
            )));
        }
        Ok(bytes.into_owned())
    }

    /// Decode a drained stream and append the marker if it was cut short
    pub fn finish(&self, buffer: &BoundedBuffer) -> (String, bool) {
        let mut text = self.decode(buffer.kept());
        let truncated = buffer.is_truncated();
        if truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        (text, truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_buffer_keeps_exact_prefix() {
        let mut buffer = BoundedBuffer::new(5);
        buffer.push(b"abc");
        buffer.push(b"defgh");
        assert_eq!(buffer.kept(), b"abcde");
        assert_eq!(buffer.total_bytes(), 8);
        assert!(buffer.is_truncated());
    }

    #[test]
    fn test_buffer_at_limit_is_not_truncated() {
        let mut buffer = BoundedBuffer::new(4);
        buffer.push(b"abcd");
        assert!(!buffer.is_truncated());
    }

    #[test]
    fn test_zero_limit_truncates_any_output() {
        let mut buffer = BoundedBuffer::new(0);
        buffer.push(b"x");
        let (text, truncated) = TextCodec::for_label("utf-8").unwrap().finish(&buffer);
        assert!(truncated);
        assert_eq!(text, TRUNCATION_MARKER);
    }

    #[tokio::test]
    async fn test_drain_reads_past_limit() {
        let data = vec![b'x'; READ_CHUNK_SIZE * 3 + 17];
        let buffer = drain(Some(&data[..]), 10).await.unwrap();
        assert_eq!(buffer.kept().len(), 10);
        assert_eq!(buffer.total_bytes(), data.len() as u64);
    }

    #[tokio::test]
    async fn test_drain_missing_pipe_is_empty() {
        let buffer = drain(None::<&[u8]>, 10).await.unwrap();
        assert!(buffer.kept().is_empty());
        assert!(!buffer.is_truncated());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let codec = TextCodec::for_label("utf-8").unwrap();
        assert_eq!(codec.decode(b"ok\xff\xfeok"), "ok\u{FFFD}\u{FFFD}ok");
    }

    #[test]
    fn test_cut_multibyte_char_becomes_replacement() {
        let mut buffer = BoundedBuffer::new(1);
        buffer.push("é".as_bytes());
        let (text, truncated) = TextCodec::for_label("utf-8").unwrap().finish(&buffer);
        assert!(truncated);
        assert_eq!(text, format!("\u{FFFD}{TRUNCATION_MARKER}"));
    }

    #[test]
    fn test_latin1_round_trip() {
        let codec = TextCodec::for_label("latin1").unwrap();
        let bytes = codec.encode("café").unwrap();
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(codec.decode(&bytes), "café");
    }

    #[test]
    fn test_latin1_label_is_windows_1252() {
        let codec = TextCodec::for_label("latin1").unwrap();
        assert_eq!(codec.name(), "windows-1252");
        assert_eq!(codec.decode(&[0x80]), "\u{20AC}");
    }

    #[test]
    fn test_unencodable_text_rejected() {
        let codec = TextCodec::for_label("latin1").unwrap();
        let err = codec.encode("a\u{65E5}b").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("windows-1252"));
    }

    #[test]
    fn test_utf16_encoding_is_not_utf8() {
        let codec = TextCodec::for_label("utf-16le").unwrap();
        assert_eq!(codec.encode("A").unwrap(), vec![0x41, 0x00]);
    }

    #[test]
    fn test_unknown_label_rejected() {
        let err = TextCodec::for_label("klingon").unwrap_err();
        assert!(err.is_validation());
    }
}
