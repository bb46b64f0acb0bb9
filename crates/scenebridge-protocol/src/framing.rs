//! Incremental framing of concatenated JSON values.
//!
//! Messages carry no delimiter. The decoder skips inter-message whitespace and
//! asks `serde_json` for one value at the head of the buffer, using its
//! end-of-input classification to separate a truncated message (wait for
//! more bytes) from a malformed one (report and resynchronise).
//!
//! A bare number that ends exactly at the end of the buffer is accepted as
//! complete, since nothing in the buffer says otherwise. Commands are JSON
//! objects, so this never affects protocol traffic.

use serde_json::{Deserializer, Value};
use thiserror::Error;

/// Result of a single decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// One complete value, plus the number of bytes (leading whitespace
    /// included) the caller must drain from the front of its buffer.
    Frame {
        /// Decoded value.
        value: Value,
        /// Bytes consumed from the start of the buffer.
        consumed: usize,
    },
    /// The buffer is empty or holds a valid but unfinished prefix.
    Incomplete,
}

/// Errors raised for bytes that can never become valid JSON.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The buffer holds invalid JSON.
    #[error("malformed message at line {line}, column {column}: {source}")]
    Malformed {
        /// Line reported by the parser.
        line: usize,
        /// Column reported by the parser.
        column: usize,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },
}

const fn is_json_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Attempts to decode exactly one JSON value from the head of `buffer`.
///
/// # Errors
///
/// Returns [`FrameError::Malformed`] when the bytes after any leading
/// whitespace cannot be the prefix of a JSON value.
pub fn decode_frame(buffer: &[u8]) -> Result<Decoded, FrameError> {
    let Some(start) = buffer.iter().position(|byte| !is_json_whitespace(*byte)) else {
        return Ok(Decoded::Incomplete);
    };
    let body = buffer.get(start..).unwrap_or_default();
    let mut stream = Deserializer::from_slice(body).into_iter::<Value>();
    match stream.next() {
        None => Ok(Decoded::Incomplete),
        Some(Ok(value)) => Ok(Decoded::Frame {
            value,
            consumed: start + stream.byte_offset(),
        }),
        Some(Err(error)) if error.is_eof() => Ok(Decoded::Incomplete),
        Some(Err(source)) => Err(FrameError::Malformed {
            line: source.line(),
            column: source.column(),
            source,
        }),
    }
}

/// Receive buffer for one connection.
///
/// Bytes are appended as they arrive; [`FrameDecoder::next_frame`] drains one
/// complete value at a time.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends freshly received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes awaiting decode.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true when only whitespace (or nothing) is buffered.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.buffer.iter().all(|byte| is_json_whitespace(*byte))
    }

    /// Discards everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Removes and returns the next complete value.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A malformed buffer is
    /// discarded before the error is returned so the connection can carry on
    /// with whatever the peer sends next.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Malformed`] when the buffered bytes are not JSON.
    pub fn next_frame(&mut self) -> Result<Option<Value>, FrameError> {
        match decode_frame(&self.buffer) {
            Ok(Decoded::Frame { value, consumed }) => {
                self.buffer.drain(..consumed);
                Ok(Some(value))
            }
            Ok(Decoded::Incomplete) => Ok(None),
            Err(error) => {
                self.buffer.clear();
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn sample() -> Value {
        json!({
            "type": "create_object",
            "params": {
                "name": "Cube \"α\"",
                "location": [1.5, -2, 3e2],
                "tags": {"visible": true, "parent": null}
            }
        })
    }

    #[rstest]
    #[case::empty(b"".as_slice())]
    #[case::whitespace(b" \r\n\t ".as_slice())]
    #[case::open_brace(b"{".as_slice())]
    #[case::partial_key(b"{\"typ".as_slice())]
    #[case::partial_escape(b"{\"type\":\"a\\".as_slice())]
    #[case::partial_literal(b"[tru".as_slice())]
    fn incomplete_input_needs_more_data(#[case] input: &[u8]) {
        let decoded = decode_frame(input).expect("incomplete input is not an error");
        assert_eq!(decoded, Decoded::Incomplete);
    }

    #[test]
    fn malformed_bytes_take_pipelined_frames_with_them() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(br#"{"type":"help"}}{"type":"help"}"#);
        assert_eq!(
            decoder.next_frame().expect("first frame"),
            Some(json!({"type": "help"}))
        );
        assert!(decoder.next_frame().is_err());
        assert_eq!(decoder.buffered_len(), 0);
        assert_eq!(decoder.next_frame().expect("empty buffer"), None);
    }

    #[rstest]
    #[case::garbage(b"not json".as_slice())]
    #[case::bad_token(b"{\"type\": nope}".as_slice())]
    #[case::stray_close(b"}".as_slice())]
    fn malformed_input_is_reported(#[case] input: &[u8]) {
        assert!(matches!(
            decode_frame(input),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn consumed_length_counts_leading_whitespace() {
        let decoded = decode_frame(b"\n  {\"a\":1}{\"b\":2}").expect("decode");
        assert_eq!(
            decoded,
            Decoded::Frame {
                value: json!({"a": 1}),
                consumed: 10,
            }
        );
    }

    #[test]
    fn byte_by_byte_feed_yields_single_value() {
        let encoded = serde_json::to_vec(&sample()).expect("serialise");
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in &encoded {
            decoder.extend(std::slice::from_ref(byte));
            if let Some(value) = decoder.next_frame().expect("decode") {
                frames.push(value);
            }
        }
        assert_eq!(frames, vec![sample()]);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(7)]
    #[case(64)]
    fn chunked_feed_matches_whole_decode(#[case] chunk_size: usize) {
        let encoded = serde_json::to_vec(&sample()).expect("serialise");
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in encoded.chunks(chunk_size) {
            decoder.extend(chunk);
            while let Some(value) = decoder.next_frame().expect("decode") {
                frames.push(value);
            }
        }
        assert_eq!(frames, vec![sample()]);
        assert!(decoder.is_idle());
    }

    #[test]
    fn pipelined_messages_decode_in_order() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"{\"type\":\"help\"}\n{\"type\":\"protocol_version\"} {\"type\":");
        let first = decoder.next_frame().expect("decode").expect("first frame");
        let second = decoder.next_frame().expect("decode").expect("second frame");
        assert_eq!(first, json!({"type": "help"}));
        assert_eq!(second, json!({"type": "protocol_version"}));
        assert!(decoder.next_frame().expect("decode").is_none());

        decoder.extend(b"\"help\"}");
        let third = decoder.next_frame().expect("decode").expect("third frame");
        assert_eq!(third, json!({"type": "help"}));
    }

    #[test]
    fn malformed_buffer_is_discarded() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"{\"type\" 5}");
        assert!(decoder.next_frame().is_err());
        assert_eq!(decoder.buffered_len(), 0);

        decoder.extend(b"{\"type\":\"help\"}");
        let value = decoder.next_frame().expect("decode").expect("frame");
        assert_eq!(value, json!({"type": "help"}));
    }
}
