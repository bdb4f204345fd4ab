//! Accumulates transport fragments into complete messages.

use bytes::BytesMut;

use chainfeed_core::error::StreamError;
use chainfeed_core::message::CompleteMessage;

/// Default cap on a single reassembled message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

/// Reassembles one logical message at a time.
///
/// The buffer is cleared after every yielded message and after every error,
/// so bytes from a failed message never reach the next one.
#[derive(Debug)]
pub struct Reassembler {
    buf: BytesMut,
    max_bytes: usize,
}

impl Reassembler {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_bytes,
        }
    }

    /// Feed one fragment. Returns the complete message when `is_final`.
    pub fn push(
        &mut self,
        fragment: &[u8],
        is_final: bool,
    ) -> Result<Option<CompleteMessage>, StreamError> {
        let size = self.buf.len() + fragment.len();
        if size > self.max_bytes {
            self.reset();
            return Err(StreamError::MessageTooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        if !is_final {
            self.buf.extend_from_slice(fragment);
            return Ok(None);
        }

        let bytes = if self.buf.is_empty() {
            fragment.to_vec()
        } else {
            self.buf.extend_from_slice(fragment);
            self.buf.split().to_vec()
        };
        self.reset();

        let text = String::from_utf8(bytes)?;
        Ok(Some(CompleteMessage::from(text)))
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Bytes buffered for the message in progress.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble_in(text: &str, parts: usize) -> CompleteMessage {
        let bytes = text.as_bytes();
        let chunk = bytes.len().div_ceil(parts).max(1);
        let chunks: Vec<&[u8]> = bytes.chunks(chunk).collect();
        let mut r = Reassembler::default();
        let last = chunks.len() - 1;
        for (i, c) in chunks.iter().enumerate() {
            let out = r.push(c, i == last).unwrap();
            if i < last {
                assert!(out.is_none(), "yielded before final fragment");
            } else {
                return out.unwrap();
            }
        }
        unreachable!()
    }

    #[test]
    fn single_fragment_message() {
        let mut r = Reassembler::default();
        let msg = r.push(b"{\"id\":1}", true).unwrap().unwrap();
        assert_eq!(msg.as_str(), "{\"id\":1}");
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn concatenates_fragments_in_order() {
        let mut r = Reassembler::default();
        assert!(r.push(b"ab", false).unwrap().is_none());
        assert!(r.push(b"cd", false).unwrap().is_none());
        assert_eq!(r.pending_len(), 4);
        let msg = r.push(b"ef", true).unwrap().unwrap();
        assert_eq!(msg.as_str(), "abcdef");
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn fragment_count_does_not_change_content() {
        let text: String = (0..400).map(|i| format!("log-{i};")).collect();
        let whole = reassemble_in(&text, 1);
        assert_eq!(whole.as_str(), text);
        assert_eq!(reassemble_in(&text, 2), whole);
        assert_eq!(reassemble_in(&text, 100), whole);
    }

    #[test]
    fn multibyte_char_split_across_fragments() {
        let text = "mint=\u{1F600}";
        let bytes = text.as_bytes();
        let mut r = Reassembler::default();
        assert!(r.push(&bytes[..7], false).unwrap().is_none());
        let msg = r.push(&bytes[7..], true).unwrap().unwrap();
        assert_eq!(msg.as_str(), text);
    }

    #[test]
    fn consecutive_messages_are_independent() {
        let mut r = Reassembler::default();
        r.push(b"first-", false).unwrap();
        assert_eq!(r.push(b"one", true).unwrap().unwrap().as_str(), "first-one");
        assert_eq!(r.push(b"two", true).unwrap().unwrap().as_str(), "two");
    }

    #[test]
    fn oversized_message_fails_and_resets() {
        let mut r = Reassembler::new(8);
        r.push(b"12345", false).unwrap();
        let err = r.push(b"6789", false).unwrap_err();
        assert!(matches!(err, StreamError::MessageTooLarge { size: 9, limit: 8 }));
        assert_eq!(r.pending_len(), 0);

        // The next message starts clean.
        let msg = r.push(b"ok", true).unwrap().unwrap();
        assert_eq!(msg.as_str(), "ok");
    }

    #[test]
    fn message_exactly_at_limit_is_accepted() {
        let mut r = Reassembler::new(4);
        r.push(b"ab", false).unwrap();
        assert_eq!(r.push(b"cd", true).unwrap().unwrap().as_str(), "abcd");
    }

    #[test]
    fn invalid_utf8_fails_and_resets() {
        let mut r = Reassembler::default();
        r.push(&[0xff, 0xfe], false).unwrap();
        let err = r.push(&[0xfd], true).unwrap_err();
        assert!(matches!(err, StreamError::InvalidUtf8(_)));
        assert_eq!(r.pending_len(), 0);
        assert_eq!(r.push(b"next", true).unwrap().unwrap().as_str(), "next");
    }
}
