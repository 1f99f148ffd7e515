use serde_json::Value;

use crate::events::WireEvent;

/// Incremental decoder for newline-delimited JSON bodies.
///
/// Bytes are buffered raw so a UTF-8 sequence split across two chunks is
/// decoded once the whole line is present. One decoder per response body.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feed arbitrary bytes and drain every complete record.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WireEvent> {
        // Only the new bytes can hold a newline the last call did not see.
        let scan_from = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        let Some(last_newline) = self.buffer[scan_from..]
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map(|offset| scan_from + offset)
        else {
            return Vec::new();
        };

        let events = self.buffer[..last_newline]
            .split(|byte| *byte == b'\n')
            .filter_map(decode_line)
            .collect();
        self.buffer.drain(..=last_newline);
        events
    }

    /// Flush a final record that was not newline-terminated.
    ///
    /// Call once the transport reports end of body.
    pub fn finish(&mut self) -> Option<WireEvent> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }

    /// Decode a complete body in one shot, including an unterminated tail.
    pub fn decode_all(input: &str) -> Vec<WireEvent> {
        let mut decoder = Self::default();
        let mut events = decoder.feed(input.as_bytes());
        events.extend(decoder.finish());
        events
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn decode_line(line: &[u8]) -> Option<WireEvent> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(text) {
        Ok(value) => WireEvent::from_value(value),
        Err(error) => {
            tracing::trace!(%error, line = text, "skipping malformed stream record");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NdjsonDecoder;
    use crate::events::WireEvent;

    #[test]
    fn decode_records_incrementally() {
        let mut decoder = NdjsonDecoder::default();

        assert!(decoder.feed(b"{\"type\":\"delta\",\"del").is_empty());
        let events = decoder.feed(b"ta\":\"Hi\"}\n{\"type\":\"assistant_output_end\"}\n");
        assert_eq!(
            events,
            vec![
                WireEvent::Delta {
                    delta: "Hi".to_string()
                },
                WireEvent::AssistantOutputEnd,
            ]
        );
        assert!(decoder.is_empty_buffer());
    }

    #[test]
    fn many_records_in_one_chunk_decode_in_order() {
        let body: String = (0..500)
            .map(|index| format!("{{\"type\":\"delta\",\"delta\":\"{index}\"}}\n"))
            .collect();

        let mut decoder = NdjsonDecoder::default();
        let events = decoder.feed(format!("{body}{{\"type\":\"do").as_bytes());
        assert_eq!(events.len(), 500);
        assert_eq!(
            events[499],
            WireEvent::Delta {
                delta: "499".to_string()
            }
        );
        assert!(!decoder.is_empty_buffer());

        let tail = decoder.feed(b"ne\"}\n");
        assert_eq!(tail.len(), 1);
        assert!(matches!(tail[0], WireEvent::Done { .. }));
        assert!(decoder.is_empty_buffer());
    }

    #[test]
    fn multibyte_characters_split_across_chunks_survive() {
        let record = "{\"type\":\"delta\",\"delta\":\"caf\u{e9} \u{1f6d2}\"}\n".as_bytes();
        let (head, tail) = record.split_at(record.len() - 6);

        let mut decoder = NdjsonDecoder::default();
        assert!(decoder.feed(head).is_empty());
        assert_eq!(
            decoder.feed(tail),
            vec![WireEvent::Delta {
                delta: "caf\u{e9} \u{1f6d2}".to_string()
            }]
        );
    }
}
