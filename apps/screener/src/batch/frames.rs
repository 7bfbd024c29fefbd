//! Incremental decoder for the `data: `-prefixed, newline-delimited frames of the
//! batch progress stream.
//!
//! Chunks from the network may split a frame anywhere, so bytes are buffered until
//! a newline arrives. Only `data:` lines carry payloads; other SSE fields, comments
//! and blank lines are skipped. A payload that does not decode into a
//! [`ProgressEvent`] is dropped and counted, never propagated as an error.

use tracing::warn;

use crate::batch::events::ProgressEvent;

const DATA_PREFIX: &str = "data:";
const MAX_SCORE: u32 = 100;
/// Longest line kept in memory while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    dropped: u64,
    max_line: usize,
    /// Skipping the tail of an over-long line until its newline.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            dropped: 0,
            max_line,
            discarding: false,
        }
    }

    /// Feeds a chunk and returns every event completed by it, in stream order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ProgressEvent> {
        let mut chunk = chunk;
        if self.discarding {
            match chunk.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return Vec::new(),
            }
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            let end = consumed + offset;
            let line = self.buffer[consumed..end].to_vec();
            consumed = end + 1;
            if line.len() > self.max_line {
                self.drop_oversized();
                continue;
            }
            if let Some(event) = self.decode_line(&line) {
                events.push(event);
            }
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_line {
            self.buffer.clear();
            self.discarding = true;
            self.drop_oversized();
        }
        events
    }

    /// Decodes whatever is left once the stream has ended (a final line without a newline).
    pub fn finish(&mut self) -> Option<ProgressEvent> {
        self.discarding = false;
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    /// Number of `data:` frames dropped because their payload was malformed.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<ProgressEvent> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(_) => {
                if raw.starts_with(DATA_PREFIX.as_bytes()) {
                    self.drop_frame("payload is not valid UTF-8");
                }
                return None;
            }
        };

        let payload = line.strip_prefix(DATA_PREFIX)?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload).trim_end();
        if payload.is_empty() {
            return None;
        }

        match serde_json::from_str::<ProgressEvent>(payload) {
            Ok(ProgressEvent::Result(result)) if result.score > MAX_SCORE => {
                self.drop_frame(&format!(
                    "score {} for {} is out of range",
                    result.score, result.filename
                ));
                None
            }
            Ok(event) => Some(event),
            Err(e) => {
                self.drop_frame(&e.to_string());
                None
            }
        }
    }

    fn drop_oversized(&mut self) {
        let reason = format!("line exceeds {} bytes", self.max_line);
        self.drop_frame(&reason);
    }

    fn drop_frame(&mut self, reason: &str) {
        self.dropped += 1;
        warn!(dropped = self.dropped, "Dropping malformed progress frame: {reason}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_line(index: u32, score: u32) -> String {
        format!(
            "data: {{\"type\":\"result\",\"index\":{index},\"filename\":\"r{index}.pdf\",\"score\":{score}}}\n"
        )
    }

    #[test]
    fn test_decodes_complete_lines() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(b"data: {\"type\":\"start\",\"total\":2}\n\n");
        assert_eq!(events, vec![ProgressEvent::Start { total: 2 }]);
        assert_eq!(decoder.dropped_frames(), 0);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();
        let line = result_line(1, 80);
        let (a, b) = line.as_bytes().split_at(17);

        assert!(decoder.push(a).is_empty());
        let events = decoder.push(b);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "result");
    }

    #[test]
    fn test_malformed_frame_is_dropped_and_counted() {
        let mut decoder = FrameDecoder::new();
        let chunk = format!("{}data: {{not json\n{}", result_line(1, 80), result_line(2, 40));

        let events = decoder.push(chunk.as_bytes());
        assert_eq!(events.len(), 2);
        assert_eq!(decoder.dropped_frames(), 1);
    }

    #[test]
    fn test_crlf_and_prefix_without_space() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(b"data:{\"type\":\"start\",\"total\":1}\r\n");
        assert_eq!(events, vec![ProgressEvent::Start { total: 1 }]);
    }

    #[test]
    fn test_non_data_fields_and_comments_ignored() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(b": keep-alive\nevent: progress\nid: 7\nretry: 1000\n\n");
        assert!(events.is_empty());
        assert_eq!(decoder.dropped_frames(), 0);
    }

    #[test]
    fn test_out_of_range_score_dropped() {
        let mut decoder = FrameDecoder::new();
        let events = decoder.push(result_line(1, 150).as_bytes());
        assert!(events.is_empty());
        assert_eq!(decoder.dropped_frames(), 1);
    }

    #[test]
    fn test_finish_decodes_trailing_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder
            .push(b"data: {\"type\":\"complete\",\"session_id\":\"s1\",\"processed\":0}")
            .is_empty());
        assert!(matches!(decoder.finish(), Some(ProgressEvent::Complete(_))));
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_unknown_event_type_counts_as_malformed() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"heartbeat\"}\n").is_empty());
        assert_eq!(decoder.dropped_frames(), 1);
    }

    #[test]
    fn test_line_without_newline_is_capped() {
        let mut decoder = FrameDecoder::with_max_line(100);
        let filler = vec![b'x'; 120];
        decoder.push(b"data: ");
        assert!(decoder.push(&filler).is_empty());
        assert_eq!(decoder.dropped_frames(), 1);

        // The rest of the oversized line is skipped; the next frame decodes.
        assert!(decoder.push(&filler).is_empty());
        let events = decoder.push(format!("xx\n{}", result_line(1, 80)).as_bytes());
        assert_eq!(events.len(), 1);
        assert_eq!(decoder.dropped_frames(), 1);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_oversized_complete_line_is_dropped() {
        let mut decoder = FrameDecoder::with_max_line(32);
        let chunk = format!("{}{}", result_line(1, 80), result_line(2, 40));
        assert!(decoder.push(chunk.as_bytes()).is_empty());
        assert_eq!(decoder.dropped_frames(), 2);
    }
}
