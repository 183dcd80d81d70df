//! Incremental Server-Sent Events decoding
//!
//! Buffers raw bytes from a chunked response, splits on newlines and yields
//! the payload of `data:` lines. Chunk boundaries may fall anywhere,
//! including inside a multi-byte character.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseFrame {
    Data(String),
    /// The `[DONE]` sentinel
    Done,
}

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every complete frame it finishes
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = parse_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Frame left in the buffer when the body ends without a trailing newline
    pub(crate) fn finish(&mut self) -> Option<SseFrame> {
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&rest)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseFrame> {
    let line = std::str::from_utf8(raw).ok()?.trim();
    let data = line.strip_prefix("data:")?.trim();
    match data {
        "" => None,
        "[DONE]" => Some(SseFrame::Done),
        payload => Some(SseFrame::Data(payload.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        assert_eq!(
            decoder.push(b":1}\n\ndata: [DONE]\n"),
            vec![SseFrame::Data("{\"a\":1}".to_string()), SseFrame::Done]
        );
    }

    #[test]
    fn comments_and_other_fields_are_skipped() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": keep-alive\r\nevent: message\r\ndata: x\r\n");
        assert_eq!(frames, vec![SseFrame::Data("x".to_string())]);
    }

    #[test]
    fn multibyte_character_split_between_chunks() {
        let text = "data: caf\u{e9}\n".as_bytes();
        let (head, tail) = text.split_at(text.len() - 2);
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec![SseFrame::Data("caf\u{e9}".to_string())]);
    }

    #[test]
    fn trailing_frame_without_newline() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some(SseFrame::Data("tail".to_string())));
        assert_eq!(decoder.finish(), None);
    }
}
