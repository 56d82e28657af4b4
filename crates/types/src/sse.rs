// crates/types/src/sse.rs
//! Incremental parser for the `text/event-stream` format.
//!
//! - `event: <type>` sets the event type of the frame being built
//! - `data: <text>` appends a data line (multiple lines join with `\n`)
//! - `: <text>` is a comment; a block holding only comments is a keep-alive
//! - an empty line dispatches the frame
//!
//! `id:` and `retry:` fields are accepted and ignored. Bytes may arrive split
//! at any position, including inside a UTF-8 sequence or between `\r` and `\n`.

/// One parsed line of an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    Event(String),
    Data(String),
    Comment(String),
    Other,
    Blank,
}

/// A dispatched block of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if any.
    pub event: Option<String>,
    /// Data lines joined with `\n`. Empty when the block had no data.
    pub data: String,
    /// True when the block carried no event/data field, only comments.
    pub comment_only: bool,
}

impl SseFrame {
    pub fn is_keep_alive(&self) -> bool {
        self.comment_only
    }
}

/// Classify a single line (without its terminator).
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Blank;
    }
    if let Some(comment) = line.strip_prefix(':') {
        return SseLine::Comment(comment.trim_start().to_string());
    }
    let (field, value) = match line.split_once(':') {
        Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
        None => (line, ""),
    };
    match field {
        "event" => SseLine::Event(value.to_string()),
        "data" => SseLine::Data(value.to_string()),
        _ => SseLine::Other,
    }
}

/// Stateful parser fed with raw bytes from the transport.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    saw_comment: bool,
    saw_field: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        loop {
            let Some(pos) = self.buf.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                break;
            };
            // A trailing `\r` may be the first half of `\r\n`; wait for more.
            if self.buf[pos] == b'\r' && pos + 1 == self.buf.len() {
                break;
            }
            let terminator_len = if self.buf[pos] == b'\r' && self.buf[pos + 1] == b'\n' {
                2
            } else {
                1
            };
            let raw: Vec<u8> = self.buf.drain(..pos + terminator_len).take(pos).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(frame) = self.push_line(&line) {
                frames.push(frame);
            }
        }

        frames
    }

    /// Dispatch whatever is pending when the transport closes.
    ///
    /// A block without its terminating blank line is incomplete and is
    /// discarded, matching how browsers treat a truncated stream.
    pub fn finish(&mut self) {
        self.buf.clear();
        self.reset();
    }

    fn push_line(&mut self, line: &str) -> Option<SseFrame> {
        match parse_sse_line(line) {
            SseLine::Blank => self.dispatch(),
            SseLine::Event(name) => {
                self.event = Some(name);
                self.saw_field = true;
                None
            }
            SseLine::Data(data) => {
                self.data.push(data);
                self.saw_field = true;
                None
            }
            SseLine::Comment(_) => {
                self.saw_comment = true;
                None
            }
            SseLine::Other => None,
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let frame = if self.saw_field {
            Some(SseFrame {
                event: self.event.take(),
                data: self.data.join("\n"),
                comment_only: false,
            })
        } else if self.saw_comment {
            Some(SseFrame {
                comment_only: true,
                ..Default::default()
            })
        } else {
            None
        };
        self.reset();
        frame
    }

    fn reset(&mut self) {
        self.event = None;
        self.data.clear();
        self.saw_comment = false;
        self.saw_field = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_sse_line(""), SseLine::Blank);
        assert_eq!(parse_sse_line("event: progress"), SseLine::Event("progress".into()));
        assert_eq!(parse_sse_line("data:{\"a\":1}"), SseLine::Data("{\"a\":1}".into()));
        assert_eq!(parse_sse_line(": heartbeat"), SseLine::Comment("heartbeat".into()));
        assert_eq!(parse_sse_line("id: 7"), SseLine::Other);
        assert_eq!(parse_sse_line("data"), SseLine::Data(String::new()));
    }

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"event: progress\ndata: {\"phase\":\"extracting\"}\n\n");
        assert_eq!(
            frames,
            vec![SseFrame {
                event: Some("progress".into()),
                data: "{\"phase\":\"extracting\"}".into(),
                comment_only: false,
            }]
        );
    }

    #[test]
    fn test_keep_alive_comment() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b": heartbeat\n\n");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_keep_alive());
        assert!(frames[0].event.is_none());
    }

    #[test]
    fn test_chunk_boundaries_anywhere() {
        let text = "event: complete\r\ndata: {\"id\":\"j\",\r\ndata: \"status\":\"failed\"}\r\n\r\n";
        let whole = SseParser::new().feed(text.as_bytes());

        for split in 0..text.len() {
            let mut parser = SseParser::new();
            let mut frames = parser.feed(&text.as_bytes()[..split]);
            frames.extend(parser.feed(&text.as_bytes()[split..]));
            assert_eq!(frames, whole, "split at {split}");
        }
        assert_eq!(whole[0].data, "{\"id\":\"j\",\n\"status\":\"failed\"}");
    }

    #[test]
    fn test_multiple_frames_in_one_chunk() {
        let mut parser = SseParser::new();
        let frames = parser.feed(b"event: progress\ndata: 1\n\n: ping\n\nevent: error\ndata: 2\n\n");
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].data, "1");
        assert!(frames[1].is_keep_alive());
        assert_eq!(frames[2].event.as_deref(), Some("error"));
    }

    #[test]
    fn test_incomplete_frame_discarded_on_finish() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"event: progress\ndata: 1\n").is_empty());
        parser.finish();
        assert!(parser.feed(b"\n").is_empty());
    }

    #[test]
    fn test_blank_lines_without_fields_emit_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"\n\n\n").is_empty());
    }

    proptest::proptest! {
        #[test]
        fn prop_chunking_does_not_change_frames(
            bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256),
            cuts in proptest::collection::vec(0usize..256, 0..8),
        ) {
            let whole = SseParser::new().feed(&bytes);

            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(bytes.len())).collect();
            cuts.sort_unstable();
            let mut parser = SseParser::new();
            let mut frames = Vec::new();
            let mut start = 0;
            for cut in cuts.into_iter().chain(std::iter::once(bytes.len())) {
                frames.extend(parser.feed(&bytes[start..cut]));
                start = cut;
            }
            proptest::prop_assert_eq!(frames, whole);
        }
    }
}
