use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;

// -----------------------------------------------------------------------------
// ----- Frame -----------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// Complete line that is not valid UTF-8.
    NotUtf8,
    /// Line longer than the limit. Its bytes are dropped as they arrive and
    /// the frame is yielded once the terminating newline shows up.
    TooLong,
}

// -----------------------------------------------------------------------------
// ----- RequestCodec ----------------------------------------------------------

/// Newline-delimited decoder that never fails on content: bad lines become
/// frames so the connection can answer them and keep going. Buffered bytes
/// never exceed `max_length` plus one read.
#[derive(Debug)]
pub struct RequestCodec {
    max_length: usize,
    // Bytes before this offset are known to hold no newline.
    next_index: usize,
    discarding: bool,
}

impl RequestCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LINE_LENGTH)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RequestCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        let newline = buf[self.next_index..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.next_index + offset);

        if self.discarding {
            return Ok(match newline {
                Some(end) => {
                    buf.advance(end + 1);
                    self.next_index = 0;
                    self.discarding = false;
                    Some(Frame::TooLong)
                }
                None => {
                    buf.clear();
                    self.next_index = 0;
                    None
                }
            });
        }

        match newline {
            Some(end) if end > self.max_length => {
                buf.advance(end + 1);
                self.next_index = 0;
                Ok(Some(Frame::TooLong))
            }
            Some(end) => {
                let line = buf.split_to(end + 1);
                self.next_index = 0;
                Ok(Some(to_frame(&line[..end])))
            }
            None if buf.len() > self.max_length => {
                buf.clear();
                self.next_index = 0;
                self.discarding = true;
                Ok(None)
            }
            None => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        // Unterminated tail at EOF.
        self.next_index = 0;
        if std::mem::take(&mut self.discarding) {
            buf.clear();
            return Ok(Some(Frame::TooLong));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        let tail = buf.split();
        Ok(Some(to_frame(&tail)))
    }
}

fn to_frame(line: &[u8]) -> Frame {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    match std::str::from_utf8(line) {
        Ok(text) => Frame::Line(text.to_owned()),
        Err(_) => Frame::NotUtf8,
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
