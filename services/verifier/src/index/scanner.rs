//! Streaming message segmentation of the original log
//!
//! The log is read in fixed-size chunks; only the bytes of the message being
//! assembled (plus a few lookbehind bytes) are carried between reads.

use codec::{find_message_start, trim_segment, BEGIN_STRING};
use std::io::{self, ErrorKind, Read};

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// One message as found in the log: trimmed bytes and their file offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub offset: u64,
    pub bytes: &'a [u8],
}

pub struct SegmentScanner<R> {
    reader: R,
    chunk_size: usize,
    buf: Vec<u8>,
    /// File offset of `buf[0]`
    base: u64,
    /// `buf[0]` is the start of a message
    in_message: bool,
    search_from: usize,
    /// Bytes of the segment returned last, dropped on the next call
    consumed: usize,
    eof: bool,
}

impl<R: Read> SegmentScanner<R> {
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(BEGIN_STRING.len()),
            buf: Vec::with_capacity(chunk_size),
            base: 0,
            in_message: false,
            search_from: 0,
            consumed: 0,
            eof: false,
        }
    }

    /// Next message segment, or `None` once the log is exhausted
    pub fn next_segment(&mut self) -> io::Result<Option<Segment<'_>>> {
        self.discard(self.consumed);
        self.consumed = 0;

        loop {
            if !self.in_message {
                match find_message_start(&self.buf, self.search_from) {
                    Some(start) => {
                        self.discard(start);
                        self.in_message = true;
                        self.search_from = BEGIN_STRING.len();
                    }
                    None if self.eof => {
                        self.discard(self.buf.len());
                        self.search_from = 0;
                        return Ok(None);
                    }
                    None => {
                        // Keep a possible partial `8=FIX` plus one lookbehind byte
                        let keep = self.buf.len().min(BEGIN_STRING.len());
                        let dropped = self.buf.len() - keep;
                        if dropped > 0 {
                            self.discard(dropped);
                            self.search_from = 1;
                        }
                        self.fill()?;
                    }
                }
                continue;
            }

            match find_message_start(&self.buf, self.search_from) {
                Some(next) => {
                    let end = cut_to_line_start(&self.buf, next);
                    self.consumed = next;
                    self.in_message = true;
                    self.search_from = BEGIN_STRING.len();
                    return Ok(Some(self.segment(end)));
                }
                None if self.eof => {
                    let end = self.buf.len();
                    self.consumed = end;
                    self.in_message = false;
                    self.search_from = 0;
                    return Ok(Some(self.segment(end)));
                }
                None => {
                    self.search_from = self
                        .buf
                        .len()
                        .saturating_sub(BEGIN_STRING.len() - 1)
                        .max(BEGIN_STRING.len());
                    self.fill()?;
                }
            }
        }
    }

    fn segment(&self, end: usize) -> Segment<'_> {
        Segment {
            offset: self.base,
            bytes: trim_segment(&self.buf[..end]),
        }
    }

    fn discard(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.buf.drain(..n);
        self.base += n as u64;
    }

    fn fill(&mut self) -> io::Result<()> {
        let len = self.buf.len();
        self.buf.resize(len + self.chunk_size, 0);
        let read = loop {
            match self.reader.read(&mut self.buf[len..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(len);
                    return Err(e);
                }
            }
        };
        self.buf.truncate(len + read);
        if read == 0 {
            self.eof = true;
        }
        Ok(())
    }
}

/// When the next message starts mid-line, the text before it on that line is
/// a log prefix: end the current segment at the last line break instead.
fn cut_to_line_start(buf: &[u8], next: usize) -> usize {
    match buf[next - 1] {
        b'\n' | b'\r' => next,
        _ => buf[..next]
            .iter()
            .rposition(|&b| b == b'\n')
            .unwrap_or(next),
    }
}
