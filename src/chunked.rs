//! Chunked transfer-coding parser (RFC 7230 §4.1), grounded on the
//! teacher's `src/chunked.rs` / `src/body_parser.rs`, reworked to read from
//! a `bytes::BytesMut` input buffer instead of `tk_bufstream::Buf`, and to
//! reuse `httparse::parse_chunk_size` exactly as the teacher does.

use bytes::BytesMut;

use crate::error::DecodeError;

/// How far the chunk-framing parser has gotten through one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for (and parsing) the `<size>[;ext]\r\n` line.
    Size,
    /// Reading `remaining` bytes of chunk data.
    Data { remaining: u64 },
    /// Waiting for the CRLF that terminates a chunk's data.
    DataTerminator,
    /// Reading trailer header lines after the zero-size chunk.
    Trailers,
    /// All chunks and trailers consumed.
    Done,
}

/// Incremental state for decoding one chunked body. Call `parse` each time
/// more bytes are available; it consumes bytes from the front of `buf` and
/// reports how many bytes of chunk *data* (not framing) became available.
pub struct State {
    phase: Phase,
    max_chunk_size: usize,
}

/// One parse step's outcome.
pub enum Progress {
    /// `len` bytes of chunk data are now available at the front of the
    /// buffer; the caller should drain them as body content.
    Data(usize),
    /// The chunked body (including trailers) is fully decoded; `trailer`
    /// is the raw trailer header block, not yet parsed into a `HeaderMap`.
    Done { trailer: Vec<u8> },
    /// Not enough bytes buffered yet to make progress.
    NeedMore,
}

impl State {
    pub fn new(max_chunk_size: usize) -> State {
        State { phase: Phase::Size, max_chunk_size }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// The spec.md §4.1 state name matching this phase, for the decoder's
    /// `state_name` introspection.
    pub(crate) fn label(&self) -> &'static str {
        match self.phase {
            Phase::Size => "ReadChunkSize",
            Phase::Data { .. } => "ReadChunkedContent",
            Phase::DataTerminator => "ReadChunkDelimiter",
            Phase::Trailers => "ReadChunkFooter",
            Phase::Done => "ReadChunkFooter",
        }
    }

    /// Advances the parse by inspecting (but not necessarily consuming all
    /// of) `buf`. Consumed framing bytes are removed from the front of
    /// `buf`; data bytes are left in place and reported via `Progress::Data`
    /// so the caller can move them into the content buffer itself.
    pub fn parse(&mut self, buf: &mut BytesMut, trailer_scratch: &mut Vec<u8>)
        -> Result<Progress, DecodeError>
    {
        loop {
            match self.phase {
                Phase::Size => {
                    match httparse::parse_chunk_size(buf) {
                        Ok(httparse::Status::Complete((consumed, size))) => {
                            if size as usize > self.max_chunk_size {
                                return Err(DecodeError::BadChunkSize);
                            }
                            let _ = buf.split_to(consumed);
                            if size == 0 {
                                self.phase = Phase::Trailers;
                            } else {
                                self.phase = Phase::Data { remaining: size };
                            }
                        }
                        Ok(httparse::Status::Partial) => return Ok(Progress::NeedMore),
                        Err(_) => return Err(DecodeError::BadChunkSize),
                    }
                }
                Phase::Data { remaining } => {
                    if buf.is_empty() {
                        return Ok(Progress::NeedMore);
                    }
                    let avail = buf.len() as u64;
                    let take = avail.min(remaining) as usize;
                    self.phase = if remaining as usize == take {
                        Phase::DataTerminator
                    } else {
                        Phase::Data { remaining: remaining - take as u64 }
                    };
                    return Ok(Progress::Data(take));
                }
                Phase::DataTerminator => {
                    if buf.len() < 2 {
                        return Ok(Progress::NeedMore);
                    }
                    if &buf[..2] != b"\r\n" {
                        return Err(DecodeError::BadChunkTerminator);
                    }
                    let _ = buf.split_to(2);
                    self.phase = Phase::Size;
                }
                Phase::Trailers => {
                    // Trailers end with an empty line (bare CRLF).
                    if let Some(pos) = find_double_crlf_or_single(buf) {
                        let (consumed, had_trailer) = pos;
                        if had_trailer {
                            trailer_scratch.extend_from_slice(&buf[..consumed]);
                        }
                        let _ = buf.split_to(consumed);
                        self.phase = Phase::Done;
                        return Ok(Progress::Done {
                            trailer: std::mem::take(trailer_scratch),
                        });
                    }
                    return Ok(Progress::NeedMore);
                }
                Phase::Done => return Ok(Progress::Done { trailer: Vec::new() }),
            }
        }
    }
}

/// Finds the end of the trailer section: either an immediate `\r\n` (no
/// trailers) or a full header block terminated by `\r\n\r\n`. Returns
/// `(bytes_to_consume, had_trailer)`.
fn find_double_crlf_or_single(buf: &[u8]) -> Option<(usize, bool)> {
    if buf.len() >= 2 && &buf[..2] == b"\r\n" {
        return Some((2, false));
    }
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i + 4, true))
}
