//! The HTTP/1.x object encoder (spec.md §4.2): mirrors the decoder's state
//! machine on the write side, and carries the sanitization hook that
//! strips body-framing headers from responses that must not carry a body.
//!
//! Grounded on the teacher's `src/base_serializer.rs` (`MessageState`,
//! header-buffer size estimation) and `src/server/encoder.rs`.

use bytes::{BufMut, BytesMut};

use crate::decoder::{BodyLength, Role};
use crate::error::EncodeError;
use crate::headers::HeaderMap;
use crate::method::Method;
use crate::request_target::RequestTarget;
use crate::status::Status;
use crate::version::Version;

/// Exponential moving average of header-block sizes, used to size the next
/// head buffer's initial capacity without over- or under-allocating
/// (weight matches the teacher's `base_serializer` estimator).
#[derive(Debug, Clone)]
pub struct HeaderSizeEstimator {
    avg: f64,
}

impl HeaderSizeEstimator {
    const WEIGHT: f64 = 0.2;

    pub fn new() -> HeaderSizeEstimator {
        HeaderSizeEstimator { avg: 512.0 }
    }

    pub fn update(&mut self, actual: usize) {
        self.avg = self.avg * (1.0 - Self::WEIGHT) + actual as f64 * Self::WEIGHT;
    }

    pub fn estimate(&self) -> usize {
        self.avg.ceil() as usize
    }
}

impl Default for HeaderSizeEstimator {
    fn default() -> Self {
        HeaderSizeEstimator::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    ContentNonChunk(u64),
    ContentChunk,
    ContentAlwaysEmpty,
    ContentUntilClose,
}

/// Incremental HTTP/1.x encoder. One instance per connection direction,
/// reused across every message written on it (so the header-size estimator
/// stays warm and, for response encoders, `push_method`/`next_method`
/// track which request each response answers).
pub struct Encoder {
    role: Role,
    state: State,
    estimator: HeaderSizeEstimator,
}

impl Encoder {
    pub fn new(role: Role) -> Encoder {
        Encoder { role, state: State::Init, estimator: HeaderSizeEstimator::new() }
    }

    /// Encodes a request line and headers. `headers` must already declare
    /// the body framing the caller intends to use (`Content-Length` or
    /// `Transfer-Encoding: chunked`); omitting both yields an always-empty
    /// request.
    pub fn encode_request_head(
        &mut self,
        method: &Method,
        target: &RequestTarget,
        version: Version,
        headers: &HeaderMap,
    ) -> Result<BytesMut, EncodeError> {
        assert_eq!(self.role, Role::Request);
        let mode = body_mode_from_headers(headers)?;
        let mut buf = BytesMut::with_capacity(self.estimator.estimate());
        buf.extend_from_slice(method.as_str().as_bytes());
        buf.put_u8(b' ');
        buf.extend_from_slice(target.to_string().as_bytes());
        buf.put_u8(b' ');
        buf.extend_from_slice(version.to_string().as_bytes());
        buf.extend_from_slice(b"\r\n");
        write_headers(&mut buf, headers);
        buf.extend_from_slice(b"\r\n");
        self.estimator.update(buf.len());
        self.state = state_for(mode);
        Ok(buf)
    }

    /// Encodes a status line and headers, sanitizing away any
    /// `Content-Length`/`Transfer-Encoding` the caller supplied when the
    /// response must not carry a body: 1xx/204/304 (`Status::always_bodyless`),
    /// any response to a `HEAD` request, and 2xx responses to `CONNECT`
    /// (spec.md §4.2, resolving open question (c) the same way the decoder
    /// does).
    pub fn encode_response_head(
        &mut self,
        status: &Status,
        version: Version,
        mut headers: HeaderMap,
        request_method: &Method,
    ) -> Result<BytesMut, EncodeError> {
        assert_eq!(self.role, Role::Response);
        let force_empty = status.always_bodyless()
            || request_method.is_head()
            || (request_method.is_connect() && status.code() / 100 == 2);

        let mode = if force_empty {
            sanitize_framing_headers(&mut headers);
            BodyLength::AlwaysEmpty
        } else {
            body_mode_from_headers(&headers)?
        };

        let mut buf = BytesMut::with_capacity(self.estimator.estimate());
        buf.extend_from_slice(version.to_string().as_bytes());
        buf.put_u8(b' ');
        buf.extend_from_slice(status.code().to_string().as_bytes());
        buf.put_u8(b' ');
        buf.extend_from_slice(status.reason().as_bytes());
        buf.extend_from_slice(b"\r\n");
        write_headers(&mut buf, &headers);
        buf.extend_from_slice(b"\r\n");
        self.estimator.update(buf.len());
        self.state = match mode {
            BodyLength::UntilClose => State::ContentUntilClose,
            other => state_for(other),
        };
        Ok(buf)
    }

    /// Writes one chunk of body content, applying chunk framing if the
    /// message was declared chunked.
    pub fn write_body_chunk(&mut self, buf: &mut BytesMut, chunk: &[u8]) -> Result<(), EncodeError> {
        match self.state {
            State::ContentAlwaysEmpty => {
                if !chunk.is_empty() {
                    return Err(EncodeError::BodyNotAllowed);
                }
                Ok(())
            }
            State::ContentNonChunk(remaining) => {
                if chunk.len() as u64 > remaining {
                    return Err(EncodeError::ContentOverflow);
                }
                buf.extend_from_slice(chunk);
                self.state = State::ContentNonChunk(remaining - chunk.len() as u64);
                Ok(())
            }
            State::ContentChunk => {
                if !chunk.is_empty() {
                    buf.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
                    buf.extend_from_slice(chunk);
                    buf.extend_from_slice(b"\r\n");
                }
                Ok(())
            }
            State::ContentUntilClose => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            State::Init => Err(EncodeError::BodyNotAllowed),
        }
    }

    /// Finalizes the current message's body, writing the terminating
    /// zero-size chunk and any trailers if the message was chunked.
    pub fn finish_body(
        &mut self,
        buf: &mut BytesMut,
        trailers: Option<&HeaderMap>,
    ) -> Result<(), EncodeError> {
        match self.state {
            State::ContentNonChunk(0) | State::ContentAlwaysEmpty | State::ContentUntilClose => {
                self.state = State::Init;
                Ok(())
            }
            State::ContentNonChunk(_) => Err(EncodeError::ContentIncomplete),
            State::ContentChunk => {
                buf.extend_from_slice(b"0\r\n");
                if let Some(trailers) = trailers {
                    write_headers(buf, trailers);
                }
                buf.extend_from_slice(b"\r\n");
                self.state = State::Init;
                Ok(())
            }
            State::Init => Ok(()),
        }
    }
}

fn state_for(mode: BodyLength) -> State {
    match mode {
        BodyLength::AlwaysEmpty => State::ContentAlwaysEmpty,
        BodyLength::Fixed(n) => State::ContentNonChunk(n),
        BodyLength::Chunked => State::ContentChunk,
        BodyLength::UntilClose => State::ContentUntilClose,
    }
}

/// Reads the caller-declared framing straight back off the headers they
/// supplied (the encoder trusts the caller here; `decoder::resolve_body_length`
/// is the corresponding untrusting version for inbound messages).
fn body_mode_from_headers(headers: &HeaderMap) -> Result<BodyLength, EncodeError> {
    if let Some(te) = headers.get("transfer-encoding") {
        if crate::headers::is_chunked(te) {
            return Ok(BodyLength::Chunked);
        }
    }
    if let Some(cl) = headers.get("content-length") {
        let s = std::str::from_utf8(cl).unwrap_or("0");
        let n: u64 = s.trim().parse().unwrap_or(0);
        return Ok(BodyLength::Fixed(n));
    }
    Ok(BodyLength::AlwaysEmpty)
}

fn sanitize_framing_headers(headers: &mut HeaderMap) {
    if let Ok(name) = crate::headers::HeaderName::new("Content-Length") {
        headers.remove(&name);
    }
    if let Ok(name) = crate::headers::HeaderName::new("Transfer-Encoding") {
        headers.remove(&name);
    }
}

fn write_headers(buf: &mut BytesMut, headers: &HeaderMap) {
    for (name, value) in headers.iter() {
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value);
        buf.extend_from_slice(b"\r\n");
    }
}
