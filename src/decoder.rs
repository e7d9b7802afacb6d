//! The HTTP/1.x object decoder (spec.md §4.1): an incremental state machine
//! that turns bytes from the wire into `Head`/`ContentEvent` pairs.
//!
//! Grounded on the teacher's `src/server/codec.rs` (state names, limits)
//! and `src/body_parser.rs` (body-length resolution order), reworked to
//! read from a `bytes::BytesMut` instead of `tk_bufstream::Buf` and to use
//! `httparse` directly rather than the teacher's now-stale `tokio_proto`
//! request/response scaffolding.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::chunked;
use crate::error::DecodeError;
use crate::headers::{self, HeaderMap, HeaderName};
use crate::message::{ContentEvent, Head};
use crate::method::Method;
use crate::request_target::RequestTarget;
use crate::status::Status;
use crate::version::Version;

/// Which side of the connection this decoder instance is reading.
///
/// A `Response` decoder must be told, via `push_method`, the method of
/// each request that was sent on this connection (in order) so it can
/// apply the HEAD/CONNECT always-empty rules (spec.md §4.1 rule 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Request,
    Response,
}

/// Tunable limits and feature toggles for one decoder instance
/// (spec.md §4.1 "Config").
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub max_initial_line: usize,
    pub max_header_bytes: usize,
    pub max_chunk_size: usize,
    pub initial_buffer_size: usize,
    pub chunked_supported: bool,
}

impl Default for DecoderConfig {
    fn default() -> DecoderConfig {
        DecoderConfig {
            max_initial_line: 4096,
            max_header_bytes: 8192,
            max_chunk_size: 8192,
            initial_buffer_size: 2048,
            chunked_supported: true,
        }
    }
}

/// The body-framing rule selected for one message, per the resolution
/// algorithm in spec.md §4.1 rule 4 / RFC 7230 §3.3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    /// No body is permitted on the wire at all.
    AlwaysEmpty,
    /// Exactly `n` bytes of body follow.
    Fixed(u64),
    /// Body is framed with the chunked transfer-coding.
    Chunked,
    /// Body runs until the connection closes (response-only default).
    UntilClose,
}

/// A FIFO of request methods, used by a `Response`-role decoder to apply
/// method-dependent always-empty rules in request/response order. Callers
/// push the method of every request as it is sent, and the decoder pops
/// one entry per response head it parses.
#[derive(Debug, Clone, Default)]
pub struct MethodQueue {
    queue: VecDeque<Method>,
}

impl MethodQueue {
    pub fn new() -> MethodQueue {
        MethodQueue { queue: VecDeque::new() }
    }

    pub fn push(&mut self, method: Method) {
        self.queue.push_back(method);
    }

    fn pop(&mut self) -> Option<Method> {
        self.queue.pop_front()
    }
}

/// One decoded item. A full message is `Head` followed by zero or more
/// `Content(Chunk(_))` events and exactly one `Content(LastChunk { .. })`.
#[derive(Debug, Clone)]
pub enum Decoded {
    Head(Head),
    Content(ContentEvent),
}

#[derive(Debug)]
enum State {
    SkipControlChars,
    ReadInitial,
    ReadHeader,
    ReadVariableContent,
    ReadFixedContent(u64),
    Chunked(chunked::State),
    BadMessage,
    Upgraded,
}

/// Incremental HTTP/1.x decoder. Feed it bytes via `decode`, which drains
/// bytes from the front of `buf` and returns at most one `Decoded` item per
/// call; call it again (after appending more bytes, if `Ok(None)` was
/// returned) to continue.
pub struct Decoder {
    role: Role,
    config: DecoderConfig,
    state: State,
    methods: MethodQueue,
    current_method: Option<Method>,
    pending: VecDeque<Decoded>,
    header_count_limit: usize,
}

impl Decoder {
    pub fn new(role: Role, config: DecoderConfig) -> Decoder {
        Decoder {
            role,
            config,
            state: State::SkipControlChars,
            methods: MethodQueue::new(),
            current_method: None,
            pending: VecDeque::new(),
            header_count_limit: 128,
        }
    }

    /// Registers the method of the next request sent on this connection.
    /// Only meaningful (and required) for `Role::Response` decoders.
    pub fn push_method(&mut self, method: Method) {
        self.methods.push(method);
    }

    /// A human-readable label for the current state, matching the state
    /// names in spec.md §4.1 (used for diagnostics/logging, never matched
    /// on by callers).
    pub fn state_name(&self) -> &'static str {
        match self.state {
            State::SkipControlChars => "SkipControlChars",
            State::ReadInitial => "ReadInitial",
            State::ReadHeader => "ReadHeader",
            State::ReadVariableContent => "ReadVariableContent",
            State::ReadFixedContent(_) => "ReadFixedContent",
            State::Chunked(ref s) => s.label(),
            State::BadMessage => "BadMessage",
            State::Upgraded => "Upgraded",
        }
    }

    pub fn is_upgraded(&self) -> bool {
        matches!(self.state, State::Upgraded)
    }

    /// Tells a `ReadVariableContent` (read-to-EOF) decoder that the
    /// underlying connection closed, flushing the trailing `LastChunk`.
    /// Only valid to call when the decoder has nothing left to parse.
    pub fn notify_eof(&mut self) -> Result<Option<Decoded>, DecodeError> {
        match self.state {
            State::ReadVariableContent => {
                self.state = State::SkipControlChars;
                Ok(Some(Decoded::Content(ContentEvent::LastChunk {
                    trailers: HeaderMap::new(),
                })))
            }
            State::ReadHeader => {
                self.state = State::BadMessage;
                Err(DecodeError::PrematureClose)
            }
            _ => Ok(None),
        }
    }

    /// Drains bytes the decoder has no further use for once it has handed
    /// off to an upgraded protocol (spec.md §4.6).
    pub fn take_upgraded_bytes(&mut self, buf: &mut BytesMut) -> Bytes {
        buf.split().freeze()
    }

    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Decoded>, DecodeError> {
        if let Some(item) = self.pending.pop_front() {
            return Ok(Some(item));
        }
        loop {
            match self.state {
                State::BadMessage => return Err(DecodeError::BadMessage),
                State::Upgraded => {
                    // Once upgraded, the decoder no longer parses: it just
                    // hands remaining bytes through as opaque chunks
                    // (spec.md §4.1). `take_upgraded_bytes` offers the same
                    // bytes to a caller that prefers to pull them directly
                    // rather than drive them through `decode`.
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let chunk = buf.split().freeze();
                    return Ok(Some(Decoded::Content(ContentEvent::Chunk(chunk))));
                }
                State::SkipControlChars => {
                    let mut skip = 0;
                    while skip < buf.len() && matches!(buf[skip], b'\r' | b'\n') {
                        skip += 1;
                    }
                    if skip > 0 {
                        let _ = buf.split_to(skip);
                    }
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    self.state = State::ReadInitial;
                }
                State::ReadInitial | State::ReadHeader => {
                    if !buf.is_empty() {
                        self.state = State::ReadHeader;
                    }
                    // Enforce the initial-line length ceiling independent of
                    // `httparse`'s own partial/complete result, since a
                    // too-long line that has terminated is still a
                    // violation and one that hasn't terminated yet should
                    // fail fast instead of waiting for more bytes that will
                    // never arrive within budget (spec.md §4.1 limits).
                    match buf.iter().position(|&b| b == b'\n') {
                        Some(nl) if nl > self.config.max_initial_line => {
                            self.state = State::BadMessage;
                            return Err(DecodeError::InitialLineTooLong);
                        }
                        None if buf.len() > self.config.max_initial_line => {
                            self.state = State::BadMessage;
                            return Err(DecodeError::InitialLineTooLong);
                        }
                        _ => {}
                    }
                    match self.parse_head(buf)? {
                        None => {
                            if buf.len() > self.config.max_header_bytes {
                                self.state = State::BadMessage;
                                return Err(DecodeError::HeadersTooLong);
                            }
                            return Ok(None);
                        }
                        Some((consumed, head)) => {
                            let _ = buf.split_to(consumed);
                            self.enter_body_state(&head)?;
                            self.pending.push_back(Decoded::Head(head));
                            if let Some(item) = self.pending.pop_front() {
                                return Ok(Some(item));
                            }
                        }
                    }
                }
                State::ReadFixedContent(remaining) => {
                    if remaining == 0 {
                        self.state = State::SkipControlChars;
                        return Ok(Some(Decoded::Content(ContentEvent::LastChunk {
                            trailers: HeaderMap::new(),
                        })));
                    }
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let take = (buf.len() as u64).min(remaining) as usize;
                    let chunk = buf.split_to(take).freeze();
                    self.state = State::ReadFixedContent(remaining - take as u64);
                    return Ok(Some(Decoded::Content(ContentEvent::Chunk(chunk))));
                }
                State::ReadVariableContent => {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let chunk = buf.split().freeze();
                    return Ok(Some(Decoded::Content(ContentEvent::Chunk(chunk))));
                }
                State::Chunked(ref mut chunk_state) => {
                    let mut trailer_scratch = Vec::new();
                    match chunk_state.parse(buf, &mut trailer_scratch) {
                        Ok(chunked::Progress::NeedMore) => return Ok(None),
                        Ok(chunked::Progress::Data(n)) => {
                            let chunk = buf.split_to(n).freeze();
                            return Ok(Some(Decoded::Content(ContentEvent::Chunk(chunk))));
                        }
                        Ok(chunked::Progress::Done { trailer }) => {
                            let trailers = parse_trailer_block(&trailer)?;
                            self.state = State::SkipControlChars;
                            return Ok(Some(Decoded::Content(ContentEvent::LastChunk {
                                trailers,
                            })));
                        }
                        Err(e) => {
                            self.state = State::BadMessage;
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    fn parse_head(&mut self, buf: &BytesMut) -> Result<Option<(usize, Head)>, DecodeError> {
        let mut raw_headers = vec![httparse::EMPTY_HEADER; self.header_count_limit];
        match self.role {
            Role::Request => {
                let mut req = httparse::Request::new(&mut raw_headers);
                match req.parse(buf) {
                    Ok(httparse::Status::Complete(n)) => {
                        let method_str = req.method.ok_or(DecodeError::InvalidInitialLine)?;
                        let path = req.path.ok_or(DecodeError::InvalidInitialLine)?;
                        let version_byte = req.version.ok_or(DecodeError::InvalidInitialLine)?;
                        let method = Method::parse(method_str);
                        let target = RequestTarget::parse(path, method.is_connect())
                            .map_err(|_| DecodeError::InvalidInitialLine)?;
                        let version = Version::from_httparse(version_byte);
                        let headers = build_header_map(req.headers)?;
                        self.current_method = Some(method.clone());
                        Ok(Some((n, Head::Request { method, target, version, headers })))
                    }
                    Ok(httparse::Status::Partial) => Ok(None),
                    Err(_) => Err(DecodeError::InvalidInitialLine),
                }
            }
            Role::Response => {
                let mut resp = httparse::Response::new(&mut raw_headers);
                match resp.parse(buf) {
                    Ok(httparse::Status::Complete(n)) => {
                        let version_byte = resp.version.ok_or(DecodeError::InvalidInitialLine)?;
                        let code = resp.code.ok_or(DecodeError::InvalidInitialLine)?;
                        let reason = resp.reason.unwrap_or("").to_string();
                        let version = Version::from_httparse(version_byte);
                        let status = status_from_code(code, reason);
                        let headers = build_header_map(resp.headers)?;
                        self.current_method = self.methods.pop();
                        Ok(Some((n, Head::Response { version, status, headers })))
                    }
                    Ok(httparse::Status::Partial) => Ok(None),
                    Err(_) => Err(DecodeError::InvalidInitialLine),
                }
            }
        }
    }

    fn enter_body_state(&mut self, head: &Head) -> Result<(), DecodeError> {
        let length = match *head {
            Head::Request { ref method, version, ref headers, .. } => {
                resolve_body_length(
                    self.role, Some(method), None, version, headers,
                    self.config.chunked_supported)?
            }
            Head::Response { version, ref status, ref headers, .. } => {
                if status.code() == 101 {
                    // Only a genuine protocol switch hands the connection
                    // off to opaque framing; an `Upgrade` value naming only
                    // HTTP/1.0 or HTTP/1.1 itself isn't one (spec.md §4.1).
                    let switches_protocol = headers.get("upgrade")
                        .map(headers::upgrade_targets_non_http1)
                        .unwrap_or(false);
                    if switches_protocol {
                        self.state = State::Upgraded;
                        return Ok(());
                    }
                }
                resolve_body_length(
                    self.role, self.current_method.as_ref(), Some(status), version,
                    headers, self.config.chunked_supported)?
            }
        };
        self.state = match length {
            BodyLength::AlwaysEmpty => {
                self.pending.push_back(Decoded::Content(ContentEvent::LastChunk {
                    trailers: HeaderMap::new(),
                }));
                State::SkipControlChars
            }
            BodyLength::Fixed(0) => {
                self.pending.push_back(Decoded::Content(ContentEvent::LastChunk {
                    trailers: HeaderMap::new(),
                }));
                State::SkipControlChars
            }
            BodyLength::Fixed(n) => State::ReadFixedContent(n),
            BodyLength::Chunked => State::Chunked(chunked::State::new(self.config.max_chunk_size)),
            BodyLength::UntilClose => State::ReadVariableContent,
        };
        Ok(())
    }
}

/// Maps an `httparse` status code to the codec's `Status` enum, using the
/// named variant when one exists so callers get exhaustive matches on the
/// common cases, and `Raw` otherwise.
fn status_from_code(code: u16, reason: String) -> Status {
    match code {
        100 => Status::Continue,
        101 => Status::SwitchingProtocols,
        200 => Status::Ok,
        204 => Status::NoContent,
        304 => Status::NotModified,
        400 => Status::BadRequest,
        403 => Status::Forbidden,
        404 => Status::NotFound,
        413 => Status::RequestEntityTooLarge,
        417 => Status::ExpectationFailed,
        426 => Status::UpgradeRequired,
        500 => Status::InternalServerError,
        501 => Status::NotImplemented,
        505 => Status::HttpVersionNotSupported,
        other => Status::Raw(other, reason),
    }
}

fn build_header_map(raw: &[httparse::Header]) -> Result<HeaderMap, DecodeError> {
    let mut map = HeaderMap::new();
    for h in raw {
        if h.name.is_empty() {
            continue;
        }
        let name = HeaderName::new(h.name)?;
        map.append(name, h.value.to_vec())?;
    }
    Ok(map)
}

fn parse_trailer_block(block: &[u8]) -> Result<HeaderMap, DecodeError> {
    if block.is_empty() {
        return Ok(HeaderMap::new());
    }
    let mut raw_headers = vec![httparse::EMPTY_HEADER; 32];
    match httparse::parse_headers(block, &mut raw_headers) {
        Ok(httparse::Status::Complete((_, headers))) => build_header_map(headers),
        _ => Err(DecodeError::InvalidInitialLine),
    }
}

/// Implements the body-length resolution order from RFC 7230 §3.3.3, as
/// named in spec.md §4.1 rule 4:
///
/// 1. Always-empty cases (HEAD response, 1xx/204/304, CONNECT 2xx response).
/// 2. `Transfer-Encoding: chunked` (rejecting a `Content-Length` alongside
///    it, since the combination is a request-smuggling vector).
/// 3. `Content-Length`.
/// 4. Role-dependent default: zero for requests, read-to-close for
///    responses.
fn resolve_body_length(
    role: Role,
    method: Option<&Method>,
    status: Option<&Status>,
    version: Version,
    headers: &HeaderMap,
    chunked_supported: bool,
) -> Result<BodyLength, DecodeError> {
    if role == Role::Response {
        if let Some(status) = status {
            if status.always_bodyless() {
                return Ok(BodyLength::AlwaysEmpty);
            }
            if let Some(Method::Head) = method {
                return Ok(BodyLength::AlwaysEmpty);
            }
            if let Some(Method::Connect) = method {
                if status.code() / 100 == 2 {
                    return Ok(BodyLength::AlwaysEmpty);
                }
            }
        }
    }

    let te = headers.get("transfer-encoding");
    let cl = headers.get("content-length");

    if let Some(te) = te {
        if !chunked_supported || version.is_http10() {
            return Err(DecodeError::BadTransferEncoding);
        }
        if !headers::is_chunked(last_coding(te)) {
            return Err(DecodeError::BadTransferEncoding);
        }
        if cl.is_some() {
            return Err(DecodeError::BadTransferEncoding);
        }
        return Ok(BodyLength::Chunked);
    }

    if let Some(cl) = cl {
        let mut seen = None;
        for value in headers.get_all("content-length") {
            let s = std::str::from_utf8(value).map_err(|_| DecodeError::BadContentLength)?;
            let n: u64 = s.trim().parse().map_err(|_| DecodeError::BadContentLength)?;
            match seen {
                None => seen = Some(n),
                Some(prev) if prev == n => {}
                Some(_) => return Err(DecodeError::BadContentLength),
            }
        }
        let _ = cl;
        return Ok(BodyLength::Fixed(seen.unwrap()));
    }

    match role {
        Role::Request => Ok(BodyLength::AlwaysEmpty),
        Role::Response => Ok(BodyLength::UntilClose),
    }
}

/// The last comma-separated coding in a `Transfer-Encoding` value, which is
/// the one that determines framing (RFC 7230 §3.3.1).
fn last_coding(value: &[u8]) -> &[u8] {
    value.rsplit(|&b| b == b',').next().unwrap_or(value)
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    fn decode_all(role: Role, input: &[u8]) -> Vec<Decoded> {
        let mut dec = Decoder::new(role, DecoderConfig::default());
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(item) = dec.decode(&mut buf).unwrap() {
            out.push(item);
        }
        out
    }

    #[test]
    fn simple_get_no_body() {
        let items = decode_all(Role::Request,
            b"GET /a HTTP/1.1\r\nHost: example.com\r\n\r\n");
        assert_eq!(items.len(), 2);
        match items[0] {
            Decoded::Head(Head::Request { ref method, .. }) => {
                assert_eq!(*method, Method::Get);
            }
            _ => panic!("expected head"),
        }
        match items[1] {
            Decoded::Content(ContentEvent::LastChunk { .. }) => {}
            _ => panic!("expected last chunk"),
        }
    }

    #[test]
    fn fixed_length_body() {
        let items = decode_all(Role::Request,
            b"POST /a HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello");
        let bodies: Vec<_> = items.iter().filter_map(|d| match d {
            Decoded::Content(ContentEvent::Chunk(b)) => Some(b.clone()),
            _ => None,
        }).collect();
        assert_eq!(bodies, vec![Bytes::from_static(b"hello")]);
    }

    #[test]
    fn chunked_body_with_trailer() {
        let items = decode_all(Role::Request,
            b"POST /a HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n\
              5\r\nhello\r\n0\r\nX-Done: yes\r\n\r\n");
        let mut saw_trailer = false;
        for item in &items {
            if let Decoded::Content(ContentEvent::LastChunk { trailers }) = item {
                assert_eq!(trailers.get("x-done"), Some(&b"yes"[..]));
                saw_trailer = true;
            }
        }
        assert!(saw_trailer);
    }

    #[test]
    fn rejects_chunked_with_content_length() {
        let mut dec = Decoder::new(Role::Request, DecoderConfig::default());
        let mut buf = BytesMut::from(
            &b"POST /a HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\
               Transfer-Encoding: chunked\r\n\r\n"[..]);
        assert!(dec.decode(&mut buf).is_err());
    }

    #[test]
    fn head_response_is_always_empty() {
        let mut dec = Decoder::new(Role::Response, DecoderConfig::default());
        dec.push_method(Method::Head);
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 200 OK\r\nContent-Length: 123\r\n\r\n"[..]);
        let head = dec.decode(&mut buf).unwrap().unwrap();
        matches!(head, Decoded::Head(_));
        let next = dec.decode(&mut buf).unwrap().unwrap();
        match next {
            Decoded::Content(ContentEvent::LastChunk { .. }) => {}
            _ => panic!("expected immediate last chunk for HEAD response"),
        }
    }

    #[test]
    fn response_without_length_reads_until_close() {
        let items = decode_all(Role::Response,
            b"HTTP/1.1 200 OK\r\n\r\nhello world");
        assert!(items.iter().any(|d| matches!(d,
            Decoded::Content(ContentEvent::Chunk(b)) if &b[..] == b"hello world")));
    }

    #[test]
    fn switching_protocols_enters_upgraded() {
        let mut dec = Decoder::new(Role::Response, DecoderConfig::default());
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n"[..]);
        let _ = dec.decode(&mut buf).unwrap().unwrap();
        assert!(dec.is_upgraded());
    }

    #[test]
    fn response_101_without_protocol_switch_does_not_enter_upgraded() {
        let mut dec = Decoder::new(Role::Response, DecoderConfig::default());
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: HTTP/1.1\r\n\r\n"[..]);
        let _ = dec.decode(&mut buf).unwrap().unwrap();
        assert!(!dec.is_upgraded());
    }

    #[test]
    fn upgraded_decoder_passes_bytes_through_as_opaque_chunks() {
        let mut dec = Decoder::new(Role::Response, DecoderConfig::default());
        let mut buf = BytesMut::from(
            &b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\n\r\n"[..]);
        let _ = dec.decode(&mut buf).unwrap().unwrap();
        assert!(dec.is_upgraded());

        buf.extend_from_slice(b"\x81\x05Hello");
        match dec.decode(&mut buf).unwrap().unwrap() {
            Decoded::Content(ContentEvent::Chunk(b)) => {
                assert_eq!(&b[..], b"\x81\x05Hello");
            }
            other => panic!("expected opaque chunk, got {:?}", other),
        }
        assert!(dec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn eof_during_header_section_is_premature_close() {
        let mut dec = Decoder::new(Role::Request, DecoderConfig::default());
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\nHost: x\r\n"[..]);
        assert!(dec.decode(&mut buf).unwrap().is_none());
        assert!(matches!(dec.notify_eof(), Err(DecodeError::PrematureClose)));
    }

    #[test]
    fn oversize_initial_line_rejected() {
        let mut config = DecoderConfig::default();
        config.max_initial_line = 16;
        let mut dec = Decoder::new(Role::Request, config);
        let mut buf = BytesMut::from(
            &b"GET /a-path-well-past-the-limit HTTP/1.1\r\n"[..]);
        assert!(matches!(dec.decode(&mut buf), Err(DecodeError::InitialLineTooLong)));
    }

    #[test]
    fn oversize_header_section_rejected() {
        let mut config = DecoderConfig::default();
        config.max_header_bytes = 32;
        let mut dec = Decoder::new(Role::Request, config);
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        buf.extend_from_slice(b"X-Long: ");
        buf.extend_from_slice(&b"a".repeat(64));
        assert!(matches!(dec.decode(&mut buf), Err(DecodeError::HeadersTooLong)));
    }
}
