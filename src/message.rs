//! The typed events the decoder produces and the encoder consumes
//! (spec.md §3 "Message" / §9 design note): a `Head` (request or response
//! start-line plus headers), a stream of `ContentEvent`s, and a convenience
//! `FullMessage` for call sites that want the aggregator's fully-buffered
//! result rather than incremental events.

use bytes::Bytes;

use crate::headers::HeaderMap;
use crate::method::Method;
use crate::request_target::RequestTarget;
use crate::status::Status;
use crate::version::Version;

/// The request- or status-line plus headers of one HTTP/1.x message,
/// handed to the caller as soon as the decoder finishes the header
/// section (spec.md §4.1).
#[derive(Debug, Clone)]
pub enum Head {
    Request {
        method: Method,
        target: RequestTarget,
        version: Version,
        headers: HeaderMap,
    },
    Response {
        version: Version,
        status: Status,
        headers: HeaderMap,
    },
}

impl Head {
    pub fn version(&self) -> Version {
        match *self {
            Head::Request { version, .. } => version,
            Head::Response { version, .. } => version,
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        match *self {
            Head::Request { ref headers, .. } => headers,
            Head::Response { ref headers, .. } => headers,
        }
    }
}

/// One unit of body content as the decoder produces it, or the aggregator
/// replays it.
#[derive(Debug, Clone)]
pub enum ContentEvent {
    /// A chunk of body bytes. For non-chunked bodies this is typically one
    /// event per `read`; for chunked bodies it follows chunk boundaries.
    Chunk(Bytes),
    /// The final event for this message's body. Carries any trailer
    /// headers merged in from chunked trailers (empty if none).
    LastChunk { trailers: HeaderMap },
}

/// A complete request or response: the head plus the fully concatenated
/// body, as produced by the `aggregator` module once a message finishes
/// (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct FullMessage {
    pub head: Head,
    pub body: Bytes,
    pub trailers: HeaderMap,
}

/// A decoded HTTP/1.x message, incremental form: a head followed by the
/// content events the caller must keep polling the decoder for.
#[derive(Debug, Clone)]
pub enum Message {
    Head(Head),
    Content(ContentEvent),
}

/// Minor-axis helper shared by request and response paths: anything that
/// carries an HTTP version and a header map (used by the body-length
/// resolution algorithm in `decoder`, which is version/role-agnostic
/// except for the defaulting rule in spec.md §4.1 rule 4).
pub trait HttpMessage {
    fn http_version(&self) -> Version;
    fn http_headers(&self) -> &HeaderMap;
}

impl HttpMessage for Head {
    fn http_version(&self) -> Version {
        self.version()
    }

    fn http_headers(&self) -> &HeaderMap {
        self.headers()
    }
}
