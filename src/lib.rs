//! Incremental, zero-copy HTTP/1.x and WebSocket wire-protocol codec core.
//!
//! This crate decodes an inbound byte stream into typed protocol events and
//! encodes outbound events back into bytes. It does not own a socket, a
//! reactor, or a buffer allocator: callers feed it `bytes::BytesMut` and
//! drain `bytes::Bytes` slices, driving it from whatever network pipeline
//! they have (synchronous, `mio`, `tokio`, or otherwise).
#![recursion_limit = "100"]

#[macro_use]
extern crate quick_error;
#[macro_use]
extern crate log;

pub mod aggregator;
pub mod chunked;
pub mod content_encoding;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod headers;
pub mod message;
pub mod method;
pub mod request_target;
pub mod status;
pub mod upgrade;
pub mod version;
pub mod websocket;

pub use error::{DecodeError, EncodeError};
pub use headers::{HeaderMap, HeaderName};
pub use message::{ContentEvent, FullMessage, Head, Message};
pub use method::Method;
pub use status::Status;
pub use version::Version;
