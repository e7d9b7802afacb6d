//! The abstract upgrade substrate (spec.md §4.6): once a `101 Switching
//! Protocols` response (or, for a server, an accepted upgrade request) has
//! been recognized, control of the connection passes from the HTTP codec
//! to whatever protocol was negotiated. This module defines the seam —
//! `Pipeline` — rather than owning a socket itself, the same way the
//! teacher's `server::proto` hands a live connection off to
//! `websocket::Dispatcher` without knowing what a `Dispatcher` does
//! internally.

use bytes::Bytes;

use crate::headers::HeaderMap;
use crate::message::Head;

/// What the owning network pipeline must be able to do on behalf of the
/// codec during and after an upgrade. Implemented by the caller (a
/// connection actor, an async task, a test double); never by this crate.
pub trait Pipeline {
    /// An application-defined event raised in the course of negotiating or
    /// running the upgraded protocol (e.g. "handshake accepted", "peer
    /// closed").
    type Event;

    /// Notifies the pipeline of an event.
    fn fire_event(&mut self, event: Self::Event);

    /// Queues raw bytes (e.g. the `101` response, or protocol frames after
    /// the swap) to be written to the socket.
    fn write_response(&mut self, bytes: Bytes);

    /// Replaces the pipeline's active codec with the one produced by a
    /// successful handshake. After this call, nothing that arrives on the
    /// connection is interpreted as HTTP anymore.
    fn swap_codec(&mut self, name: &'static str);
}

/// The outcome of inspecting one request/response pair for an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeDecision {
    /// Not an upgrade; handle normally.
    None,
    /// The head asked for an upgrade to `protocol` (the `Upgrade:` token,
    /// lowercased).
    Requested { protocol: String },
}

/// Inspects a request's headers for an upgrade request: `Connection`
/// contains the `upgrade` token and `Upgrade:` names a protocol
/// (spec.md §4.6).
pub fn inspect_request(head: &Head) -> UpgradeDecision {
    let headers = head.headers();
    let wants_upgrade = headers.get("connection")
        .map(|v| crate::headers::token_list_contains(v, b"upgrade"))
        .unwrap_or(false);
    if !wants_upgrade {
        return UpgradeDecision::None;
    }
    match headers.get_str("upgrade") {
        Some(protocol) => UpgradeDecision::Requested { protocol: protocol.to_ascii_lowercase() },
        None => UpgradeDecision::None,
    }
}

/// Builds the header set for a `101 Switching Protocols` response
/// announcing `protocol`, to which the caller can add protocol-specific
/// headers (e.g. `Sec-WebSocket-Accept`).
pub fn switching_protocols_headers(protocol: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.append(crate::headers::HeaderName::new("Connection").unwrap(), &b"Upgrade"[..]).unwrap();
    headers.append(crate::headers::HeaderName::new("Upgrade").unwrap(), protocol.as_bytes().to_vec()).unwrap();
    headers
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::headers::HeaderName;
    use crate::method::Method;
    use crate::request_target::RequestTarget;
    use crate::version::Version;

    struct TestPipeline {
        events: Vec<&'static str>,
        written: Vec<Bytes>,
        swapped: Option<&'static str>,
    }

    impl Pipeline for TestPipeline {
        type Event = &'static str;

        fn fire_event(&mut self, event: Self::Event) {
            self.events.push(event);
        }

        fn write_response(&mut self, bytes: Bytes) {
            self.written.push(bytes);
        }

        fn swap_codec(&mut self, name: &'static str) {
            self.swapped = Some(name);
        }
    }

    fn request_with_upgrade(value: &str) -> Head {
        let mut headers = HeaderMap::new();
        headers.append(HeaderName::new("Connection").unwrap(), &b"Upgrade"[..]).unwrap();
        headers.append(HeaderName::new("Upgrade").unwrap(), value.as_bytes().to_vec()).unwrap();
        Head::Request {
            method: Method::Get,
            target: RequestTarget::Origin("/ws".into()),
            version: Version::Http11,
            headers,
        }
    }

    #[test]
    fn detects_websocket_upgrade() {
        let head = request_with_upgrade("websocket");
        assert_eq!(inspect_request(&head),
                   UpgradeDecision::Requested { protocol: "websocket".into() });
    }

    #[test]
    fn ignores_plain_request() {
        let headers = HeaderMap::new();
        let head = Head::Request {
            method: Method::Get,
            target: RequestTarget::Origin("/".into()),
            version: Version::Http11,
            headers,
        };
        assert_eq!(inspect_request(&head), UpgradeDecision::None);
    }

    #[test]
    fn pipeline_double_records_swap() {
        let mut pipeline = TestPipeline { events: Vec::new(), written: Vec::new(), swapped: None };
        pipeline.fire_event("handshake-ok");
        pipeline.write_response(Bytes::from_static(b"HTTP/1.1 101 Switching Protocols\r\n\r\n"));
        pipeline.swap_codec("websocket");
        assert_eq!(pipeline.events, vec!["handshake-ok"]);
        assert_eq!(pipeline.swapped, Some("websocket"));
        assert_eq!(pipeline.written.len(), 1);
    }
}
