//! Buffers one HTTP/1.x message's body into a single `Bytes`, handling
//! `Expect: 100-continue` and oversize rejection along the way
//! (spec.md §4.3). Also the substrate an upgrade handshake rides on: once
//! an aggregated message's headers signal an upgrade, the caller hands the
//! connection's remaining bytes straight to `upgrade`/`websocket` instead
//! of calling `feed` again.

use bytes::{Bytes, BytesMut};

use crate::decoder::{Decoded, Decoder};
use crate::error::AggregateError;
use crate::headers;
use crate::message::{ContentEvent, FullMessage, Head};
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitStart,
    Aggregating,
    Rejecting,
}

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub max_content_length: usize,
}

impl Default for AggregatorConfig {
    fn default() -> AggregatorConfig {
        AggregatorConfig { max_content_length: 10 * 1024 * 1024 }
    }
}

/// One decision the aggregator hands back to the caller.
#[derive(Debug, Clone)]
pub enum AggregateEvent {
    /// The message declared `Expect: 100-continue` and fits under the
    /// configured limit; write a `100 Continue` interim response (see
    /// `write_100_continue`) before more body bytes arrive.
    ExpectContinue,
    /// The message's body would exceed (or already exceeds)
    /// `max_content_length`. Write a response with this status — `417`
    /// if the client was waiting on `100-continue` and can still be told
    /// not to bother, `413` otherwise — then keep feeding the aggregator
    /// so it can discard the rest of the oversize body without losing
    /// connection framing.
    Rejected(Status),
    /// A complete message, header to trailer.
    Message(FullMessage),
}

/// Wraps a `Decoder`, accumulating content events into one `Bytes` buffer
/// per message instead of handing them to the caller incrementally.
pub struct Aggregator {
    decoder: Decoder,
    config: AggregatorConfig,
    state: State,
    head: Option<Head>,
    body: BytesMut,
}

impl Aggregator {
    pub fn new(decoder: Decoder, config: AggregatorConfig) -> Aggregator {
        Aggregator { decoder, config, state: State::AwaitStart, head: None, body: BytesMut::new() }
    }

    pub fn decoder_mut(&mut self) -> &mut Decoder {
        &mut self.decoder
    }

    pub fn feed(&mut self, buf: &mut BytesMut) -> Result<Option<AggregateEvent>, AggregateError> {
        loop {
            let decoded = match self.decoder.decode(buf)? {
                Some(d) => d,
                None => return Ok(None),
            };
            match decoded {
                Decoded::Head(head) => {
                    let expect = head.headers().get("expect");
                    let expect_continue = expect.map(headers::is_continue).unwrap_or(false);
                    let unsupported_expectation = expect.is_some() && !expect_continue;
                    let declared_len = head.headers().get("content-length")
                        .and_then(|v| std::str::from_utf8(v).ok())
                        .and_then(|s| s.trim().parse::<usize>().ok());
                    let too_big = declared_len
                        .map(|n| n > self.config.max_content_length)
                        .unwrap_or(false);

                    self.head = Some(head);
                    self.body.clear();

                    // Oversize always yields 413, whether or not the client
                    // sent `Expect: 100-continue` (spec.md §4.3); only an
                    // `Expect` value other than `100-continue` yields 417,
                    // and only once oversize has been ruled out.
                    if too_big {
                        self.state = State::Rejecting;
                        return Ok(Some(AggregateEvent::Rejected(Status::RequestEntityTooLarge)));
                    }
                    if unsupported_expectation {
                        self.state = State::Rejecting;
                        return Ok(Some(AggregateEvent::Rejected(Status::ExpectationFailed)));
                    }

                    self.state = State::Aggregating;
                    if expect_continue {
                        return Ok(Some(AggregateEvent::ExpectContinue));
                    }
                }
                Decoded::Content(ContentEvent::Chunk(chunk)) => {
                    match self.state {
                        State::Aggregating => {
                            if self.body.len() + chunk.len() > self.config.max_content_length {
                                self.state = State::Rejecting;
                                return Ok(Some(AggregateEvent::Rejected(
                                    Status::RequestEntityTooLarge)));
                            }
                            self.body.extend_from_slice(&chunk);
                        }
                        State::Rejecting => {}
                        State::AwaitStart => return Err(AggregateError::Decode(
                            crate::error::DecodeError::BadMessage)),
                    }
                }
                Decoded::Content(ContentEvent::LastChunk { trailers }) => {
                    match self.state {
                        State::Aggregating => {
                            let head = self.head.take().expect("head set before content");
                            let body = self.body.split().freeze();
                            self.state = State::AwaitStart;
                            return Ok(Some(AggregateEvent::Message(FullMessage {
                                head, body, trailers,
                            })));
                        }
                        State::Rejecting => {
                            self.head = None;
                            self.state = State::AwaitStart;
                        }
                        State::AwaitStart => {}
                    }
                }
            }
        }
    }
}

/// Renders the literal interim response for `AggregateEvent::ExpectContinue`
/// (spec.md §8 scenario 3: `Content-Length: 0`, matching the `413`/`417`
/// synthesis, which also declares an empty body explicitly rather than
/// leaving it to be inferred).
pub fn write_100_continue(buf: &mut BytesMut) {
    buf.extend_from_slice(b"HTTP/1.1 100 Continue\r\nContent-Length: 0\r\n\r\n");
}

/// An empty body to pair with `Bytes::new()` when no data was ever staged.
pub fn empty_body() -> Bytes {
    Bytes::new()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::decoder::{DecoderConfig, Role};

    fn new_aggregator(max: usize) -> Aggregator {
        Aggregator::new(
            Decoder::new(Role::Request, DecoderConfig::default()),
            AggregatorConfig { max_content_length: max },
        )
    }

    #[test]
    fn aggregates_fixed_body() {
        let mut agg = new_aggregator(1024);
        let mut buf = BytesMut::from(
            &b"POST /a HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello"[..]);
        match agg.feed(&mut buf).unwrap() {
            Some(AggregateEvent::Message(msg)) => {
                assert_eq!(&msg.body[..], b"hello");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn expect_continue_then_body() {
        let mut agg = new_aggregator(1024);
        let mut buf = BytesMut::from(
            &b"POST /a HTTP/1.1\r\nHost: x\r\nExpect: 100-continue\r\n\
               Content-Length: 5\r\n\r\n"[..]);
        match agg.feed(&mut buf).unwrap() {
            Some(AggregateEvent::ExpectContinue) => {}
            other => panic!("unexpected: {:?}", other),
        }
        buf.extend_from_slice(b"hello");
        match agg.feed(&mut buf).unwrap() {
            Some(AggregateEvent::Message(msg)) => assert_eq!(&msg.body[..], b"hello"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn oversize_declared_length_rejected_with_413() {
        let mut agg = new_aggregator(4);
        let mut buf = BytesMut::from(
            &b"POST /a HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nhello"[..]);
        match agg.feed(&mut buf).unwrap() {
            Some(AggregateEvent::Rejected(Status::RequestEntityTooLarge)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn oversize_with_expect_continue_still_rejected_with_413() {
        // Oversize takes priority over Expect handling (spec.md §4.3): a
        // declared length beyond the limit is always 413, even when the
        // client was waiting on 100-continue.
        let mut agg = new_aggregator(4);
        let mut buf = BytesMut::from(
            &b"POST /a HTTP/1.1\r\nHost: x\r\nExpect: 100-continue\r\n\
               Content-Length: 5\r\n\r\n"[..]);
        match agg.feed(&mut buf).unwrap() {
            Some(AggregateEvent::Rejected(Status::RequestEntityTooLarge)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn unsupported_expectation_rejected_with_417() {
        let mut agg = new_aggregator(1024);
        let mut buf = BytesMut::from(
            &b"POST /a HTTP/1.1\r\nHost: x\r\nExpect: something-else\r\n\
               Content-Length: 5\r\n\r\n"[..]);
        match agg.feed(&mut buf).unwrap() {
            Some(AggregateEvent::Rejected(Status::ExpectationFailed)) => {}
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn oversize_chunked_body_discarded_without_desync() {
        let mut agg = new_aggregator(4);
        let mut buf = BytesMut::from(
            &b"POST /a HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n\
               5\r\nhello\r\n0\r\n\r\n"[..]);
        match agg.feed(&mut buf).unwrap() {
            Some(AggregateEvent::Rejected(Status::RequestEntityTooLarge)) => {}
            other => panic!("unexpected: {:?}", other),
        }
        // Draining continues silently; next feed should see no more events
        // for this message and be ready for a pipelined one.
        let next = agg.feed(&mut buf).unwrap();
        assert!(next.is_none());
    }
}
