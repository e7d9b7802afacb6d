//! WebSocket frame codec and handshake (spec.md §4.4-§4.6): frame-level
//! state machines for RFC 6455 (and hybi-07/08) framing plus the legacy
//! Hixie-00 handshake, fragmentation tracking, and control-frame/UTF-8
//! validation.
//!
//! Grounded on the teacher's `src/websocket/mod.rs`, which re-exports a
//! similarly small public surface (`Error`, `Frame`, `Packet`, `Codec`)
//! over a set of private submodules; this module does the same but keeps
//! `decoder`/`encoder`/`handshake` public since callers drive each of
//! those state machines directly rather than through one `Codec`.

mod decoder;
mod encoder;
mod error;
mod frame;
mod handshake;
mod mask;
mod utf8;

pub use self::decoder::{Side, WsDecoder, WsDecoderConfig};
pub use self::encoder::{Encoded, WsEncoder, WsEncoderConfig, MERGE_THRESHOLD};
pub use self::error::WsError;
pub use self::frame::{is_valid_close_code, Frame, Opcode};
pub use self::handshake::{
    accept_key, client_request_headers, hixie00_response, negotiate_subprotocol, server_handshake,
    server_response_headers, ClientHandshake, HandshakeError, ServerHandshake, GUID,
};
pub use self::mask::apply_mask;
pub use self::utf8::{is_valid_utf8, Utf8Validator};

/// Reassembles a sequence of physical frames produced by `WsDecoder` into
/// complete logical messages (spec.md §4.4 fragmentation: "a PING inside a
/// sequence does not reset" the in-progress reassembly). `WsDecoder`
/// already validates fragmentation *sequencing* and end-to-end UTF-8; this
/// type just concatenates payloads so callers who don't care about
/// individual fragments can work with one `Bytes` per message.
///
/// Control frames (`Ping`/`Pong`/`Close`) always pass through as their own
/// `Message` immediately, fragmented or not, since control frames are
/// never fragmented (the decoder already rejects that).
#[derive(Debug, Default)]
pub struct MessageAssembler {
    opcode: Option<Opcode>,
    buffer: Vec<u8>,
}

/// One reassembled logical unit handed back to the application (named
/// after the teacher's `websocket::Packet`: unlike a physical `Frame`, a
/// fragmented message has been concatenated onto the heap).
#[derive(Debug, Clone)]
pub enum Packet {
    Text(bytes::Bytes),
    Binary(bytes::Bytes),
    Ping(bytes::Bytes),
    Pong(bytes::Bytes),
    Close(bytes::Bytes),
}

impl MessageAssembler {
    pub fn new() -> MessageAssembler {
        MessageAssembler { opcode: None, buffer: Vec::new() }
    }

    /// Feeds one physical frame. Returns `Some(Message)` once a complete
    /// (possibly single-frame) message is available, `None` if the frame
    /// was a non-final fragment and more are still expected.
    pub fn push(&mut self, frame: Frame) -> Option<Packet> {
        if frame.opcode.is_control() {
            return Some(match frame.opcode {
                Opcode::Ping => Packet::Ping(frame.payload),
                Opcode::Pong => Packet::Pong(frame.payload),
                Opcode::Close => Packet::Close(frame.payload),
                _ => unreachable!("is_control() only matches Ping/Pong/Close"),
            });
        }

        let opcode = match frame.opcode {
            Opcode::Continuation => self.opcode.unwrap_or(Opcode::Binary),
            other => {
                self.opcode = Some(other);
                other
            }
        };
        self.buffer.extend_from_slice(&frame.payload);

        if !frame.fin {
            return None;
        }

        self.opcode = None;
        let payload = bytes::Bytes::from(std::mem::take(&mut self.buffer));
        Some(match opcode {
            Opcode::Text => Packet::Text(payload),
            _ => Packet::Binary(payload),
        })
    }
}
