//! WebSocket-specific failures, grounded on the teacher's
//! `src/websocket/error.rs`.

use super::frame::{Frame, Opcode};

quick_error! {
    #[derive(Debug)]
    pub enum WsError {
        /// The first header byte used a reserved bit this implementation
        /// doesn't negotiate an extension for.
        ReservedBitsSet {
            display("reserved bits set without a negotiated extension")
        }
        /// Payload length used the non-minimal encoding RFC 6455 §5.2
        /// forbids (e.g. a 16-bit length that could have fit in 7 bits).
        NonMinimalLength {
            display("frame length is not minimally encoded")
        }
        /// A control frame's `FIN` bit was clear, or its payload exceeded
        /// 125 bytes.
        InvalidControlFrame {
            display("control frames must not be fragmented and must be <=125 bytes")
        }
        /// The opcode nibble named one of the reserved values (3-7, 11-15)
        /// this implementation assigns no meaning to (spec.md §4.4).
        ReservedOpcode {
            display("reserved opcode")
        }
        /// A continuation frame arrived with no message in progress, or a
        /// new (non-continuation) data frame arrived while one was.
        UnexpectedContinuation {
            display("continuation frame received out of sequence")
        }
        /// A server received an unmasked frame, or a client received a
        /// masked one (RFC 6455 §5.1).
        MaskingMismatch {
            display("frame masking does not match the expected role")
        }
        /// A `Close` frame carried an invalid close code.
        InvalidCloseCode {
            display("invalid close code")
        }
        /// A `Text` frame (or the reason text of a `Close` frame) was not
        /// valid UTF-8.
        InvalidUtf8 {
            display("invalid UTF-8 in text payload")
        }
        /// A frame's declared length exceeded the configured maximum.
        FrameTooLarge {
            display("frame payload exceeds the configured maximum size")
        }
        /// Bytes arrived after the stream was marked corrupt.
        Corrupt {
            display("websocket stream is corrupt")
        }
    }
}

impl WsError {
    /// The 1002-coded close frame a caller should write upstream on this
    /// error, per spec.md §4.4's "causes a `CloseWebSocketFrame(status=1002)`
    /// to be written" rule. `Corrupt` itself carries no fresh violation (the
    /// frame was already written when the decoder first entered the state),
    /// so it returns `None`.
    pub fn protocol_close_frame(&self) -> Option<Frame> {
        match self {
            WsError::Corrupt => None,
            _ => Some(Frame {
                fin: true,
                rsv1: false,
                rsv2: false,
                rsv3: false,
                opcode: Opcode::Close,
                payload: 1002u16.to_be_bytes().to_vec().into(),
            }),
        }
    }
}
