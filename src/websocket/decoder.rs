//! The WebSocket frame decoder (spec.md §4.4): RFC 6455 framing plus the
//! legacy Hixie-00 variant is handled entirely in the handshake (Hixie-00
//! has no frame format of its own beyond `\x00 ... \xff` delimiting, which
//! a caller who negotiates it can implement directly over raw bytes).
//!
//! Grounded on the teacher's `src/websocket/zero_copy.rs`/`codec.rs`
//! state shape, reworked over `bytes::BytesMut` and, per
//! [[REDESIGN FLAGS]] in SPEC_FULL.md, tracking fragmented messages
//! instead of rejecting them outright (`ErrorEnum::Fragmented` in the
//! teacher).

use bytes::BytesMut;

use super::error::WsError;
use super::frame::{Frame, Opcode};
use super::mask::apply_mask;
use super::utf8::Utf8Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Decoding frames sent by a client: must be masked.
    Server,
    /// Decoding frames sent by a server: must not be masked.
    Client,
}

#[derive(Debug, Clone)]
pub struct WsDecoderConfig {
    pub max_frame_size: u64,
    pub side: Side,
    /// Allow a set RSV1/2/3 bit through without failing the frame (spec.md
    /// §6 `allowExtensions`). No extension is actually negotiated by this
    /// crate (permessage-deflate is a non-goal, spec.md §1); this only
    /// controls whether the bit is treated as a protocol violation.
    pub allow_extensions: bool,
    /// Tolerate a frame whose `MASK` bit doesn't match what `side` expects
    /// instead of failing it (spec.md §6 `allowMaskMismatch`).
    pub allow_mask_mismatch: bool,
}

impl WsDecoderConfig {
    pub fn new(side: Side) -> WsDecoderConfig {
        WsDecoderConfig {
            max_frame_size: 16 * 1024 * 1024,
            side,
            allow_extensions: false,
            allow_mask_mismatch: false,
        }
    }
}

#[derive(Debug)]
struct Header {
    fin: bool,
    rsv1: bool,
    rsv2: bool,
    rsv3: bool,
    opcode: Opcode,
    masked: bool,
    len_indicator: u8,
}

#[derive(Debug)]
enum State {
    ReadingFirst,
    ReadingSecond(Header),
    ReadingSize(Header, u8),
    MaskingKey(Header, u64),
    Payload(Header, u64, Option<[u8; 4]>),
    Corrupt,
}

/// Incremental per-frame WebSocket decoder. Produces one physical `Frame`
/// at a time (including `Continuation` frames as-is); fragmentation
/// *sequencing* is validated here, but reassembling fragments into one
/// logical message is `MessageAssembler`'s job (mod.rs).
pub struct WsDecoder {
    config: WsDecoderConfig,
    state: State,
    fragmented_opcode: Option<Opcode>,
    text_validator: Option<Utf8Validator>,
}

impl WsDecoder {
    pub fn new(config: WsDecoderConfig) -> WsDecoder {
        WsDecoder {
            config,
            state: State::ReadingFirst,
            fragmented_opcode: None,
            text_validator: None,
        }
    }

    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, WsError> {
        loop {
            match self.state {
                State::Corrupt => return Err(WsError::Corrupt),
                State::ReadingFirst => {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let b = buf[0];
                    let _ = buf.split_to(1);
                    let header = Header {
                        fin: b & 0x80 != 0,
                        rsv1: b & 0x40 != 0,
                        rsv2: b & 0x20 != 0,
                        rsv3: b & 0x10 != 0,
                        opcode: Opcode::from_u8(b & 0x0F),
                        masked: false,
                        len_indicator: 0,
                    };
                    if (header.rsv1 || header.rsv2 || header.rsv3) && !self.config.allow_extensions {
                        self.state = State::Corrupt;
                        return Err(WsError::ReservedBitsSet);
                    }
                    if matches!(header.opcode, Opcode::Reserved(_)) {
                        self.state = State::Corrupt;
                        return Err(WsError::ReservedOpcode);
                    }
                    self.state = State::ReadingSecond(header);
                }
                State::ReadingSecond(_) => {
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let b = buf[0];
                    let _ = buf.split_to(1);
                    let mut header = match std::mem::replace(&mut self.state, State::Corrupt) {
                        State::ReadingSecond(h) => h,
                        _ => unreachable!(),
                    };
                    header.masked = b & 0x80 != 0;
                    header.len_indicator = b & 0x7F;

                    self.validate_masking(&header)?;
                    self.validate_control_frame(&header)?;

                    self.state = match header.len_indicator {
                        126 => State::ReadingSize(header, 2),
                        127 => State::ReadingSize(header, 8),
                        n => self.after_length(header, n as u64)?,
                    };
                }
                State::ReadingSize(_, needed) => {
                    let needed = needed as usize;
                    if buf.len() < needed {
                        return Ok(None);
                    }
                    let raw = buf.split_to(needed);
                    let header = match std::mem::replace(&mut self.state, State::Corrupt) {
                        State::ReadingSize(h, _) => h,
                        _ => unreachable!(),
                    };
                    let len = if needed == 2 {
                        let n = u16::from_be_bytes([raw[0], raw[1]]) as u64;
                        if n < 126 {
                            self.state = State::Corrupt;
                            return Err(WsError::NonMinimalLength);
                        }
                        n
                    } else {
                        let mut bytes = [0u8; 8];
                        bytes.copy_from_slice(&raw);
                        let n = u64::from_be_bytes(bytes);
                        if n < 65536 || n & (1 << 63) != 0 {
                            self.state = State::Corrupt;
                            return Err(WsError::NonMinimalLength);
                        }
                        n
                    };
                    self.state = self.after_length(header, len)?;
                }
                State::MaskingKey(_, len) => {
                    if buf.len() < 4 {
                        return Ok(None);
                    }
                    let raw = buf.split_to(4);
                    let key = [raw[0], raw[1], raw[2], raw[3]];
                    let header = match std::mem::replace(&mut self.state, State::Corrupt) {
                        State::MaskingKey(h, _) => h,
                        _ => unreachable!(),
                    };
                    self.state = State::Payload(header, len, Some(key));
                }
                State::Payload(_, len, _) => {
                    let len = len as usize;
                    if buf.len() < len {
                        return Ok(None);
                    }
                    let mut payload = buf.split_to(len);
                    let (header, _, mask) = match std::mem::replace(&mut self.state, State::Corrupt) {
                        State::Payload(h, l, m) => (h, l, m),
                        _ => unreachable!(),
                    };
                    if let Some(key) = mask {
                        apply_mask(key, &mut payload);
                    }
                    let frame = self.finish_frame(header, payload.freeze())?;
                    self.state = State::ReadingFirst;
                    return Ok(Some(frame));
                }
            }
        }
    }

    fn validate_masking(&self, header: &Header) -> Result<(), WsError> {
        let expected = matches!(self.config.side, Side::Server);
        if header.masked != expected && !self.config.allow_mask_mismatch {
            return Err(WsError::MaskingMismatch);
        }
        Ok(())
    }

    fn validate_control_frame(&self, header: &Header) -> Result<(), WsError> {
        if header.opcode.is_control() {
            if !header.fin || header.len_indicator > 125 {
                return Err(WsError::InvalidControlFrame);
            }
            // A close code is always 2 bytes; a 1-byte payload can't carry
            // one and is an enumerated protocol violation of its own
            // (spec.md §4.4 step 2), distinct from the general
            // "CLOSE payload validation" length check `finish_frame` runs
            // once the payload itself has arrived.
            if header.opcode == Opcode::Close && header.len_indicator == 1 {
                return Err(WsError::InvalidCloseCode);
            }
        }
        Ok(())
    }

    fn after_length(&self, header: Header, len: u64) -> Result<State, WsError> {
        if len > self.config.max_frame_size {
            return Err(WsError::FrameTooLarge);
        }
        if header.masked {
            Ok(State::MaskingKey(header, len))
        } else {
            Ok(State::Payload(header, len, None))
        }
    }

    fn finish_frame(&mut self, header: Header, payload: bytes::Bytes) -> Result<Frame, WsError> {
        if !header.opcode.is_control() {
            match header.opcode {
                Opcode::Continuation => {
                    if self.fragmented_opcode.is_none() {
                        return Err(WsError::UnexpectedContinuation);
                    }
                }
                _ => {
                    if self.fragmented_opcode.is_some() {
                        return Err(WsError::UnexpectedContinuation);
                    }
                    if header.opcode == Opcode::Text {
                        self.text_validator = Some(Utf8Validator::new());
                    }
                }
            }

            if let Some(validator) = self.text_validator.as_mut() {
                if matches!(header.opcode, Opcode::Text | Opcode::Continuation)
                    && !validator.feed_slice(&payload)
                {
                    return Err(WsError::InvalidUtf8);
                }
            }

            if header.fin {
                if let Some(validator) = self.text_validator.take() {
                    if !validator.is_accepting() {
                        return Err(WsError::InvalidUtf8);
                    }
                }
                self.fragmented_opcode = None;
            } else {
                self.fragmented_opcode = Some(self.fragmented_opcode.unwrap_or(header.opcode));
            }
        } else if header.opcode == Opcode::Close {
            if let Some(code) = close_code_from(&payload) {
                if !super::frame::is_valid_close_code(code) {
                    return Err(WsError::InvalidCloseCode);
                }
            }
            if payload.len() > 2 && !super::utf8::is_valid_utf8(&payload[2..]) {
                return Err(WsError::InvalidUtf8);
            }
        }

        Ok(Frame {
            fin: header.fin,
            rsv1: header.rsv1,
            rsv2: header.rsv2,
            rsv3: header.rsv3,
            opcode: header.opcode,
            payload,
        })
    }
}

fn close_code_from(payload: &[u8]) -> Option<u16> {
    if payload.len() < 2 {
        None
    } else {
        Some(u16::from_be_bytes([payload[0], payload[1]]))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use bytes::BytesMut;

    fn masked_frame(fin: bool, opcode: u8, payload: &[u8], key: [u8; 4]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push((if fin { 0x80 } else { 0 }) | opcode);
        let mut masked_payload = payload.to_vec();
        apply_mask(key, &mut masked_payload);
        if payload.len() < 126 {
            out.push(0x80 | payload.len() as u8);
        } else {
            out.push(0x80 | 126);
            out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        }
        out.extend_from_slice(&key);
        out.extend_from_slice(&masked_payload);
        out
    }

    #[test]
    fn decodes_masked_text_frame() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Server));
        let key = [1, 2, 3, 4];
        let mut buf = BytesMut::from(&masked_frame(true, 0x1, b"hello", key)[..]);
        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Text);
        assert_eq!(&frame.payload[..], b"hello");
    }

    #[test]
    fn rejects_unmasked_frame_from_client() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Server));
        let mut buf = BytesMut::from(&[0x81u8, 0x02, b'h', b'i'][..]);
        assert!(dec.decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_masked_frame_from_server() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Client));
        let key = [1, 2, 3, 4];
        let mut buf = BytesMut::from(&masked_frame(true, 0x1, b"hi", key)[..]);
        assert!(dec.decode(&mut buf).is_err());
    }

    #[test]
    fn reassembles_fragmented_text_across_continuations() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Server));
        let key = [9, 9, 9, 9];
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&masked_frame(false, 0x1, b"hel", key));
        let first = dec.decode(&mut buf).unwrap().unwrap();
        assert!(!first.fin);
        assert_eq!(first.opcode, Opcode::Text);

        buf.extend_from_slice(&masked_frame(true, 0x0, b"lo", key));
        let second = dec.decode(&mut buf).unwrap().unwrap();
        assert!(second.fin);
        assert_eq!(second.opcode, Opcode::Continuation);
    }

    #[test]
    fn rejects_continuation_without_start() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Server));
        let key = [1, 1, 1, 1];
        let mut buf = BytesMut::from(&masked_frame(true, 0x0, b"oops", key)[..]);
        assert!(dec.decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_fragmented_control_frame() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Server));
        let key = [1, 1, 1, 1];
        let mut buf = BytesMut::from(&masked_frame(false, 0x9, b"ping", key)[..]);
        assert!(dec.decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_invalid_utf8_text_frame() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Server));
        let key = [1, 1, 1, 1];
        let mut buf = BytesMut::from(&masked_frame(true, 0x1, &[0xE2, 0x82], key)[..]);
        assert!(dec.decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_oversize_frame() {
        let mut config = WsDecoderConfig::new(Side::Server);
        config.max_frame_size = 4;
        let mut dec = WsDecoder::new(config);
        let key = [1, 1, 1, 1];
        let mut buf = BytesMut::from(&masked_frame(true, 0x2, b"toolong", key)[..]);
        assert!(dec.decode(&mut buf).is_err());
    }

    #[test]
    fn rejects_close_frame_with_one_byte_payload() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Server));
        let key = [1, 1, 1, 1];
        let mut buf = BytesMut::from(&masked_frame(true, 0x8, &[0x01], key)[..]);
        assert!(matches!(dec.decode(&mut buf), Err(WsError::InvalidCloseCode)));
    }

    #[test]
    fn accepts_close_frame_with_no_payload() {
        let mut dec = WsDecoder::new(WsDecoderConfig::new(Side::Server));
        let key = [1, 1, 1, 1];
        let mut buf = BytesMut::from(&masked_frame(true, 0x8, &[], key)[..]);
        let frame = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.opcode, Opcode::Close);
    }
}
