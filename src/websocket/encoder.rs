//! The WebSocket frame encoder (spec.md §4.5): header byte layout, the
//! 7/16/64-bit length ladder, and the merge-vs-gather-write split for
//! large payloads.
//!
//! Grounded on the teacher's `src/websocket/zero_copy.rs` write path.

use bytes::{BufMut, Bytes, BytesMut};
use rand::RngCore;

use super::decoder::Side;
use super::error::WsError;
use super::frame::Frame;

/// Below this payload size, the header and payload are copied into one
/// contiguous buffer (cheaper than a second syscall for a small write);
/// at or above it, the caller is hinted to write the payload separately
/// (e.g. via a vectored write) instead of copying it (spec.md §4.5).
pub const MERGE_THRESHOLD: usize = 1024;

/// What `WsEncoder::encode` produced: either copy `Encoded::Merged` as one
/// write, or issue `Encoded::Gathered`'s `header` and `payload` as two
/// writes (a `writev`) to avoid copying a large payload.
pub enum Encoded {
    Merged(BytesMut),
    Gathered { header: BytesMut, payload: Bytes },
}

impl Encoded {
    /// Flattens into one buffer regardless of which variant this is —
    /// convenient for callers (and tests) that don't have vectored I/O.
    pub fn into_contiguous(self) -> BytesMut {
        match self {
            Encoded::Merged(buf) => buf,
            Encoded::Gathered { mut header, payload } => {
                header.extend_from_slice(&payload);
                header
            }
        }
    }
}

pub struct WsEncoderConfig {
    pub side: Side,
}

pub struct WsEncoder {
    config: WsEncoderConfig,
}

impl WsEncoder {
    pub fn new(config: WsEncoderConfig) -> WsEncoder {
        WsEncoder { config }
    }

    pub fn encode(&mut self, frame: &Frame) -> Result<Encoded, WsError> {
        if frame.opcode.is_control() {
            if !frame.fin || frame.payload.len() > 125 {
                return Err(WsError::InvalidControlFrame);
            }
        }

        let masked = matches!(self.config.side, Side::Client);
        let mask_key = if masked { Some(random_mask_key()) } else { None };

        let mut header = BytesMut::with_capacity(14);
        let mut first = frame.opcode.as_u8();
        if frame.fin { first |= 0x80; }
        if frame.rsv1 { first |= 0x40; }
        if frame.rsv2 { first |= 0x20; }
        if frame.rsv3 { first |= 0x10; }
        header.put_u8(first);

        let len = frame.payload.len();
        let mask_bit = if masked { 0x80 } else { 0x00 };
        if len < 126 {
            header.put_u8(mask_bit | len as u8);
        } else if len <= 0xFFFF {
            header.put_u8(mask_bit | 126);
            header.put_u16(len as u16);
        } else {
            header.put_u8(mask_bit | 127);
            header.put_u64(len as u64);
        }

        if let Some(key) = mask_key {
            header.extend_from_slice(&key);
        }

        if len < MERGE_THRESHOLD {
            header.reserve(len);
            if let Some(key) = mask_key {
                let mut payload = frame.payload.to_vec();
                super::mask::apply_mask(key, &mut payload);
                header.extend_from_slice(&payload);
            } else {
                header.extend_from_slice(&frame.payload);
            }
            Ok(Encoded::Merged(header))
        } else if let Some(key) = mask_key {
            let mut payload = frame.payload.to_vec();
            super::mask::apply_mask(key, &mut payload);
            Ok(Encoded::Gathered { header, payload: payload.into() })
        } else {
            Ok(Encoded::Gathered { header, payload: frame.payload.clone() })
        }
    }
}

fn random_mask_key() -> [u8; 4] {
    let mut key = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::websocket::frame::Frame;

    #[test]
    fn server_frames_are_unmasked() {
        let mut enc = WsEncoder::new(WsEncoderConfig { side: Side::Server });
        let frame = Frame::text(&b"hi"[..]);
        let buf = enc.encode(&frame).unwrap().into_contiguous();
        assert_eq!(buf[1] & 0x80, 0);
        assert_eq!(&buf[2..], b"hi");
    }

    #[test]
    fn client_frames_are_masked_and_round_trip() {
        let mut enc = WsEncoder::new(WsEncoderConfig { side: Side::Client });
        let frame = Frame::text(&b"hello"[..]);
        let buf = enc.encode(&frame).unwrap().into_contiguous();
        assert_eq!(buf[1] & 0x80, 0x80);
        let key = [buf[2], buf[3], buf[4], buf[5]];
        let mut payload = buf[6..].to_vec();
        super::super::mask::apply_mask(key, &mut payload);
        assert_eq!(payload, b"hello");
    }

    #[test]
    fn large_payload_is_gathered() {
        let mut enc = WsEncoder::new(WsEncoderConfig { side: Side::Server });
        let payload = vec![0x41u8; MERGE_THRESHOLD + 1];
        let frame = Frame::binary(payload.clone());
        match enc.encode(&frame).unwrap() {
            Encoded::Gathered { payload: p, .. } => assert_eq!(&p[..], &payload[..]),
            Encoded::Merged(_) => panic!("expected gathered write for large payload"),
        }
    }

    #[test]
    fn oversize_ping_rejected() {
        let mut enc = WsEncoder::new(WsEncoderConfig { side: Side::Server });
        let frame = Frame::ping(vec![0u8; 126]);
        assert!(enc.encode(&frame).is_err());
    }

    #[test]
    fn length_ladder_16_bit() {
        let mut enc = WsEncoder::new(WsEncoderConfig { side: Side::Server });
        let payload = vec![0u8; 200];
        let frame = Frame::binary(payload);
        let buf = enc.encode(&frame).unwrap().into_contiguous();
        assert_eq!(buf[1], 126);
        assert_eq!(u16::from_be_bytes([buf[2], buf[3]]), 200);
    }
}
