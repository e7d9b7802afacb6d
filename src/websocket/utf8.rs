//! Incremental UTF-8 validation (RFC 3629), used to check `Text` frame
//! payloads — and `Close` frame reason text — a byte at a time as they
//! arrive, since a multi-byte sequence can straddle two TCP reads or two
//! fragments of the same WebSocket message.
//!
//! Implemented as the well-known Bjoern Hoehrmann DFA: one state byte, one
//! 256-entry character-class table, one 9*12 transition table. `ACCEPT`
//! (0) means "valid and complete so far"; `REJECT` (1) is a sink state.

const ACCEPT: u8 = 0;
const REJECT: u8 = 1;

#[rustfmt::skip]
const CLASSES: [u8; 256] = [
    0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0,
    0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0,
    0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0,
    0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0, 0,0,0,0,0,0,0,0,
    1,1,1,1,1,1,1,1, 1,1,1,1,1,1,1,1, 9,9,9,9,9,9,9,9, 9,9,9,9,9,9,9,9,
    7,7,7,7,7,7,7,7, 7,7,7,7,7,7,7,7, 7,7,7,7,7,7,7,7, 7,7,7,7,7,7,7,7,
    8,8,2,2,2,2,2,2, 2,2,2,2,2,2,2,2, 2,2,2,2,2,2,2,2, 2,2,2,2,2,2,2,2,
    10,3,3,3,3,3,3,3, 3,3,3,3,3,3,3,3, 4,3,3,11,6,6,6,5, 8,8,8,8,8,8,8,8,
];

#[rustfmt::skip]
const TRANSITIONS: [u8; 108] = [
    0,1,2,3,5,8,7,1,1,1,4,6,
    1,1,1,1,1,1,1,1,1,1,1,1,
    1,0,1,1,1,1,1,0,1,0,1,1,
    1,2,1,1,1,1,1,2,1,2,1,1,
    1,1,1,1,1,1,1,2,1,1,1,1,
    1,2,1,1,1,1,1,1,1,2,1,1,
    1,1,1,1,1,1,1,3,1,3,1,1,
    1,3,1,1,1,1,1,3,1,3,1,1,
    1,3,1,1,1,1,1,1,1,1,1,1,
];

/// Running state of the incremental decoder. Create with `Utf8Validator::new`,
/// feed bytes via `feed`, and check `is_accepting` once input is exhausted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Utf8Validator {
    state: u8,
}

impl Utf8Validator {
    pub fn new() -> Utf8Validator {
        Utf8Validator { state: ACCEPT }
    }

    /// Feeds one more byte. Returns `false` as soon as the sequence is
    /// proven invalid (the sink `REJECT` state), at which point the
    /// validator should not be fed further bytes.
    pub fn feed(&mut self, byte: u8) -> bool {
        let class = CLASSES[byte as usize];
        self.state = TRANSITIONS[(self.state as usize) * 12 + class as usize];
        self.state != REJECT
    }

    /// Feeds a whole slice; short-circuits and returns `false` on the
    /// first invalid byte.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> bool {
        for &b in bytes {
            if !self.feed(b) {
                return false;
            }
        }
        true
    }

    /// True if every byte fed so far forms complete, valid UTF-8 (i.e. we
    /// are not mid-sequence and have not rejected).
    pub fn is_accepting(&self) -> bool {
        self.state == ACCEPT
    }

    pub fn is_rejected(&self) -> bool {
        self.state == REJECT
    }
}

/// One-shot validation convenience for a complete buffer (e.g. a `Close`
/// frame's reason text, which arrives whole).
pub fn is_valid_utf8(bytes: &[u8]) -> bool {
    let mut v = Utf8Validator::new();
    v.feed_slice(bytes) && v.is_accepting()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accepts_ascii() {
        assert!(is_valid_utf8(b"hello world"));
    }

    #[test]
    fn accepts_multibyte() {
        assert!(is_valid_utf8("héllo – wörld 日本語".as_bytes()));
    }

    #[test]
    fn rejects_truncated_sequence() {
        // 0xE2 0x82 is the start of a 3-byte sequence (e.g. U+20AC) with
        // the final continuation byte missing.
        assert!(!is_valid_utf8(&[0xE2, 0x82]));
    }

    #[test]
    fn rejects_overlong_encoding() {
        // Overlong encoding of NUL (0xC0 0x80) must be rejected.
        assert!(!is_valid_utf8(&[0xC0, 0x80]));
    }

    #[test]
    fn split_feed_matches_whole_feed() {
        let text = "incremental ütf-8 validation 🎉".as_bytes();
        let mut whole = Utf8Validator::new();
        assert!(whole.feed_slice(text));
        assert!(whole.is_accepting());

        let mut incremental = Utf8Validator::new();
        for &b in text {
            assert!(incremental.feed(b));
        }
        assert!(incremental.is_accepting());
    }

    #[test]
    fn mid_sequence_is_not_accepting() {
        let mut v = Utf8Validator::new();
        v.feed(0xE2);
        assert!(!v.is_accepting());
        v.feed(0x82);
        assert!(!v.is_accepting());
        v.feed(0xAC);
        assert!(v.is_accepting());
    }
}
