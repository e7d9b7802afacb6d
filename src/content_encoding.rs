//! Interfaces for pluggable content-coding backends (`gzip`, `deflate`,
//! `br`, ...). This crate implements none of them — spec.md §1 explicitly
//! treats compression backends as an external collaborator — but the
//! aggregator and encoder need a seam to call through to whatever the
//! application wires up, so it lives here as a pair of traits.

use bytes::{Bytes, BytesMut};

/// Decompresses a request or response body incrementally. Implementations
/// live outside this crate (e.g. wrapping `flate2` or `brotli`).
pub trait ContentDecoder {
    type Error;

    /// Feeds one more chunk of compressed input, appending any decompressed
    /// bytes that became available to `out`.
    fn decode(&mut self, input: &[u8], out: &mut BytesMut) -> Result<(), Self::Error>;

    /// Signals end of input, flushing any buffered output.
    fn finish(&mut self, out: &mut BytesMut) -> Result<(), Self::Error>;
}

/// Compresses a request or response body incrementally.
pub trait ContentEncoder {
    type Error;

    fn encode(&mut self, input: &[u8], out: &mut BytesMut) -> Result<(), Self::Error>;

    fn finish(&mut self, out: &mut BytesMut) -> Result<Bytes, Self::Error>;
}

/// No-op passthrough, used as the default when no `Content-Encoding` is
/// negotiated.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl ContentDecoder for Identity {
    type Error = std::convert::Infallible;

    fn decode(&mut self, input: &[u8], out: &mut BytesMut) -> Result<(), Self::Error> {
        out.extend_from_slice(input);
        Ok(())
    }

    fn finish(&mut self, _out: &mut BytesMut) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ContentEncoder for Identity {
    type Error = std::convert::Infallible;

    fn encode(&mut self, input: &[u8], out: &mut BytesMut) -> Result<(), Self::Error> {
        out.extend_from_slice(input);
        Ok(())
    }

    fn finish(&mut self, _out: &mut BytesMut) -> Result<Bytes, Self::Error> {
        Ok(Bytes::new())
    }
}
