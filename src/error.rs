//! Error enums for every codec subsystem, built with `quick_error!` the way
//! the teacher builds `tk_http::Error` and `server::Error` (spec.md §7:
//! the codec only ever returns errors — it never logs at `warn!`/`error!`
//! itself, leaving that call to the application).

quick_error! {
    /// A malformed header name or value (spec.md §3 "Header map" invariants).
    #[derive(Debug)]
    pub enum HeaderError {
        InvalidHeaderName {
            display("invalid header name")
        }
        InvalidHeaderValue {
            display("invalid header value")
        }
        TooManyHeaders {
            display("too many headers")
        }
        HeaderTooLong {
            display("header line too long")
        }
    }
}

quick_error! {
    /// Failures of the HTTP/1.x decoder (spec.md §4.1).
    #[derive(Debug)]
    pub enum DecodeError {
        /// The initial request/status line did not parse.
        InvalidInitialLine {
            display("invalid initial line")
        }
        /// The initial line exceeded `maxInitialLine`.
        InitialLineTooLong {
            display("initial request/status line too long")
        }
        Header(err: HeaderError) {
            display("header error: {}", err)
            from()
        }
        /// Header section exceeded `maxHeaderBytes`.
        HeadersTooLong {
            display("header section too long")
        }
        /// Conflicting or unparseable `Content-Length`.
        BadContentLength {
            display("invalid Content-Length")
        }
        /// `Transfer-Encoding` named an unsupported coding, or appeared
        /// together with `Content-Length` (request smuggling hazard).
        BadTransferEncoding {
            display("invalid or unsupported Transfer-Encoding")
        }
        /// A chunk-size line was malformed or exceeded `maxChunkSize`.
        BadChunkSize {
            display("invalid or oversized chunk size")
        }
        /// Chunk data was not followed by the expected CRLF.
        BadChunkTerminator {
            display("missing chunk terminator")
        }
        /// A byte arrived while the decoder was in `BadMessage` state.
        BadMessage {
            display("decoder is in an unrecoverable error state")
        }
        /// A byte arrived while the decoder had already handed off to the
        /// upgraded protocol.
        AlreadyUpgraded {
            display("decoder has handed off to an upgraded protocol")
        }
        /// The peer is not using a protocol version this decoder supports.
        UnsupportedVersion {
            display("unsupported HTTP version")
        }
        /// The connection closed mid-header, before a complete head was
        /// ever parsed (spec.md §4.1 end-of-stream handling, §7).
        PrematureClose {
            display("connection closed before a complete message head arrived")
        }
    }
}

quick_error! {
    /// Failures of the HTTP/1.x encoder (spec.md §4.2).
    #[derive(Debug)]
    pub enum EncodeError {
        Header(err: HeaderError) {
            display("header error: {}", err)
            from()
        }
        /// A write was attempted on content after the message's declared
        /// length (fixed or chunked) was already satisfied.
        ContentOverflow {
            display("wrote more body bytes than were declared")
        }
        /// `finish_content` was called before enough bytes had been
        /// written to satisfy a fixed `Content-Length`.
        ContentIncomplete {
            display("finished content before declared length was reached")
        }
        /// A method/state combination required a bodyless response (e.g.
        /// HEAD, 1xx, 204, 304) but body bytes were written anyway.
        BodyNotAllowed {
            display("body not allowed for this response")
        }
    }
}

quick_error! {
    /// Failures of the message aggregator (spec.md §4.3).
    #[derive(Debug)]
    pub enum AggregateError {
        Decode(err: DecodeError) {
            display("decode error: {}", err)
            from()
        }
        /// Aggregated body would exceed the configured `maxContentLength`.
        TooLarge {
            display("aggregated content exceeds the configured limit")
        }
    }
}
