/// Status codes the codec itself needs to name directly (the informational,
/// upgrade, and error-synthesis codes used by the decoder, encoder and
/// aggregator). Applications are free to write any other status code via
/// `Status::Raw` or `Encoder::custom_status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Any status code not named below, carried with its reason phrase.
    Raw(u16, String),

    Continue,                  // 100
    SwitchingProtocols,        // 101
    Ok,                        // 200
    NoContent,                 // 204
    NotModified,               // 304
    BadRequest,                // 400
    Forbidden,                 // 403
    NotFound,                  // 404
    RequestEntityTooLarge,     // 413
    ExpectationFailed,         // 417
    UpgradeRequired,           // 426
    InternalServerError,       // 500
    NotImplemented,            // 501
    HttpVersionNotSupported,   // 505
}

impl Status {
    /// Numeric status code.
    pub fn code(&self) -> u16 {
        use Status::*;
        match *self {
            Continue => 100,
            SwitchingProtocols => 101,
            Ok => 200,
            NoContent => 204,
            NotModified => 304,
            BadRequest => 400,
            Forbidden => 403,
            NotFound => 404,
            RequestEntityTooLarge => 413,
            ExpectationFailed => 417,
            UpgradeRequired => 426,
            InternalServerError => 500,
            NotImplemented => 501,
            HttpVersionNotSupported => 505,
            Raw(code, _) => code,
        }
    }

    /// Default reason phrase for this status code.
    pub fn reason(&self) -> &str {
        use Status::*;
        match *self {
            Continue => "Continue",
            SwitchingProtocols => "Switching Protocols",
            Ok => "OK",
            NoContent => "No Content",
            NotModified => "Not Modified",
            BadRequest => "Bad Request",
            Forbidden => "Forbidden",
            NotFound => "Not Found",
            RequestEntityTooLarge => "Request Entity Too Large",
            ExpectationFailed => "Expectation Failed",
            UpgradeRequired => "Upgrade Required",
            InternalServerError => "Internal Server Error",
            NotImplemented => "Not Implemented",
            HttpVersionNotSupported => "HTTP Version Not Supported",
            Raw(_, ref reason) => reason,
        }
    }

    /// Whether a response with this status code is *permitted* to carry
    /// a body at the framing layer.
    ///
    /// Per spec.md §9 open question (c), this is deliberately written out
    /// as an explicit rule rather than derived from loosely-related
    /// booleans: `HTTP/1.0 always [pass-through], 1xx always, 204/304
    /// always, and HEAD/CONNECT(200) always` are the cases with *no*
    /// body, handled separately by the encoder via `Body::Denied`/`Head`;
    /// this method only covers the status-code-intrinsic part of that
    /// rule (1xx/204/304).
    pub fn always_bodyless(&self) -> bool {
        let code = self.code();
        (code >= 100 && code < 200) || code == 204 || code == 304
    }
}
