use std::fmt;

/// HTTP request method.
///
/// `Head` and `Connect` get special-cased body-framing treatment by the
/// decoder and encoder (spec.md §4.1 rule 1, §9 open question (c)); every
/// other token is carried as `Other` so the codec never rejects an unknown
/// method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Options,
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Trace,
    Connect,
    Other(String),
}

impl Method {
    pub fn parse(s: &str) -> Method {
        match s {
            "OPTIONS" => Method::Options,
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "PATCH" => Method::Patch,
            "DELETE" => Method::Delete,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            other => Method::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match *self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Other(ref s) => s,
        }
    }

    /// Requests using this method never carry a response body regardless
    /// of what the response headers say (HEAD), or the response framing
    /// rules differ entirely (CONNECT on 2xx — handled by the encoder's
    /// sanitization hook, spec.md §4.2).
    pub fn is_head(&self) -> bool {
        matches!(self, Method::Head)
    }

    pub fn is_connect(&self) -> bool {
        matches!(self, Method::Connect)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
