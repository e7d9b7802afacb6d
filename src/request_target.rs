//! Parses the request-target grammar of RFC 7230 §5.3: origin-form,
//! absolute-form, authority-form (CONNECT), and asterisk-form (OPTIONS).
//! Grounded on the teacher's `src/server/request_target.rs`.

use std::fmt;

/// The parsed form of a request-target, kept distinct rather than
/// normalized so callers can tell which wire form the client actually sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// `/path?query`, the common case for ordinary requests.
    Origin(String),
    /// `http://host:port/path?query`, as sent to a forwarding proxy.
    Absolute(String),
    /// `host:port`, used only with `CONNECT`.
    Authority(String),
    /// Bare `*`, used only with `OPTIONS`.
    Asterisk,
}

impl RequestTarget {
    /// Parses the raw target string from the request line. `is_connect`
    /// selects authority-form parsing; everything else falls back to
    /// asterisk/origin/absolute detection.
    pub fn parse(raw: &str, is_connect: bool) -> Result<RequestTarget, ParseError> {
        if raw.is_empty() {
            return Err(ParseError);
        }
        if is_connect {
            if raw.contains('/') || raw.contains('?') {
                return Err(ParseError);
            }
            return Ok(RequestTarget::Authority(raw.to_string()));
        }
        if raw == "*" {
            return Ok(RequestTarget::Asterisk);
        }
        if raw.starts_with('/') {
            return Ok(RequestTarget::Origin(raw.to_string()));
        }
        if raw.contains("://") {
            return Ok(RequestTarget::Absolute(raw.to_string()));
        }
        Err(ParseError)
    }

    /// The path-and-query component, when this target has one.
    pub fn path(&self) -> Option<&str> {
        match *self {
            RequestTarget::Origin(ref s) => Some(s),
            RequestTarget::Absolute(ref s) => {
                s.find("://")
                    .and_then(|scheme_end| s[scheme_end + 3..].find('/')
                        .map(|i| scheme_end + 3 + i))
                    .map(|i| &s[i..])
            }
            RequestTarget::Authority(_) | RequestTarget::Asterisk => None,
        }
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            RequestTarget::Origin(ref s) => f.write_str(s),
            RequestTarget::Absolute(ref s) => f.write_str(s),
            RequestTarget::Authority(ref s) => f.write_str(s),
            RequestTarget::Asterisk => f.write_str("*"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid request-target")
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn origin_form() {
        assert_eq!(RequestTarget::parse("/a/b?c=d", false).unwrap(),
                   RequestTarget::Origin("/a/b?c=d".into()));
    }

    #[test]
    fn asterisk_form() {
        assert_eq!(RequestTarget::parse("*", false).unwrap(),
                   RequestTarget::Asterisk);
    }

    #[test]
    fn absolute_form() {
        let t = RequestTarget::parse("http://example.com/a/b", false).unwrap();
        assert_eq!(t, RequestTarget::Absolute("http://example.com/a/b".into()));
        assert_eq!(t.path(), Some("/a/b"));
    }

    #[test]
    fn authority_form_for_connect() {
        let t = RequestTarget::parse("example.com:443", true).unwrap();
        assert_eq!(t, RequestTarget::Authority("example.com:443".into()));
    }

    #[test]
    fn rejects_authority_form_outside_connect() {
        assert!(RequestTarget::parse("example.com:443", false).is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(RequestTarget::parse("", false).is_err());
    }
}
