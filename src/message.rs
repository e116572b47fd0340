//! In-memory representation of a parsed HTTP message.

use std::str::from_utf8;

use crate::error::DecodeError;
use crate::headers::Headers;
use crate::version::Version;

/// Either a request line (`method`/`url`) or a status line (`code`/`reason`)
/// is populated, never both; `protocol` is always populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request {
        method: String,
        url: String,
    },
    Response {
        code: String,
        reason: String,
    },
}

/// A parsed HTTP request or response.
///
/// Constructed by the [`Parser`](crate::parser::Parser) when a start-line
/// and its header block are fully read; mutated only by the parser (header
/// insertion, body-chunk append) until the terminal `end` event. From a
/// [`Handler`](crate::server::handler::Handler)'s perspective it is
/// read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    start_line: StartLine,
    protocol: String,
    headers: Headers,
    body: Vec<Vec<u8>>,
}

impl Message {
    pub fn request(method: impl Into<String>, url: impl Into<String>,
        protocol: impl Into<String>, headers: Headers) -> Message
    {
        Message {
            start_line: StartLine::Request { method: method.into(), url: url.into() },
            protocol: protocol.into(),
            headers,
            body: Vec::new(),
        }
    }

    pub fn response(protocol: impl Into<String>, code: impl Into<String>,
        reason: impl Into<String>, headers: Headers) -> Message
    {
        Message {
            start_line: StartLine::Response { code: code.into(), reason: reason.into() },
            protocol: protocol.into(),
            headers,
            body: Vec::new(),
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request { .. })
    }

    pub fn is_response(&self) -> bool {
        matches!(self.start_line, StartLine::Response { .. })
    }

    pub fn method(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { url, .. } => Some(url),
            StartLine::Response { .. } => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Response { code, .. } => Some(code),
            StartLine::Request { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Response { reason, .. } => Some(reason),
            StartLine::Request { .. } => None,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The protocol as a parsed [`Version`], if it is a version this crate
    /// recognizes. Unrecognized protocol tokens (e.g. a literal `HTTP/2.0`
    /// start-line sent over a plaintext HTTP/1.x upgrade attempt) fall back
    /// to `None`; body framing treats that the same as HTTP/1.1.
    pub fn version(&self) -> Option<Version> {
        Version::parse(&self.protocol)
    }

    /// Case-insensitive header lookup; returns the empty string when the
    /// header is absent, never fails.
    pub fn header(&self, name: &str) -> &str {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Appends a body chunk. Never validated against `Content-Length`;
    /// that accounting belongs to the [`Parser`](crate::parser::Parser).
    pub fn add_body_chunk(&mut self, chunk: Vec<u8>) {
        if !chunk.is_empty() {
            self.body.push(chunk);
        }
    }

    pub fn body_chunks(&self) -> &[Vec<u8>] {
        &self.body
    }

    /// Concatenates all body chunks received so far, in order.
    pub fn body_as_bytes(&self) -> Vec<u8> {
        let total: usize = self.body.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in &self.body {
            out.extend_from_slice(chunk);
        }
        out
    }

    /// Decodes the body to a string.
    ///
    /// Resolution order: caller-supplied `encoding`; the `charset=` token of
    /// `Content-Type`; `UTF-8` if `Content-Type` is `application/json` or
    /// `application/xml`; otherwise `ISO-8859-1`.
    pub fn body_as_string(&self, encoding: Option<&str>) -> Result<String, DecodeError> {
        let bytes = self.body_as_bytes();
        let chosen = encoding.map(str::to_string).unwrap_or_else(|| {
            let content_type = self.header("content-type").to_ascii_lowercase();
            if let Some(idx) = content_type.find("charset=") {
                content_type[idx + "charset=".len()..].trim().to_string()
            } else if content_type == "application/json" || content_type == "application/xml" {
                "utf-8".to_string()
            } else {
                "iso-8859-1".to_string()
            }
        });
        decode(&bytes, &chosen)
    }
}

fn decode(bytes: &[u8], encoding: &str) -> Result<String, DecodeError> {
    match encoding.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => {
            from_utf8(bytes)
                .map(str::to_string)
                .map_err(|err| DecodeError::InvalidBytes("UTF-8", err))
        }
        "iso-8859-1" | "latin1" | "latin-1" => {
            // Every byte 0x00..=0xFF is a valid Latin-1 code point, so this
            // mapping is total and never fails.
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
        other => Err(DecodeError::UnsupportedEncoding(other.to_string())),
    }
}
