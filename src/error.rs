//! Error taxonomy for the protocol engine.
//!
//! Every fallible subsystem gets its own `quick_error!`-defined enum
//! (mirroring the rest of this lineage); [`Error`] is the crate-wide sum
//! type handlers and embedders actually match on.

use std::io;
use std::str::Utf8Error;

use quick_error::quick_error;

quick_error! {
    /// Malformed input that makes the byte stream itself unparseable.
    ///
    /// Fatal for the connection: no response is synthesized, since the
    /// client's framing is already lost by the time this is raised.
    #[derive(Debug)]
    pub enum ProtocolError {
        LineTooLong {
            description("start-line or header line exceeds the maximum \
                         allowed length")
        }
        TooManyHeaders {
            description("message has more headers than allowed")
        }
        BadStartLine {
            description("start-line is not a valid request-line or \
                         status-line")
        }
        MissingColon {
            description("header line has no ':' separator")
        }
        BadChunkSize {
            description("chunk-size line is not a valid hexadecimal number")
        }
        BadContentLength {
            description("Content-Length value is not a valid non-negative \
                         integer")
        }
        BodyTooLarge {
            description("declared body size exceeds the configured limit")
        }
    }
}

quick_error! {
    /// Raised by [`crate::message::Message::body_as_string`].
    #[derive(Debug)]
    pub enum DecodeError {
        InvalidBytes(enc: &'static str, err: Utf8Error) {
            description("body bytes are not valid for the selected encoding")
            display("invalid {} bytes: {}", enc, err)
        }
        UnsupportedEncoding(name: String) {
            description("requested encoding is not implemented")
            display("unsupported encoding: {}", name)
        }
    }
}

quick_error! {
    /// An uncaught failure from application handler code.
    #[derive(Debug)]
    pub enum HandlerError {
        Failed(message: String) {
            description("request handler failed")
            display("request handler failed: {}", message)
        }
    }
}

quick_error! {
    /// Crate-wide error, composed from every fallible subsystem.
    #[derive(Debug)]
    pub enum Error {
        Protocol(err: ProtocolError) {
            from()
            description("protocol error")
            display("protocol error: {}", err)
        }
        Decode(err: DecodeError) {
            from()
            description("decode error")
            display("decode error: {}", err)
        }
        Handler(err: HandlerError) {
            from()
            description("handler error")
            display("handler error: {}", err)
        }
        Io(err: io::Error) {
            from()
            description("i/o error")
            display("i/o error: {}", err)
        }
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;
