//! Incremental, resumable HTTP/1.x parser.
//!
//! The wire protocol is naturally coroutine-shaped: read a line, maybe
//! suspend for more bytes, read another line, and so on. Rust has no cheap
//! stackful coroutines, so this is an explicit state machine instead: each
//! suspension point is a real `Phase` variant and `advance()` returns
//! [`Poll::NeedMore`] instead of yielding control mid-function. No byte is
//! ever consumed twice across suspensions; a partial line or partial chunk
//! body is simply left in the buffer for the next `advance()` call.

use std::mem;

use crate::error::ProtocolError;
use crate::headers::Headers;
use crate::message::Message;
use crate::version::Version;

/// Longest start-line or header line this parser will buffer before giving
/// up with [`ProtocolError::LineTooLong`].
pub const MAX_LINE_LENGTH: usize = 32_768;
/// Most headers a single message may carry.
pub const MAX_HEADERS: usize = 128;
/// Ceiling on a single `Content-Length` declaration. Generous but finite, so
/// a single absurd header can't force an unbounded allocation plan; this is
/// bookkeeping only, the parser never buffers a whole body regardless of
/// size.
pub const MAX_BODY_SIZE: u64 = 1 << 30;

/// Proof that the holder knows which message is current, checked against
/// the parser's own generation counter.
///
/// HTTP/1.x never has more than one message in flight per connection at the
/// application layer, so rather than cloning a `Message` into every `Event`
/// variant, events carry this handle and the caller looks the live message
/// up via [`Parser::message`]. The wrapped generation is bumped every time a
/// new start-line is parsed, so a handle from a superseded message is
/// distinguishable from the current one instead of silently resolving to
/// whatever message happens to be in flight now.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MessageHandle(u64);

/// One parsing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Headers complete for a request.
    Request(MessageHandle),
    /// Headers complete for a response.
    Response(MessageHandle),
    /// Next body chunk. Never empty.
    Data(MessageHandle, Vec<u8>),
    /// The message is complete; no further event will reference it.
    End(MessageHandle),
}

/// Result of a single [`Parser::advance`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Event(Event),
    /// Not enough buffered data to make progress; feed more bytes (or call
    /// `eof()`) and call `advance()` again.
    NeedMore,
}

#[derive(Debug)]
enum ChunkState {
    ReadSize,
    ReadData(u64),
    ReadDataCrlf,
    ReadTrailers,
}

#[derive(Debug)]
enum BodyMode {
    Chunked(ChunkState),
    Bounded(u64),
    ConnectionClose,
    None,
}

#[derive(Debug)]
enum Phase {
    FirstLine,
    Headers(usize),
    Body(BodyMode),
    /// Connection-close mode has run to completion; no further message will
    /// ever start on this buffer.
    Closed,
}

/// A resumable HTTP/1.x message parser.
///
/// Owns its own input buffer, fed via [`Parser::feed`]. Call
/// [`Parser::advance`] in a loop until it returns [`Poll::NeedMore`], then
/// wait for more bytes. This type does no I/O of its own; it is pure
/// byte-buffer-in, event-out logic, which is what makes it unit-testable
/// without a socket.
pub struct Parser {
    data: Vec<u8>,
    pos: usize,
    eof: bool,
    phase: Phase,
    current: Option<Message>,
    last_header_name: Option<String>,
    /// Bumped every time a new start-line is parsed; see [`MessageHandle`].
    generation: u64,
}

impl Default for Parser {
    fn default() -> Parser {
        Parser::new()
    }
}

impl Parser {
    pub fn new() -> Parser {
        Parser {
            data: Vec::new(),
            pos: 0,
            eof: false,
            phase: Phase::FirstLine,
            current: None,
            last_header_name: None,
            generation: 0,
        }
    }

    /// Appends bytes to the internal buffer. Never blocks, never parses.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Signals that the peer will send no more bytes. Only meaningful in
    /// connection-close body mode; elsewhere a subsequent `advance()` that
    /// still lacks data for a bounded or chunked read is simply a framing
    /// error waiting to happen for the *caller* to detect (a closed socket),
    /// not something this parser raises itself.
    pub fn eof(&mut self) {
        self.eof = true;
    }

    /// Looks up the message a handle refers to.
    ///
    /// Panics if `handle` belongs to a message the parser has already moved
    /// past (its generation doesn't match the current one) or if called
    /// with no message in flight at all. A [`MessageHandle`] is only valid
    /// until the next start-line is parsed; callers must resolve it before
    /// driving `advance()` again, the way `Connection::dispatch`
    /// (`crate::server::connection`) does.
    pub fn message(&self, handle: MessageHandle) -> &Message {
        assert_eq!(
            handle.0, self.generation,
            "MessageHandle used after the message it referred to was superseded"
        );
        self.current
            .as_ref()
            .expect("MessageHandle used without an in-flight message")
    }

    /// Drives the state machine forward by one event, or reports that more
    /// input is needed.
    pub fn advance(&mut self) -> Result<Poll, ProtocolError> {
        loop {
            self.compact();
            let phase = mem::replace(&mut self.phase, Phase::Closed);
            match phase {
                Phase::FirstLine => match self.take_line()? {
                    None => {
                        self.phase = Phase::FirstLine;
                        return Ok(Poll::NeedMore);
                    }
                    Some(line) => {
                        self.current = Some(parse_start_line(&line)?);
                        self.last_header_name = None;
                        self.generation = self.generation.wrapping_add(1);
                        self.phase = Phase::Headers(0);
                    }
                },
                Phase::Headers(count) => match self.take_line()? {
                    None => {
                        self.phase = Phase::Headers(count);
                        return Ok(Poll::NeedMore);
                    }
                    Some(line) => {
                        if line.is_empty() {
                            let msg = self.current.as_ref().expect("start-line already parsed");
                            let mode = decide_body_mode(msg)?;
                            self.phase = Phase::Body(mode);
                            let handle = MessageHandle(self.generation);
                            let event = if msg.is_request() {
                                Event::Request(handle)
                            } else {
                                Event::Response(handle)
                            };
                            return Ok(Poll::Event(event));
                        } else if line.starts_with(' ') || line.starts_with('\t') {
                            let name = self
                                .last_header_name
                                .clone()
                                .ok_or(ProtocolError::MissingColon)?;
                            self.current
                                .as_mut()
                                .expect("start-line already parsed")
                                .headers_mut()
                                .fold(&name, line.trim());
                            self.phase = Phase::Headers(count);
                        } else {
                            let idx = line.find(':').ok_or(ProtocolError::MissingColon)?;
                            let name = line[..idx].trim().to_ascii_lowercase();
                            let value = line[idx + 1..].trim().to_string();
                            self.current
                                .as_mut()
                                .expect("start-line already parsed")
                                .headers_mut()
                                .insert_if_absent(&name, value);
                            self.last_header_name = Some(name);
                            let count = count + 1;
                            if count > MAX_HEADERS {
                                return Err(ProtocolError::TooManyHeaders);
                            }
                            self.phase = Phase::Headers(count);
                        }
                    }
                },
                Phase::Body(mode) => match self.advance_body(mode)? {
                    BodyStep::Event(event, next) => {
                        self.phase = next;
                        return Ok(Poll::Event(event));
                    }
                    BodyStep::Continue(mode) => {
                        // Internal state transition with no event yet (e.g. a
                        // chunk-size line just parsed) — loop again instead
                        // of reporting NeedMore, since the next step might
                        // already be satisfiable from buffered data.
                        self.phase = Phase::Body(mode);
                    }
                    BodyStep::Blocked(mode) => {
                        self.phase = Phase::Body(mode);
                        return Ok(Poll::NeedMore);
                    }
                },
                Phase::Closed => {
                    self.phase = Phase::Closed;
                    return Ok(Poll::NeedMore);
                }
            }
        }
    }

    fn advance_body(&mut self, mode: BodyMode) -> Result<BodyStep, ProtocolError> {
        let handle = MessageHandle(self.generation);
        match mode {
            BodyMode::None => Ok(BodyStep::Event(Event::End(handle), Phase::FirstLine)),
            BodyMode::Bounded(remaining) => {
                if remaining == 0 {
                    return Ok(BodyStep::Event(Event::End(handle), Phase::FirstLine));
                }
                let chunk = self.take_bytes_up_to(remaining);
                if chunk.is_empty() {
                    return Ok(BodyStep::Blocked(BodyMode::Bounded(remaining)));
                }
                let left = remaining - chunk.len() as u64;
                Ok(BodyStep::Event(
                    Event::Data(handle, chunk),
                    Phase::Body(BodyMode::Bounded(left)),
                ))
            }
            BodyMode::ConnectionClose => {
                let available = self.available();
                if available > 0 {
                    let chunk = self.take_bytes_up_to(available as u64);
                    Ok(BodyStep::Event(
                        Event::Data(handle, chunk),
                        Phase::Body(BodyMode::ConnectionClose),
                    ))
                } else if self.eof {
                    Ok(BodyStep::Event(Event::End(handle), Phase::Closed))
                } else {
                    Ok(BodyStep::Blocked(BodyMode::ConnectionClose))
                }
            }
            BodyMode::Chunked(state) => self.advance_chunked(state, handle),
        }
    }

    fn advance_chunked(
        &mut self,
        state: ChunkState,
        handle: MessageHandle,
    ) -> Result<BodyStep, ProtocolError> {
        match state {
            ChunkState::ReadSize => match self.take_line()? {
                None => Ok(BodyStep::Blocked(BodyMode::Chunked(ChunkState::ReadSize))),
                Some(line) => {
                    let token = line.split_whitespace().next().unwrap_or("");
                    let size = u64::from_str_radix(token, 16)
                        .map_err(|_| ProtocolError::BadChunkSize)?;
                    let next = if size == 0 {
                        ChunkState::ReadTrailers
                    } else {
                        ChunkState::ReadData(size)
                    };
                    Ok(BodyStep::Continue(BodyMode::Chunked(next)))
                }
            },
            ChunkState::ReadData(remaining) => {
                let chunk = self.take_bytes_up_to(remaining);
                if chunk.is_empty() {
                    return Ok(BodyStep::Blocked(BodyMode::Chunked(ChunkState::ReadData(
                        remaining,
                    ))));
                }
                let left = remaining - chunk.len() as u64;
                let next = if left == 0 {
                    ChunkState::ReadDataCrlf
                } else {
                    ChunkState::ReadData(left)
                };
                Ok(BodyStep::Event(
                    Event::Data(handle, chunk),
                    Phase::Body(BodyMode::Chunked(next)),
                ))
            }
            ChunkState::ReadDataCrlf => match self.take_line()? {
                None => Ok(BodyStep::Blocked(BodyMode::Chunked(
                    ChunkState::ReadDataCrlf,
                ))),
                Some(_) => Ok(BodyStep::Continue(BodyMode::Chunked(ChunkState::ReadSize))),
            },
            ChunkState::ReadTrailers => match self.take_line()? {
                None => Ok(BodyStep::Blocked(BodyMode::Chunked(
                    ChunkState::ReadTrailers,
                ))),
                Some(line) => {
                    if line.is_empty() {
                        Ok(BodyStep::Event(Event::End(handle), Phase::FirstLine))
                    } else {
                        Ok(BodyStep::Continue(BodyMode::Chunked(ChunkState::ReadTrailers)))
                    }
                }
            },
        }
    }

    fn take_line(&mut self) -> Result<Option<String>, ProtocolError> {
        let start = self.pos;
        if let Some(idx) = find_subslice(&self.data[start..], b"\r\n") {
            let end = start + idx;
            let line = decode_line(&self.data[start..end]);
            self.pos = end + 2;
            return Ok(Some(line));
        }
        if let Some(idx) = self.data[start..].iter().position(|&b| b == b'\n') {
            let end = start + idx;
            let line = decode_line(&self.data[start..end]);
            self.pos = end + 1;
            return Ok(Some(line));
        }
        if self.data.len() - start > MAX_LINE_LENGTH {
            return Err(ProtocolError::LineTooLong);
        }
        Ok(None)
    }

    fn take_bytes_up_to(&mut self, n: u64) -> Vec<u8> {
        let available = self.data.len() - self.pos;
        let take = std::cmp::min(available, n as usize);
        let out = self.data[self.pos..self.pos + take].to_vec();
        self.pos += take;
        out
    }

    fn available(&self) -> usize {
        self.data.len() - self.pos
    }

    fn compact(&mut self) {
        if self.pos > 0 && (self.pos == self.data.len() || self.pos > 16_384) {
            self.data.drain(0..self.pos);
            self.pos = 0;
        }
    }
}

/// Internal plumbing for [`Parser::advance_body`]/[`Parser::advance_chunked`].
enum BodyStep {
    /// An event is ready to report; move to the given phase.
    Event(Event, Phase),
    /// Internal state transition happened with no event yet produced (e.g. a
    /// chunk-size line was just parsed) — the outer loop retries immediately
    /// rather than suspending, since the next step may already be
    /// satisfiable from buffered data.
    Continue(BodyMode),
    /// Genuinely out of data; the outer loop suspends and reports
    /// `Poll::NeedMore`.
    Blocked(BodyMode),
}

fn decode_line(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn find_subslice(hay: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    hay.windows(needle.len()).position(|w| w == needle)
}

fn parse_start_line(line: &str) -> Result<Message, ProtocolError> {
    let mut parts = line.splitn(3, ' ');
    let first = parts.next().filter(|s| !s.is_empty()).ok_or(ProtocolError::BadStartLine)?;
    let second = parts.next().filter(|s| !s.is_empty()).ok_or(ProtocolError::BadStartLine)?;
    let third = parts.next().filter(|s| !s.is_empty()).ok_or(ProtocolError::BadStartLine)?;
    if first.starts_with("HTTP/") {
        Ok(Message::response(first, second, third, Headers::new()))
    } else if third.starts_with("HTTP/") {
        Ok(Message::request(first, second, third, Headers::new()))
    } else {
        Err(ProtocolError::BadStartLine)
    }
}

fn is_no_body_status(code: &str) -> bool {
    code == "204" || code == "304" || (code.len() == 3 && code.as_bytes()[0] == b'1')
}

fn decide_body_mode(msg: &Message) -> Result<BodyMode, ProtocolError> {
    let transfer_encoding = msg.header("transfer-encoding").to_ascii_lowercase();
    if transfer_encoding.contains("chunked") {
        return Ok(BodyMode::Chunked(ChunkState::ReadSize));
    }

    let content_length = msg.header("content-length");
    if !content_length.is_empty() {
        let n: u64 = content_length
            .trim()
            .parse()
            .map_err(|_| ProtocolError::BadContentLength)?;
        if n > MAX_BODY_SIZE {
            return Err(ProtocolError::BodyTooLarge);
        }
        return Ok(BodyMode::Bounded(n));
    }

    if msg.is_response() {
        if let Some(code) = msg.code() {
            if is_no_body_status(code) {
                return Ok(BodyMode::None);
            }
        }
        // The reference implementation's actual condition is broader than a
        // literal `Connection: close`: any response with no usable length
        // falls back to connection-close framing unless the peer explicitly
        // asked to keep the connection alive on HTTP/1.1.
        let connection = msg.header("connection").to_ascii_lowercase();
        let http10 = msg.version() == Some(Version::Http10);
        if connection != "keep-alive" || http10 {
            return Ok(BodyMode::ConnectionClose);
        }
        return Ok(BodyMode::None);
    }

    Ok(BodyMode::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(parser: &mut Parser) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match parser.advance().expect("parse error") {
                Poll::Event(event) => events.push(event),
                Poll::NeedMore => break,
            }
        }
        events
    }

    #[test]
    fn content_length_request() {
        let mut p = Parser::new();
        p.feed(b"POST /p HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello");
        let events = drain(&mut p);
        assert_eq!(events.len(), 3);
        match &events[0] {
            Event::Request(h) => {
                let msg = p.message(*h);
                assert_eq!(msg.method(), Some("POST"));
                assert_eq!(msg.url(), Some("/p"));
            }
            other => panic!("expected Request, got {:?}", other),
        }
        assert_eq!(events[1], Event::Data(MessageHandle(1), b"hello".to_vec()));
        assert_eq!(events[2], Event::End(MessageHandle(1)));
    }

    #[test]
    fn chunked_request_concatenates_in_order() {
        let mut p = Parser::new();
        p.feed(b"PUT /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
                 5\r\nhello\r\n3\r\nabc\r\n0\r\n\r\n");
        let events = drain(&mut p);
        let body: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                Event::Data(_, bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(body, b"helloabc");
        assert!(matches!(events.last(), Some(Event::End(_))));
    }

    #[test]
    fn connection_close_response_body_ends_on_eof() {
        let mut p = Parser::new();
        p.feed(b"HTTP/1.0 200 OK\r\nConnection: close\r\n\r\nbody-bytes");
        let mut events = drain(&mut p);
        assert!(matches!(events.remove(0), Event::Response(_)));
        assert_eq!(events.remove(0), Event::Data(MessageHandle(1), b"body-bytes".to_vec()));
        assert!(matches!(p.advance().unwrap(), Poll::NeedMore));
        p.eof();
        assert_eq!(p.advance().unwrap(), Poll::Event(Event::End(MessageHandle(1))));
    }

    #[test]
    fn no_body_statuses_skip_straight_to_end() {
        for status_line in [
            "HTTP/1.1 204 No Content\r\n\r\n",
            "HTTP/1.1 304 Not Modified\r\n\r\n",
        ] {
            let mut p = Parser::new();
            p.feed(status_line.as_bytes());
            let events = drain(&mut p);
            assert_eq!(events.len(), 2);
            assert!(matches!(events[0], Event::Response(_)));
            assert!(matches!(events[1], Event::End(_)));
        }
    }

    #[test]
    fn header_folding_joins_with_single_space() {
        let mut p = Parser::new();
        p.feed(b"GET /p HTTP/1.1\r\nX-Multi: a\r\n b\r\n\r\n");
        match p.advance().unwrap() {
            Poll::Event(Event::Request(h)) => {
                assert_eq!(p.message(h).header("x-multi"), "a b");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn oversize_first_line_is_a_protocol_error() {
        let mut p = Parser::new();
        let mut line = vec![b'a'; 40_000];
        line.extend_from_slice(b" /x HTTP/1.1");
        p.feed(&line);
        let err = p.advance().unwrap_err();
        assert!(matches!(err, ProtocolError::LineTooLong));
    }

    #[test]
    fn feed_granularity_does_not_change_event_sequence() {
        let whole = b"POST /p HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello".to_vec();

        let mut one_shot = Parser::new();
        one_shot.feed(&whole);
        let expected = drain(&mut one_shot);

        let mut byte_by_byte = Parser::new();
        let mut events = Vec::new();
        for b in &whole {
            byte_by_byte.feed(&[*b]);
            loop {
                match byte_by_byte.advance().expect("parse error") {
                    Poll::Event(e) => events.push(e),
                    Poll::NeedMore => break,
                }
            }
        }
        assert_eq!(events, expected);
    }

    #[test]
    fn pipelining_continues_after_end_on_keep_alive() {
        let mut p = Parser::new();
        p.feed(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");
        let events = drain(&mut p);
        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], Event::Request(_)));
        assert!(matches!(events[1], Event::End(_)));
        assert!(matches!(events[2], Event::Request(_)));
        assert!(matches!(events[3], Event::End(_)));
    }

    #[test]
    fn missing_colon_on_header_line_is_protocol_error() {
        let mut p = Parser::new();
        p.feed(b"GET /p HTTP/1.1\r\nBroken Header Line\r\n\r\n");
        let err = p.advance().unwrap_err();
        assert!(matches!(err, ProtocolError::MissingColon));
    }

    #[test]
    fn chunk_size_line_with_extension_is_a_protocol_error() {
        // Chunk extensions are separated by ';' with no whitespace, so the
        // whole "5;bogus" token fails to parse as hex rather than silently
        // being truncated to "5".
        let mut p = Parser::new();
        p.feed(b"PUT /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5;bogus\r\nhello\r\n");
        let err = p.advance().unwrap_err();
        assert!(matches!(err, ProtocolError::BadChunkSize));
    }

    #[test]
    fn bad_chunk_size_is_protocol_error() {
        let mut p = Parser::new();
        p.feed(b"PUT /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n");
        let err = p.advance().unwrap_err();
        assert!(matches!(err, ProtocolError::BadChunkSize));
    }

    #[test]
    fn content_length_over_limit_is_body_too_large() {
        let mut p = Parser::new();
        let line = format!(
            "POST /p HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            MAX_BODY_SIZE + 1
        );
        p.feed(line.as_bytes());
        let err = p.advance().unwrap_err();
        assert!(matches!(err, ProtocolError::BodyTooLarge));
    }
}
