//! The application-facing callback contract.

use crate::error::HandlerError;
use crate::message::Message;
use crate::server::connection::Connection;

/// Three callbacks a request handler implements. A fresh `Handler` is
/// instantiated per request by a [`crate::server::router::Router`] factory.
///
/// Default bodies are no-ops so a handler only overrides what it needs —
/// most handlers that don't care about streaming bodies only implement
/// `on_end`, and reach for [`BufferedHandler`] to skip even that
/// boilerplate.
pub trait Handler {
    fn on_request(&mut self, conn: &mut Connection, req: &Message) -> Result<(), HandlerError> {
        let _ = (conn, req);
        Ok(())
    }

    fn on_data(
        &mut self,
        conn: &mut Connection,
        req: &Message,
        chunk: &[u8],
    ) -> Result<(), HandlerError> {
        let _ = (conn, req, chunk);
        Ok(())
    }

    fn on_end(&mut self, conn: &mut Connection, req: &Message) -> Result<(), HandlerError> {
        let _ = (conn, req);
        Ok(())
    }
}

/// A zero-argument producer of a fresh [`Handler`], one per request.
pub type HandlerFactory = Box<dyn Fn() -> Box<dyn Handler>>;

/// Writes `HTTP/1.1 100 Continue\r\n\r\n` if the request asked for it.
///
/// Shared by [`BufferedHandler`] and any handler that wants the same
/// behavior without re-deriving it; per the wire protocol this must happen
/// before any body bytes are read, so callers invoke it from `on_request`.
pub fn answer_continue_if_requested(conn: &mut Connection, req: &Message) {
    if req.header("expect").eq_ignore_ascii_case("100-continue") {
        conn.write_raw(b"HTTP/1.1 100 Continue\r\n\r\n");
    }
}

/// Convenience wrapper for the common case: buffer the whole request body,
/// then build one response.
///
/// The engine itself never retains a message's body past the `on_data` call
/// it was delivered in (so a streaming handler can process an arbitrarily
/// large body without the parser ever holding all of it in memory at once);
/// this wrapper opts back into the old buffer-then-callback convenience by
/// accumulating every `on_data` chunk itself, so by the time `on_end` fires
/// the callback receives the complete body.
pub struct BufferedHandler<F> {
    callback: F,
    body: Vec<u8>,
}

impl<F> BufferedHandler<F>
where
    F: FnMut(&mut Connection, &Message, &[u8]),
{
    pub fn new(callback: F) -> BufferedHandler<F> {
        BufferedHandler { callback, body: Vec::new() }
    }
}

impl<F> Handler for BufferedHandler<F>
where
    F: FnMut(&mut Connection, &Message, &[u8]),
{
    fn on_request(&mut self, conn: &mut Connection, req: &Message) -> Result<(), HandlerError> {
        answer_continue_if_requested(conn, req);
        Ok(())
    }

    fn on_data(
        &mut self,
        _conn: &mut Connection,
        _req: &Message,
        chunk: &[u8],
    ) -> Result<(), HandlerError> {
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    fn on_end(&mut self, conn: &mut Connection, req: &Message) -> Result<(), HandlerError> {
        (self.callback)(conn, req, &self.body);
        Ok(())
    }
}

/// The built-in fallback handler for unmatched routes: a canned 404.
pub struct NotFoundHandler;

impl Handler for NotFoundHandler {
    fn on_end(&mut self, conn: &mut Connection, _req: &Message) -> Result<(), HandlerError> {
        conn.respond(crate::writer::compose_error("404", "Not Found"));
        Ok(())
    }
}
