//! Per-socket glue: feeds inbound bytes to the parser, dispatches events to
//! a handler chosen by the router, drains the output queue under write
//! readiness.

use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;

use log::{debug, error, warn};
use mio::net::TcpStream;

use crate::parser::{Event, Parser, Poll};
use crate::queue::{OutputItem, OutputQueue, Producer};
use crate::server::handler::Handler;
use crate::server::router::Router;

/// Largest single non-blocking read per readiness signal.
const READ_CHUNK: usize = 65_535;

/// Owns one socket, one [`Parser`], one [`OutputQueue`], and the handler
/// currently processing the in-flight request, if any.
///
/// Created on accept; torn down when the socket closes, the parser reaches
/// its terminal connection-close state, or a fatal I/O/protocol error
/// occurs. All methods run on the single event-loop thread — there is
/// nothing here to synchronize.
pub struct Connection {
    socket: TcpStream,
    parser: Parser,
    queue: OutputQueue,
    handler: Option<Box<dyn Handler>>,
    router: Rc<Router>,
    /// Set once a handler has started writing *the* response for the
    /// current request (not the interim 100-continue), so a later handler
    /// failure knows whether synthesizing a 500 would corrupt an
    /// already-started response.
    response_started: bool,
    /// Set once a handler callback has returned `Err` for the current
    /// message, so later `on_data`/`on_end` events for the same message are
    /// not delivered to a handler that has already been answered for (or
    /// abandoned after) a failure.
    handler_failed: bool,
    closed: bool,
}

impl Connection {
    pub fn new(socket: TcpStream, router: Rc<Router>) -> Connection {
        Connection {
            socket,
            parser: Parser::new(),
            queue: OutputQueue::new(),
            handler: None,
            router,
            response_started: false,
            handler_failed: false,
            closed: false,
        }
    }

    pub fn socket(&self) -> &TcpStream {
        &self.socket
    }

    pub(crate) fn socket_mut(&mut self) -> &mut TcpStream {
        &mut self.socket
    }

    /// True once this connection should be deregistered and dropped: the
    /// parser reached connection-close's terminal state, or a fatal error
    /// was observed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Enqueues a response producer and marks a response as started.
    pub fn respond(&mut self, producer: Producer) {
        self.response_started = true;
        self.queue.insert(OutputItem::Producer(producer));
    }

    /// Enqueues raw bytes ahead of (or instead of) a composed response —
    /// used for the `100 Continue` interim status, which doesn't count as
    /// "the" response for 500-on-failure bookkeeping.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.queue.insert(OutputItem::Bytes(bytes.to_vec()));
    }

    pub fn has_pending_output(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Handles a read-readiness signal: drains the socket into the parser
    /// and dispatches every event the parser yields. Returns `Ok(())` as
    /// long as the connection should stay open; a fatal error tears it
    /// down (the caller should deregister and drop it).
    pub fn readable(&mut self) -> io::Result<()> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match self.socket.read(&mut buf) {
                Ok(0) => {
                    self.parser.eof();
                    break;
                }
                Ok(n) => {
                    self.parser.feed(&buf[..n]);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.closed = true;
                    return Err(e);
                }
            }
        }
        self.drain_events();
        Ok(())
    }

    /// Handles a write-readiness signal: sends as much of the queue as the
    /// socket will currently accept, reinserting any unsent tail.
    pub fn writable(&mut self) -> io::Result<()> {
        while let Some(chunk) = self.queue.next_chunk() {
            match self.socket.write(&chunk) {
                Ok(n) if n == chunk.len() => continue,
                Ok(n) => {
                    self.queue.reinsert_partial(chunk[n..].to_vec());
                    break;
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    self.queue.reinsert_partial(chunk);
                    break;
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {
                    self.queue.reinsert_partial(chunk);
                }
                Err(e) => {
                    self.closed = true;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn drain_events(&mut self) {
        loop {
            let event = match self.parser.advance() {
                Ok(Poll::Event(event)) => event,
                Ok(Poll::NeedMore) => break,
                Err(err) => {
                    warn!("protocol error, closing connection: {}", err);
                    self.closed = true;
                    break;
                }
            };
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Request(handle) => {
                let msg = self.parser.message(handle).clone();
                debug!("< {} {}", msg.method().unwrap_or(""), msg.url().unwrap_or(""));
                let mut handler = self.router.route(msg.url().unwrap_or(""));
                self.response_started = false;
                self.handler_failed = false;
                let result = handler.on_request(self, &msg);
                self.handler = Some(handler);
                self.handle_result(result);
            }
            Event::Response(_handle) => {
                // This engine only ever parses requests on the server side;
                // a Response event here would mean the peer sent a status
                // line instead of a request line. Nothing to dispatch to.
            }
            Event::Data(handle, chunk) => {
                if self.handler_failed {
                    return;
                }
                let msg = self.parser.message(handle).clone();
                if let Some(mut handler) = self.handler.take() {
                    let result = handler.on_data(self, &msg, &chunk);
                    self.handler = Some(handler);
                    self.handle_result(result);
                }
            }
            Event::End(handle) => {
                if self.handler_failed {
                    return;
                }
                let msg = self.parser.message(handle).clone();
                if let Some(mut handler) = self.handler.take() {
                    let result = handler.on_end(self, &msg);
                    self.handle_result(result);
                }
            }
        }
    }

    fn handle_result(&mut self, result: Result<(), crate::error::HandlerError>) {
        if let Err(err) = result {
            error!("handler failed: {}", err);
            self.handler_failed = true;
            if !self.response_started {
                self.respond(crate::writer::compose_error("500", "Internal Server Error"));
            } else {
                // Bytes of a response are already on the wire; the framing
                // is now undefined and the connection can't be reused.
                self.closed = true;
            }
        }
    }
}
