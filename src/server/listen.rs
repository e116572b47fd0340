//! The single-threaded `mio` event loop: accepts connections and drives
//! every [`Connection`] to completion.

use std::collections::HashMap;
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::rc::Rc;

use log::{error, info, warn};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll as MioPoll, Token};

use crate::server::connection::Connection;
use crate::server::handler::HandlerFactory;
use crate::server::router::Router;

/// Configuration for [`listen`]. Mirrors the reference implementation's
/// `Config` object, minus the knobs (worker thread count, process forking)
/// that don't apply to a single-threaded `mio` loop.
pub struct ListenConfig {
    pub hostname: String,
    pub port: u16,
    pub backlog: u32,
    pub routes: HashMap<String, HandlerFactory>,
    pub fallback: Option<HandlerFactory>,
}

impl ListenConfig {
    pub fn new() -> ListenConfig {
        ListenConfig {
            hostname: String::new(),
            port: 8080,
            backlog: 128,
            routes: HashMap::new(),
            fallback: None,
        }
    }

    pub fn route(mut self, path: impl Into<String>, factory: HandlerFactory) -> ListenConfig {
        self.routes.insert(path.into(), factory);
        self
    }

    pub fn fallback(mut self, factory: HandlerFactory) -> ListenConfig {
        self.fallback = Some(factory);
        self
    }
}

impl Default for ListenConfig {
    fn default() -> ListenConfig {
        ListenConfig::new()
    }
}

const LISTENER: Token = Token(0);

/// Runs the accept-and-serve loop until the listening socket errors out.
/// Never returns on success; the process is expected to run this on its own
/// thread or as the whole `main`.
pub fn listen(config: ListenConfig) -> io::Result<()> {
    let mut router = Router::new();
    for (path, factory) in config.routes {
        router.add_route(path, factory);
    }
    if let Some(fallback) = config.fallback {
        router.set_fallback(fallback);
    }
    let router = Rc::new(router);

    let hostname = if config.hostname.is_empty() { "0.0.0.0" } else { &config.hostname };
    let addr: SocketAddr = format!("{}:{}", hostname, config.port)
        .parse()
        .map_err(|err| io::Error::new(ErrorKind::InvalidInput, err))?;

    let mut listener = TcpListener::bind(addr)?;
    // mio's listen backlog is fixed by the OS default; config.backlog is
    // recorded for parity with the reference implementation's API but
    // isn't threaded through mio::net::TcpListener, which exposes no knob
    // for it.
    let _ = config.backlog;

    let mut poll = MioPoll::new()?;
    poll.registry().register(&mut listener, LISTENER, Interest::READABLE)?;

    let mut connections: HashMap<Token, Connection> = HashMap::new();
    let mut next_token = 1usize;
    let mut events = Events::with_capacity(1024);

    info!("listening on {}", addr);

    loop {
        poll.poll(&mut events, None)?;

        for event in events.iter() {
            if event.token() == LISTENER {
                loop {
                    match listener.accept() {
                        Ok((mut socket, peer)) => {
                            let token = Token(next_token);
                            next_token += 1;
                            if let Err(err) = poll.registry().register(
                                &mut socket,
                                token,
                                Interest::READABLE | Interest::WRITABLE,
                            ) {
                                warn!("failed to register accepted socket: {}", err);
                                continue;
                            }
                            connections.insert(token, Connection::new(socket, router.clone()));
                            log::debug!("accepted {}", peer);
                        }
                        Err(ref err) if err.kind() == ErrorKind::WouldBlock => break,
                        Err(err) => {
                            error!("accept failed: {}", err);
                            break;
                        }
                    }
                }
                continue;
            }

            let token = event.token();
            let mut done = false;
            if let Some(conn) = connections.get_mut(&token) {
                if event.is_readable() {
                    if let Err(err) = conn.readable() {
                        if err.kind() != ErrorKind::WouldBlock {
                            warn!("read error: {}", err);
                        }
                    }
                }
                if event.is_writable() && !conn.is_closed() {
                    if let Err(err) = conn.writable() {
                        if err.kind() != ErrorKind::WouldBlock {
                            warn!("write error: {}", err);
                        }
                    }
                }
                done = conn.is_closed() && !conn.has_pending_output();
            }
            if done {
                if let Some(mut conn) = connections.remove(&token) {
                    let _ = poll.registry().deregister(conn.socket_mut());
                }
            }
        }
    }
}
