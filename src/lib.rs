//! Embeddable streaming HTTP/1.x server engine.
//!
//! Five pieces, leaves first: [`message`] (the parsed value type),
//! [`parser`] (the incremental byte-to-event state machine), [`queue`] (the
//! lazy output FIFO), [`writer`] (response composition), and [`server`]
//! (the per-socket glue plus the `mio`-driven event loop). Everything below
//! [`server::listen`] is pure byte-buffer-in, event/bytes-out logic with no
//! socket of its own, which is what makes it unit-testable without a
//! network.

#[macro_use]
extern crate quick_error;

pub mod error;
pub mod headers;
pub mod message;
pub mod parser;
pub mod queue;
pub mod server;
pub mod version;
pub mod writer;

pub use error::{DecodeError, Error, HandlerError, ProtocolError, Result};
pub use headers::Headers;
pub use message::Message;
pub use parser::{Event, MessageHandle, Parser};
pub use server::{Handler, ListenConfig};
pub use version::Version;
