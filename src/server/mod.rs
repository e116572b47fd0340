//! The embeddable server surface: routing, per-connection dispatch, and
//! the `mio` event loop that drives it.

mod connection;
mod handler;
mod listen;
mod router;

pub use self::connection::Connection;
pub use self::handler::{answer_continue_if_requested, BufferedHandler, Handler, HandlerFactory, NotFoundHandler};
pub use self::listen::{listen, ListenConfig};
pub use self::router::Router;
