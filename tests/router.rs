//! Router key isolation (property 6, §8): query strings don't affect
//! routing identity.

extern crate embercore;

use std::cell::Cell;
use std::rc::Rc;

use embercore::server::{Connection, Handler, HandlerFactory, Router};
use embercore::{HandlerError, Message};

struct Marker;

impl Handler for Marker {
    fn on_end(&mut self, _conn: &mut Connection, _req: &Message) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// Builds a factory that flips `ran` to `true` when the router actually
/// invokes it, so a test can tell *which* registered route resolved instead
/// of only observing that routing didn't panic.
fn factory(ran: &Rc<Cell<bool>>) -> HandlerFactory {
    let ran = Rc::clone(ran);
    Box::new(move || {
        ran.set(true);
        Box::new(Marker) as Box<dyn Handler>
    })
}

#[test]
fn query_string_does_not_change_route_resolution() {
    let foo_ran = Rc::new(Cell::new(false));
    let mut router = Router::new();
    router.add_route("/foo", factory(&foo_ran));

    router.route("/foo");
    assert!(foo_ran.get(), "/foo must resolve to its registered factory");

    foo_ran.set(false);
    router.route("/foo?x=1&y=2");
    assert!(
        foo_ran.get(),
        "a query string must not change which factory /foo resolves to"
    );
}

#[test]
fn unregistered_route_falls_back_to_configured_handler() {
    let foo_ran = Rc::new(Cell::new(false));
    let fallback_ran = Rc::new(Cell::new(false));
    let mut router = Router::new();
    router.add_route("/foo", factory(&foo_ran));
    router.set_fallback(factory(&fallback_ran));

    router.route("/anything");
    assert!(
        fallback_ran.get(),
        "an unregistered path must resolve through the fallback factory"
    );
    assert!(
        !foo_ran.get(),
        "an unregistered path must not resolve through an unrelated registered route"
    );
}
