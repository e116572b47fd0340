//! Maps request URLs to handler factories.

use std::collections::HashMap;

use crate::server::handler::{HandlerFactory, Handler, NotFoundHandler};

/// Exact-path routing, no patterns, no method dispatch.
///
/// `route` strips any `?query` suffix before lookup, so `GET /foo?x=1` and
/// `GET /foo` resolve identically. A miss falls back to the configured
/// file/static handler factory if any, else a built-in 404.
#[derive(Default)]
pub struct Router {
    routes: HashMap<String, HandlerFactory>,
    fallback: Option<HandlerFactory>,
}

impl Router {
    pub fn new() -> Router {
        Router { routes: HashMap::new(), fallback: None }
    }

    pub fn add_route(&mut self, path: impl Into<String>, factory: HandlerFactory) {
        self.routes.insert(path.into(), factory);
    }

    pub fn set_fallback(&mut self, factory: HandlerFactory) {
        self.fallback = Some(factory);
    }

    /// Instantiates a fresh handler for `url`, stripping any `?query`.
    pub fn route(&self, url: &str) -> Box<dyn Handler> {
        let path = url.split('?').next().unwrap_or(url);
        if let Some(factory) = self.routes.get(path) {
            return factory();
        }
        if let Some(fallback) = &self.fallback {
            return fallback();
        }
        Box::new(NotFoundHandler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use crate::server::connection::Connection;
    use crate::error::HandlerError;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Marker;
    impl Handler for Marker {
        fn on_end(&mut self, _conn: &mut Connection, _req: &Message) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    /// Builds a factory that records `name` into `resolved` when the router
    /// actually instantiates it, so a test can tell which registered route
    /// resolved instead of only observing that `route()` didn't panic.
    fn recording_factory(
        name: &'static str,
        resolved: &Rc<Cell<Option<&'static str>>>,
    ) -> HandlerFactory {
        let resolved = Rc::clone(resolved);
        Box::new(move || {
            resolved.set(Some(name));
            Box::new(Marker) as Box<dyn Handler>
        })
    }

    #[test]
    fn query_string_is_ignored_for_routing() {
        let resolved = Rc::new(Cell::new(None));
        let mut router = Router::new();
        router.add_route("/foo", recording_factory("foo", &resolved));

        router.route("/foo?x=1");
        assert_eq!(resolved.get(), Some("foo"));

        resolved.set(None);
        router.route("/foo");
        assert_eq!(resolved.get(), Some("foo"));
    }

    #[test]
    fn missing_route_without_fallback_uses_not_found() {
        let resolved = Rc::new(Cell::new(None));
        let mut router = Router::new();
        router.add_route("/foo", recording_factory("foo", &resolved));

        router.route("/missing");
        // No fallback registered and no matching route: `/foo`'s factory
        // must not have run, leaving the built-in 404 as the only taker.
        assert!(resolved.get().is_none());
    }
}
