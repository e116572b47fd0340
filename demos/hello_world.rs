extern crate embercore;
extern crate env_logger;

use embercore::server::{BufferedHandler, Connection, Handler, HandlerFactory};
use embercore::{Headers, Message};

fn send_string(conn: &mut Connection, body: &'static str) {
    let mut headers = Headers::new();
    headers.set("Content-Type", "text/plain");
    conn.respond(embercore::writer::compose_response(
        "200",
        "OK",
        headers,
        body.as_bytes().to_vec(),
    ));
}

fn hello() -> HandlerFactory {
    Box::new(|| {
        Box::new(BufferedHandler::new(|conn: &mut Connection, _req: &Message, _body: &[u8]| {
            send_string(conn, "Hello World!");
        })) as Box<dyn Handler>
    })
}

fn bye() -> HandlerFactory {
    Box::new(|| {
        Box::new(BufferedHandler::new(|conn: &mut Connection, _req: &Message, _body: &[u8]| {
            send_string(conn, "Goodbye!");
        })) as Box<dyn Handler>
    })
}

fn main() {
    env_logger::init();

    let config = embercore::server::ListenConfig::new()
        .route("/", hello())
        .route("/bye", bye());

    embercore::server::listen(config).expect("server loop failed");
}
