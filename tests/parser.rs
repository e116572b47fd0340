//! Feeds raw byte streams through the public `Parser` surface, the way a
//! socket would, without ever touching one.

extern crate embercore;

use embercore::parser::{Event, Poll};
use embercore::Parser;

/// Drives `parser` to completion, resolving each event's `MessageHandle`
/// immediately via `on_event` rather than after the fact — a handle is
/// only valid for the message it was produced alongside (see
/// `Parser::message`'s docs), the same way `Connection::dispatch` resolves
/// it before looping back to `advance()` again.
fn drain_with<F: FnMut(&Parser, &Event)>(parser: &mut Parser, mut on_event: F) {
    loop {
        match parser.advance().expect("parse error") {
            Poll::Event(event) => on_event(parser, &event),
            Poll::NeedMore => break,
        }
    }
}

fn drain(parser: &mut Parser) -> Vec<Event> {
    let mut events = Vec::new();
    drain_with(parser, |_parser, event| events.push(event.clone()));
    events
}

#[test]
fn content_length_request_round_trips_body_bytes() {
    let mut p = Parser::new();
    p.feed(b"POST /p HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello");
    let mut seen_request = false;
    drain_with(&mut p, |parser, event| {
        if let Event::Request(h) = event {
            seen_request = true;
            let msg = parser.message(*h);
            assert_eq!(msg.method(), Some("POST"));
            assert_eq!(msg.url(), Some("/p"));
        }
    });
    assert!(seen_request);
}

#[test]
fn pipelined_requests_are_each_fully_delivered() {
    let mut p = Parser::new();
    p.feed(b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");
    let mut urls = Vec::new();
    drain_with(&mut p, |parser, event| {
        if let Event::Request(h) = event {
            if let Some(url) = parser.message(*h).url() {
                urls.push(url.to_string());
            }
        }
    });
    assert_eq!(urls, vec!["/a", "/b"]);
}

#[test]
fn chunked_body_arrives_split_across_feed_calls() {
    let mut p = Parser::new();
    let whole = b"PUT /c HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n\
                  5\r\nhello\r\n3\r\nabc\r\n0\r\n\r\n";
    // Split mid-chunk to exercise resumption across an arbitrary boundary.
    let (first, second) = whole.split_at(30);
    p.feed(first);
    let mut events = drain(&mut p);
    p.feed(second);
    events.extend(drain(&mut p));

    let body: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            Event::Data(_, bytes) => Some(bytes.clone()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(body, b"helloabc");
}
