//! Pure response composers.
//!
//! Every function here returns a lazy [`Producer`] of [`OutputItem`]s ready
//! for [`OutputQueue::insert`](crate::queue::OutputQueue::insert) — none of
//! them touch a socket. `compose_response_filep` is the one exception that
//! does any eager work: it seeks the file to learn its length before the
//! first byte is produced, since `Content-Length` has to be known before the
//! header block is written.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use log::debug;

use crate::headers::Headers;
use crate::queue::{OutputItem, Producer};

/// Default block size for streamed file bodies, matching the reference
/// implementation's `filep.read(size)` default.
pub const DEFAULT_BLOCK_SIZE: usize = 65_536;

fn compose_head(first_line: &str, headers: &Headers) -> String {
    let mut out = String::with_capacity(64);
    out.push_str(first_line);
    out.push_str("\r\n");
    for (name, value) in headers.iter() {
        if value == "none" {
            continue;
        }
        debug!("> {}: {}", name, value);
        out.push_str(name);
        out.push_str(": ");
        out.push_str(value);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out
}

fn is_chunked(headers: &Headers) -> bool {
    headers.get("transfer-encoding").eq_ignore_ascii_case("chunked")
}

struct FileChunks {
    file: File,
    block_size: usize,
    done: bool,
}

impl Iterator for FileChunks {
    type Item = OutputItem;

    fn next(&mut self) -> Option<OutputItem> {
        if self.done {
            return None;
        }
        let mut buf = vec![0u8; self.block_size];
        match self.file.read(&mut buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some(OutputItem::Bytes(buf))
            }
            Err(err) => {
                log::error!("file body read failed: {}", err);
                self.done = true;
                None
            }
        }
    }
}

/// Wraps a sequence of body parts in chunked-transfer framing, terminated
/// by the last chunk. Each part becomes its own `compose_chunk`-shaped
/// sub-producer, so nothing downstream ever needs to know where one part's
/// bytes end and the next begins.
struct ChunkedBody<I> {
    parts: I,
    done: bool,
}

impl<I: Iterator<Item = OutputItem>> Iterator for ChunkedBody<I> {
    type Item = OutputItem;

    fn next(&mut self) -> Option<OutputItem> {
        if self.done {
            return None;
        }
        match self.parts.next() {
            Some(OutputItem::Bytes(b)) => Some(OutputItem::Producer(compose_chunk(b))),
            Some(OutputItem::Str(s)) => {
                Some(OutputItem::Producer(compose_chunk(s.into_bytes())))
            }
            Some(OutputItem::Producer(p)) => Some(OutputItem::Producer(Box::new(ChunkedBody {
                parts: p,
                done: false,
            }))),
            None => {
                self.done = true;
                Some(OutputItem::Producer(compose_last_chunk()))
            }
        }
    }
}

fn compose(
    first_line: String,
    mut headers: Headers,
    pre_body: Option<Vec<u8>>,
    file: Option<(File, u64, usize)>,
    post_body: Option<Vec<u8>>,
) -> io::Result<Producer> {
    let chunked = is_chunked(&headers);

    if !chunked {
        let mut total: u64 = 0;
        if let Some(pre) = &pre_body {
            total += pre.len() as u64;
        }
        if let Some((_, len, _)) = &file {
            total += len;
        }
        if let Some(post) = &post_body {
            total += post.len() as u64;
        }
        headers.set("Content-Length", total.to_string());
    }

    let head = compose_head(&first_line, &headers);
    debug!("> {}", first_line);

    let mut parts: Vec<OutputItem> = Vec::with_capacity(3);
    if let Some(pre) = pre_body {
        if !pre.is_empty() {
            parts.push(OutputItem::Bytes(pre));
        }
    }
    if let Some((file, _, block_size)) = file {
        parts.push(OutputItem::Producer(Box::new(FileChunks {
            file,
            block_size,
            done: false,
        })));
    }
    if let Some(post) = post_body {
        if !post.is_empty() {
            parts.push(OutputItem::Bytes(post));
        }
    }

    let body: Producer = if chunked {
        Box::new(ChunkedBody { parts: parts.into_iter(), done: false })
    } else {
        Box::new(parts.into_iter())
    };

    let full: Producer = Box::new(std::iter::once(OutputItem::Str(head)).chain(body));
    Ok(full)
}

/// Composes a response with a bounded, already-in-memory body.
pub fn compose_response(code: &str, reason: &str, headers: Headers, body: Vec<u8>) -> Producer {
    let first_line = format!("HTTP/1.1 {} {}", code, reason);
    compose(first_line, headers, Some(body), None, None)
        .expect("in-memory body composition never fails")
}

/// Composes a response whose body is streamed from a file, read in
/// `block_size` chunks. Requires a seekable file to learn its length up
/// front for `Content-Length` framing (unless `headers` already requests
/// chunked transfer); a non-seekable file is an error here rather than a
/// silently wrong `Content-Length` — prefer chunked transfer for sources
/// whose length can't be determined.
pub fn compose_response_filep(
    code: &str,
    reason: &str,
    headers: Headers,
    mut file: File,
    block_size: usize,
) -> io::Result<Producer> {
    let first_line = format!("HTTP/1.1 {} {}", code, reason);
    if is_chunked(&headers) {
        return compose(first_line, headers, None, Some((file, 0, block_size)), None);
    }
    let len = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    compose(first_line, headers, None, Some((file, len, block_size)), None)
}

/// Composes a canned HTML error body.
pub fn compose_error(code: &str, reason: &str) -> Producer {
    let body = format!(
        "<html>\n <head>\n  <title>{code} {reason}</title>\n </head>\n \
         <body>\n  <p>Error occurred: {code} {reason}</p>\n </body>\n</html>\n",
        code = code,
        reason = reason,
    );
    let mut headers = Headers::new();
    headers.set("Content-Type", "text/html");
    compose_response(code, reason, headers, body.into_bytes())
}

/// Composes just the status line and headers, with no body.
pub fn compose_headers(code: &str, reason: &str, headers: Headers) -> Producer {
    compose_response(code, reason, headers, Vec::new())
}

/// Composes a `302 Found` redirect to `target`.
pub fn compose_response_redirect(target: &str) -> Producer {
    let body = format!(
        "<html>\n <head>\n  <title>Redirected to: {target}</title>\n </head>\n \
         <body>\n  <p>Redirected to: {target}</p>\n </body>\n</html>\n",
        target = target,
    );
    let mut headers = Headers::new();
    headers.set("Location", target);
    headers.set("Content-Type", "text/html");
    compose_response("302", "Found", headers, body.into_bytes())
}

/// Composes one chunked-transfer chunk: `hex\r\n` + `chunk` + `\r\n`.
pub fn compose_chunk(chunk: Vec<u8>) -> Producer {
    let size_line = format!("{:x}\r\n", chunk.len());
    let items = vec![
        OutputItem::Str(size_line),
        OutputItem::Bytes(chunk),
        OutputItem::Str("\r\n".to_string()),
    ];
    Box::new(items.into_iter())
}

/// Composes the terminating `0\r\n\r\n` chunk (no trailers).
pub fn compose_last_chunk() -> Producer {
    Box::new(std::iter::once(OutputItem::Str("0\r\n\r\n".to_string())))
}
