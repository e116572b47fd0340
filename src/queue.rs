//! Lazy FIFO of byte-producing items destined for a socket.
//!
//! The queue never knows how big a response body is in advance: a handler
//! may hand it a finite byte slice, a `String`, or a nested producer (a
//! chunked-transfer body, a file stream, or anything else shaped like a
//! lazy sequence of further [`OutputItem`]s). [`OutputQueue::next_chunk`]
//! flattens that tree on demand, one byte view per call, so a
//! [`Connection`](crate::server::connection::Connection) can keep writing
//! without ever materializing the whole thing in memory.

use std::collections::VecDeque;
use std::fmt;

/// A lazy, finite, non-restartable sequence of further [`OutputItem`]s.
pub type Producer = Box<dyn Iterator<Item = OutputItem>>;

/// One element of an [`OutputQueue`].
pub enum OutputItem {
    Bytes(Vec<u8>),
    Str(String),
    /// Nested producers may themselves yield producers; flattening is
    /// depth-first, left-to-right, and fully lazy.
    Producer(Producer),
}

impl fmt::Debug for OutputItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OutputItem::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            OutputItem::Str(s) => f.debug_tuple("Str").field(&s.len()).finish(),
            OutputItem::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

impl From<Vec<u8>> for OutputItem {
    fn from(bytes: Vec<u8>) -> OutputItem {
        OutputItem::Bytes(bytes)
    }
}

impl From<String> for OutputItem {
    fn from(s: String) -> OutputItem {
        OutputItem::Str(s)
    }
}

/// Encodes a string to bytes using the queue's default single-byte
/// encoding, ISO-8859-1 (every scalar value below 0x100 round-trips; the
/// rest is truncated, since this path is only ever exercised for ASCII
/// status lines and header values composed by this crate's own writer).
fn encode_default(s: &str) -> Vec<u8> {
    s.chars().map(|c| c as u32 as u8).collect()
}

/// An ordered sequence of [`OutputItem`]s awaiting transmission.
///
/// Empty iff no bytes are pending. The head may be a partially-consumed
/// producer; items never mutate after insertion except through
/// [`OutputQueue::reinsert_partial`] narrowing an unsent tail.
#[derive(Default)]
pub struct OutputQueue {
    items: VecDeque<OutputItem>,
}

impl OutputQueue {
    pub fn new() -> OutputQueue {
        OutputQueue { items: VecDeque::new() }
    }

    /// Appends an item to the tail. Empty byte slices and strings are
    /// dropped rather than queued, since they would production a zero-byte
    /// chunk on their turn.
    pub fn insert(&mut self, item: OutputItem) {
        match &item {
            OutputItem::Bytes(b) if b.is_empty() => return,
            OutputItem::Str(s) if s.is_empty() => return,
            _ => {}
        }
        self.items.push_back(item);
    }

    /// Prepends the unsent tail of a previous [`OutputQueue::next_chunk`]
    /// result, so the next call resumes exactly where the socket left off.
    pub fn reinsert_partial(&mut self, unsent: Vec<u8>) {
        if !unsent.is_empty() {
            self.items.push_front(OutputItem::Bytes(unsent));
        }
    }

    /// Returns the next byte view ready for a non-blocking write, or `None`
    /// if the queue is empty. Unwraps nested producers lazily: a producer
    /// at the head is pulled once; if it yields another producer, that is
    /// pushed back in its place (ahead of the original, which keeps its
    /// turn for its remaining elements) and the loop tries again. An
    /// exhausted producer is simply dropped.
    pub fn next_chunk(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.items.pop_front()? {
                OutputItem::Bytes(b) => {
                    if b.is_empty() {
                        continue;
                    }
                    return Some(b);
                }
                OutputItem::Str(s) => {
                    let b = encode_default(&s);
                    if b.is_empty() {
                        continue;
                    }
                    return Some(b);
                }
                OutputItem::Producer(mut producer) => match producer.next() {
                    None => continue,
                    Some(item) => {
                        self.items.push_front(OutputItem::Producer(producer));
                        self.items.push_front(item);
                        continue;
                    }
                },
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut OutputQueue) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = queue.next_chunk() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    #[test]
    fn plain_bytes_and_strings_concatenate_in_order() {
        let mut q = OutputQueue::new();
        q.insert(OutputItem::Bytes(b"a".to_vec()));
        q.insert(OutputItem::Str("b".to_string()));
        q.insert(OutputItem::Bytes(b"c".to_vec()));
        assert_eq!(drain(&mut q), b"abc");
    }

    #[test]
    fn empty_items_are_dropped_on_insert() {
        let mut q = OutputQueue::new();
        q.insert(OutputItem::Bytes(Vec::new()));
        q.insert(OutputItem::Str(String::new()));
        assert!(q.is_empty());
        assert_eq!(q.next_chunk(), None);
    }

    #[test]
    fn nested_producers_flatten_depth_first_left_to_right() {
        let inner: Producer = Box::new(
            vec![OutputItem::Bytes(b"x".to_vec()), OutputItem::Bytes(b"y".to_vec())].into_iter(),
        );
        let outer: Producer = Box::new(
            vec![
                OutputItem::Bytes(b"a".to_vec()),
                OutputItem::Producer(inner),
                OutputItem::Bytes(b"z".to_vec()),
            ]
            .into_iter(),
        );
        let mut q = OutputQueue::new();
        q.insert(OutputItem::Producer(outer));
        assert_eq!(drain(&mut q), b"axyz");
    }

    #[test]
    fn partial_send_reinsertion_preserves_order() {
        let mut q = OutputQueue::new();
        q.insert(OutputItem::Bytes(b"hello world".to_vec()));
        q.insert(OutputItem::Bytes(b"!".to_vec()));

        let first = q.next_chunk().unwrap();
        assert_eq!(first, b"hello world");
        // Socket only accepted the first 5 bytes.
        let (sent, unsent) = first.split_at(5);
        assert_eq!(sent, b"hello");
        q.reinsert_partial(unsent.to_vec());

        assert_eq!(drain(&mut q), b" world!");
    }

    #[test]
    fn exhausted_producer_is_dropped_without_emitting_anything() {
        let empty: Producer = Box::new(std::iter::empty());
        let mut q = OutputQueue::new();
        q.insert(OutputItem::Producer(empty));
        q.insert(OutputItem::Bytes(b"after".to_vec()));
        assert_eq!(drain(&mut q), b"after");
    }
}
