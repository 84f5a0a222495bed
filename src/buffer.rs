//! The Shared Buffer: a FIFO fan-out queue with two fixed reader
//! positions (Data Manager, Storage Manager) and close/drain
//! semantics.
//!
//! This is a direct rendering of the original's `sbuffer.c`: one
//! mutex, one condition variable, a singly linked list of nodes each
//! carrying a measurement and a pair of per-reader read-flags. A node
//! is reclaimed once both flags are set. `VecDeque` stands in for the
//! original's hand-rolled `next` pointer chain — same O(1)
//! push-at-tail / prune-at-head shape, no behavioral difference.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

use crate::measurement::Measurement;

/// The two fixed consumer positions on the buffer.
///
/// A closed, fixed set rather than a dynamic list, per spec.md §9 —
/// each node's read-flags are a small fixed array indexed by this
/// enum's discriminant instead of a map keyed by some reader handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderId {
    /// Data Manager reader position.
    Dm = 0,
    /// Storage Manager reader position.
    Sm = 1,
}

#[derive(Debug)]
struct Node {
    data: Measurement,
    read: [bool; 2],
}

impl Node {
    fn new(data: Measurement) -> Self {
        Self { data, read: [false, false] }
    }

    fn read_by(&self, reader: ReaderId) -> bool {
        self.read[reader as usize]
    }

    fn mark_read(&mut self, reader: ReaderId) {
        self.read[reader as usize] = true;
    }

    fn fully_read(&self) -> bool {
        self.read[0] && self.read[1]
    }
}

#[derive(Debug)]
struct Inner {
    nodes: VecDeque<Node>,
    closed: bool,
}

impl Inner {
    fn garbage_collect(&mut self) {
        while matches!(self.nodes.front(), Some(n) if n.fully_read()) {
            self.nodes.pop_front();
        }
    }

    fn find_oldest_unread(&mut self, reader: ReaderId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| !n.read_by(reader))
    }
}

/// Error returned by [`SharedBuffer::insert`]: the buffer is closed
/// and accepts no further measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferClosed;

/// Result of [`SharedBuffer::remove`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RemoveResult {
    /// A measurement was delivered to this reader.
    Measurement(Measurement),
    /// The buffer is closed and fully drained for this reader.
    End,
}

/// Ordered, bounded-lifetime, two-reader fan-out queue with
/// close/drain semantics. See spec.md §4.1.
#[derive(Debug)]
pub struct SharedBuffer {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl SharedBuffer {
    /// Create a new, empty, open buffer.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { nodes: VecDeque::new(), closed: false }),
            not_empty: Condvar::new(),
        }
    }

    /// Append `data` at the tail. Fails if the buffer is closed.
    pub fn insert(&self, data: Measurement) -> Result<(), BufferClosed> {
        let mut inner = self.inner.lock().expect("shared buffer mutex poisoned");
        if inner.closed {
            return Err(BufferClosed);
        }
        inner.nodes.push_back(Node::new(data));
        self.not_empty.notify_all();
        Ok(())
    }

    /// Return the oldest measurement not yet consumed by `reader`; if
    /// none exists and the buffer is open, block; if none exists and
    /// the buffer is closed, return `End`.
    pub fn remove(&self, reader: ReaderId) -> RemoveResult {
        let mut inner = self.inner.lock().expect("shared buffer mutex poisoned");
        loop {
            inner.garbage_collect();

            if let Some(node) = inner.find_oldest_unread(reader) {
                node.mark_read(reader);
                let data = node.data;
                inner.garbage_collect();
                return RemoveResult::Measurement(data);
            }

            if inner.closed {
                return RemoveResult::End;
            }

            inner = self.not_empty.wait(inner).expect("shared buffer mutex poisoned");
        }
    }

    /// Transition to closed and wake all waiters. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("shared buffer mutex poisoned");
        inner.closed = true;
        self.not_empty.notify_all();
    }

    /// True once [`SharedBuffer::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("shared buffer mutex poisoned").closed
    }

    /// Number of nodes still reachable (neither reader has fully
    /// drained them). Exposed for the "no leaks" test invariant.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("shared buffer mutex poisoned").nodes.len()
    }

    /// True if no nodes remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SharedBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// `free()` in the spec is just `Drop` here: the buffer and its
/// remaining nodes are released when the last `Arc<SharedBuffer>`
/// handle goes out of scope. No explicit `free` method is needed in a
/// language with ownership-based deallocation; this mirrors spec.md
/// §9's instruction to model the original's manual lifecycle with the
/// target language's native mechanism instead of reproducing it
/// literally.
impl std::fmt::Display for BufferClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "shared buffer is closed")
    }
}

impl std::error::Error for BufferClosed {}
