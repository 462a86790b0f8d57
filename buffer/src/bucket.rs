//! Hash buckets over the slot array.
//!
//! Each bucket is a doubly-linked list threaded through [`Node`]s by slot
//! index. A node's links are only read or written while holding the lock of
//! the bucket the node currently belongs to.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

const NIL: usize = usize::MAX;

fn encode(link: Option<usize>) -> usize {
    link.unwrap_or(NIL)
}

fn decode(raw: usize) -> Option<usize> {
    (raw != NIL).then_some(raw)
}

/// Bucket of a block identity
pub(crate) fn bucket_key(dev: u32, blockno: u32, nbucket: usize) -> usize {
    ((((dev as u64) << 32) | blockno as u64) % nbucket as u64) as usize
}

/// List links of one slot
pub(crate) struct Node {
    prev: AtomicUsize,
    next: AtomicUsize,
}

impl Node {
    pub const fn new() -> Self {
        Self {
            prev: AtomicUsize::new(NIL),
            next: AtomicUsize::new(NIL),
        }
    }
    fn prev(&self) -> Option<usize> {
        decode(self.prev.load(Ordering::Relaxed))
    }
    fn next(&self) -> Option<usize> {
        decode(self.next.load(Ordering::Relaxed))
    }
    fn set_prev(&self, prev: Option<usize>) {
        self.prev.store(encode(prev), Ordering::Relaxed);
    }
    fn set_next(&self, next: Option<usize>) {
        self.next.store(encode(next), Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub(crate) struct Bucket {
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl Bucket {
    pub const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Slot indices in list order
    pub fn iter<'a>(&'a self, nodes: &'a [Node]) -> Iter<'a> {
        Iter {
            nodes,
            cur: self.head,
            _bucket: PhantomData,
        }
    }

    /// Append slot `i`, which must not be on any list
    pub fn push_back(&mut self, nodes: &[Node], i: usize) {
        let n = &nodes[i];
        n.set_next(None);
        match self.tail {
            Some(tail) => {
                nodes[tail].set_next(Some(i));
                n.set_prev(Some(tail));
            }
            None => {
                n.set_prev(None);
                self.head = Some(i);
            }
        }
        self.tail = Some(i);
        self.len += 1;
    }

    /// Unlink slot `i`, which must be on this list
    pub fn remove(&mut self, nodes: &[Node], i: usize) {
        let n = &nodes[i];
        match (n.prev(), n.next()) {
            // the only node
            (None, None) => {
                self.head = None;
                self.tail = None;
            }
            // the first node
            (None, Some(next)) => {
                nodes[next].set_prev(None);
                self.head = Some(next);
            }
            // the last node
            (Some(prev), None) => {
                nodes[prev].set_next(None);
                self.tail = Some(prev);
            }
            // in the middle
            (Some(prev), Some(next)) => {
                nodes[prev].set_next(Some(next));
                nodes[next].set_prev(Some(prev));
            }
        }
        n.set_prev(None);
        n.set_next(None);
        self.len -= 1;
    }
}

pub(crate) struct Iter<'a> {
    nodes: &'a [Node],
    cur: Option<usize>,
    _bucket: PhantomData<&'a Bucket>,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let i = self.cur?;
        self.cur = self.nodes[i].next();
        Some(i)
    }
}
