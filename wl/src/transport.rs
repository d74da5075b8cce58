use std::io;
use std::os::fd::OwnedFd;

use crate::wire::{Message, RawMessage};

/// First id of the range the server allocates from.
pub const SERVER_ID_START: u32 = 0xff00_0000;

/// The channel underneath a [`Connection`](crate::Connection).
///
/// `send` only queues; nothing reaches the peer before `flush`. `recv` hands
/// out messages that are already buffered and never blocks, `read` is the
/// only call that waits on the peer.
pub trait Transport {
    fn send(&mut self, msg: Message) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Pulls more bytes from the peer, returning how many arrived.
    fn read(&mut self) -> io::Result<usize> {
        Ok(0)
    }

    fn recv(&mut self) -> io::Result<Option<RawMessage>>;

    /// Next received file descriptor, in arrival order.
    fn take_fd(&mut self) -> Option<OwnedFd>;

    /// A fresh client-side object handle, `None` once the space is used up.
    fn new_handle(&mut self) -> Option<u32>;

    /// Makes `id` available to `new_handle` again.
    fn release_handle(&mut self, id: u32);
}

/// Allocator for client-side object ids.
///
/// Id 1 is the display. Released ids are handed out again before the
/// counter grows.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
    limit: u32,
    free: Vec<u32>,
}

impl Default for IdAllocator {
    fn default() -> Self {
        IdAllocator::with_limit(SERVER_ID_START - 1)
    }
}

impl IdAllocator {
    pub fn new() -> IdAllocator {
        IdAllocator::default()
    }

    /// An allocator that never hands out an id above `limit`.
    pub fn with_limit(limit: u32) -> IdAllocator {
        IdAllocator { next: 2, limit: limit.min(SERVER_ID_START - 1), free: vec![] }
    }

    pub fn alloc(&mut self) -> Option<u32> {
        if let Some(id) = self.free.pop() {
            return Some(id);
        }
        if self.next > self.limit {
            return None;
        }
        let id = self.next;
        self.next += 1;
        Some(id)
    }

    pub fn release(&mut self, id: u32) {
        if (2..self.next).contains(&id) && !self.free.contains(&id) {
            self.free.push(id);
        }
    }
}
