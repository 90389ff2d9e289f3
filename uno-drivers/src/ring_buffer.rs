//! Receive buffer for bytes arriving in the USART RX interrupt
//!
//! When the buffer is full the oldest unread byte is dropped to make room,
//! the number of dropped bytes is kept in [`RingBuffer::overruns`].

use heapless::Deque;

pub const RX_BUFFER_SIZE: usize = 64;

pub struct RingBuffer {
    queue: Deque<u8, RX_BUFFER_SIZE>,
    overruns: u16,
}

impl RingBuffer {
    pub const fn new() -> RingBuffer {
        RingBuffer {
            queue: Deque::new(),
            overruns: 0,
        }
    }

    /// Store a received byte, returns true if the oldest byte had to go
    pub fn push(&mut self, byte: u8) -> bool {
        let dropped = if self.queue.is_full() {
            self.queue.pop_front();
            self.overruns = self.overruns.saturating_add(1);
            true
        } else {
            false
        };
        // there is room now, push_back can't fail
        let _ = self.queue.push_back(byte);
        dropped
    }

    /// Oldest unread byte
    pub fn pop(&mut self) -> Option<u8> {
        self.queue.pop_front()
    }

    /// number of unread bytes
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// bytes lost to overwrites since creation
    pub fn overruns(&self) -> u16 {
        self.overruns
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        RingBuffer::new()
    }
}
