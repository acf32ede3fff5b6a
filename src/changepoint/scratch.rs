//! Bounded pool of scratch `Vec<f64>` buffers.
//!
//! Buffers are handed out as [`ScratchBuffer`] guards and go back to the pool
//! when the guard drops, which also happens on early returns and unwinding.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub struct ScratchPool {
    free: Mutex<Vec<Vec<f64>>>,
    capacity: usize,
}

impl ScratchPool {
    /// Pool that retains at most `capacity` idle buffers.
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
        }
    }

    /// Borrow an empty buffer able to hold at least `len` values without
    /// reallocating.
    pub fn acquire(&self, len: usize) -> ScratchBuffer<'_> {
        let mut buf = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        buf.clear();
        buf.reserve(len);
        ScratchBuffer { buf, pool: self }
    }

    /// Number of idle buffers currently held.
    pub fn available(&self) -> usize {
        self.free.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, buf: Vec<f64>) {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.capacity {
            free.push(buf);
        }
    }
}

/// Scoped loan of a pooled buffer.
#[derive(Debug)]
pub struct ScratchBuffer<'a> {
    buf: Vec<f64>,
    pool: &'a ScratchPool,
}

impl Deref for ScratchBuffer<'_> {
    type Target = Vec<f64>;

    fn deref(&self) -> &Vec<f64> {
        &self.buf
    }
}

impl DerefMut for ScratchBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<f64> {
        &mut self.buf
    }
}

impl Drop for ScratchBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}
