//! Process-wide pool of scratch byte buffers.
//!
//! Readers and writers borrow their window buffers from here so that opening
//! many short streams does not allocate a fresh 64 KB buffer each time.
//! Buffers come back through [`PooledBuffer`]'s `Drop`, so they are returned
//! on every exit path, including errors.

use std::ops::{Deref, DerefMut};

use lazy_static::lazy_static;
use parking_lot::Mutex;

/// Maximum number of idle buffers kept by the global pool.
const MAX_POOLED_BUFFERS: usize = 32;

/// Buffers that grew beyond this are dropped instead of pooled.
const MAX_RETAINED_CAPACITY: usize = 16 * 1024 * 1024;

lazy_static! {
    static ref GLOBAL_POOL: BufferPool = BufferPool::new(MAX_POOLED_BUFFERS, MAX_RETAINED_CAPACITY);
}

/// Lock-guarded free list of owned byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_buffers: usize,
    max_capacity: usize,
}

impl BufferPool {
    /// Creates an empty pool retaining at most `max_buffers` idle buffers of
    /// at most `max_capacity` bytes each.
    pub fn new(max_buffers: usize, max_capacity: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_buffers)),
            max_buffers,
            max_capacity,
        }
    }

    /// Returns the process-wide pool.
    pub fn global() -> &'static BufferPool {
        &GLOBAL_POOL
    }

    /// Borrows a cleared buffer with at least `capacity` bytes of capacity.
    ///
    /// Prefers the smallest idle buffer that is already large enough.
    pub fn acquire(&self, capacity: usize) -> PooledBuffer<'_> {
        let reused = {
            let mut free = self.free.lock();
            let best = free
                .iter()
                .enumerate()
                .filter(|(_, b)| b.capacity() >= capacity)
                .min_by_key(|(_, b)| b.capacity())
                .map(|(i, _)| i);
            match best {
                Some(i) => Some(free.swap_remove(i)),
                None => free.pop(),
            }
        };

        let mut buf = reused.unwrap_or_default();
        // Previous contents are garbage from another stream.
        buf.clear();
        if buf.capacity() < capacity {
            buf.reserve_exact(capacity);
        }
        PooledBuffer { buf, pool: self }
    }

    /// Number of idle buffers currently held.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, buf: Vec<u8>) {
        if buf.capacity() == 0 || buf.capacity() > self.max_capacity {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < self.max_buffers {
            free.push(buf);
        }
    }
}

/// A buffer on loan from a [`BufferPool`]; returned to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer<'p> {
    buf: Vec<u8>,
    pool: &'p BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_return() {
        let pool = BufferPool::new(4, 1024);
        {
            let mut buf = pool.acquire(128);
            assert!(buf.capacity() >= 128);
            buf.extend_from_slice(b"stale bytes");
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.acquire(64);
        assert!(buf.is_empty(), "reused buffer must be cleared");
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_oversized_buffers_not_retained() {
        let pool = BufferPool::new(4, 256);
        drop(pool.acquire(4096));
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_bounded() {
        let pool = BufferPool::new(2, 1024);
        let a = pool.acquire(16);
        let b = pool.acquire(16);
        let c = pool.acquire(16);
        drop(a);
        drop(b);
        drop(c);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_prefers_fitting_buffer() {
        let pool = BufferPool::new(4, 1 << 20);
        let small = pool.acquire(16);
        let large = pool.acquire(4096);
        let large_capacity = large.capacity();
        drop(small);
        drop(large);
        assert_eq!(pool.idle(), 2);

        let buf = pool.acquire(1024);
        assert_eq!(buf.capacity(), large_capacity);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_released_on_error_path() {
        fn fails(pool: &BufferPool) -> Result<(), &'static str> {
            let _buf = pool.acquire(32);
            Err("boom")
        }
        let pool = BufferPool::new(4, 1024);
        assert!(fails(&pool).is_err());
        assert_eq!(pool.idle(), 1);
    }
}
