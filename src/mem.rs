//! Region-style memory pools behind process-wide installable hooks.
//!
//! The engine never frees individual allocations. Memory is taken from
//! *pools* which are released as a whole: one pool per connection for
//! long-lived state, one pool per in-flight query. The environment is
//! expected to bring its own pool implementation and install it before
//! the first endpoint becomes active; there is no default, and using the
//! library without a provider fails the precondition check rather than
//! anything more amusing.
//!
//! Ending a pool is consuming it, so "released exactly once on every
//! exit path" is enforced by move semantics instead of discipline.

use std::sync::{Arc, RwLock};

use bytes::BytesMut;
use derwalk::Cursor;
use lazy_static::lazy_static;

use crate::result::{Error, Result};

/// The allocation half a provider supplies for each pool. Dropping the
/// object releases everything allocated through it.
pub trait PoolAlloc: Send {
    /// Hand out `size` bytes of fresh capacity, or `None` when the
    /// region is exhausted.
    fn alloc(&mut self, size: usize) -> Option<BytesMut>;
}

/// Factory for pools, installed process-wide with [`install_allocator`].
pub trait PoolProvider: Send + Sync {
    fn newpool(&self) -> Option<Box<dyn PoolAlloc>>;
}

lazy_static! {
    static ref ALLOCATOR: RwLock<Option<Arc<dyn PoolProvider>>> = RwLock::new(None);
}

/// Install the process-wide pool provider. Must happen before the first
/// endpoint or pool is created.
pub fn install_allocator(provider: Arc<dyn PoolProvider>) {
    *ALLOCATOR.write().expect("allocator lock") = Some(provider);
}

/// One region of allocations, released as a whole by [`Pool::end`] (or
/// by dropping the handle, which is the same thing).
pub struct Pool {
    inner: Box<dyn PoolAlloc>,
}

impl Pool {
    /// Create a pool through the installed provider.
    pub fn new() -> Result<Pool> {
        let guard = ALLOCATOR.read().expect("allocator lock");
        let provider = guard
            .as_ref()
            .ok_or(Error::Precondition("no pool provider installed"))?;
        let inner = provider.newpool().ok_or(Error::OutOfMemory)?;
        Ok(Pool { inner })
    }

    /// Wrap a provider-independent allocation object as a pool, for
    /// embedders that scope a region by hand.
    pub fn with_alloc(inner: Box<dyn PoolAlloc>) -> Pool {
        Pool { inner }
    }

    /// Make sure `slot` holds a pool, creating one on the spot if needed.
    pub fn ensure(slot: &mut Option<Pool>) -> Result<&mut Pool> {
        if slot.is_none() {
            *slot = Some(Pool::new()?);
        }
        Ok(slot.as_mut().expect("pool"))
    }

    /// Allocate `size` bytes of capacity in this pool.
    pub fn alloc(&mut self, size: usize) -> Result<BytesMut> {
        self.inner.alloc(size).ok_or(Error::OutOfMemory)
    }

    /// Allocate `size` zeroed bytes, sized and ready to index.
    pub fn alloc_zeroed(&mut self, size: usize) -> Result<BytesMut> {
        let mut buf = self.alloc(size)?;
        buf.resize(size, 0);
        Ok(buf)
    }

    /// Copy `src` into the pool and return a cursor over the copy.
    pub fn alloc_copy(&mut self, src: &[u8]) -> Result<Cursor> {
        let mut buf = self.alloc(src.len())?;
        buf.extend_from_slice(src);
        Ok(Cursor::from(buf))
    }

    /// Release every allocation made in this pool.
    pub fn end(self) {}
}

/// Pool provider backed by the process heap: every allocation is its own
/// buffer and ending a pool is dropping the handle. Fine for development
/// and tests; embedders with a real region allocator install their own.
pub struct HeapPools;

struct HeapPool;

impl PoolAlloc for HeapPool {
    fn alloc(&mut self, size: usize) -> Option<BytesMut> {
        Some(BytesMut::with_capacity(size))
    }
}

impl PoolProvider for HeapPools {
    fn newpool(&self) -> Option<Box<dyn PoolAlloc>> {
        Some(Box::new(HeapPool))
    }
}
