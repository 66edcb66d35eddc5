//! The per-connection message-id registry.
//!
//! A layered hash table keyed by message id. Each layer has a fixed
//! number of slots; a colliding insert walks to the next layer and, at
//! the end of the chain, appends a fresh one. Layers are never removed.
//!
//! A slot is free when its id cell is zero, and the id cell is the only
//! synchronisation there is: claiming a slot is a compare-and-swap from
//! zero, and releasing it stores zero *last*, after the query pool
//! behind the slot has been ended and detached. Ids handed out here are
//! for exchanges this endpoint initiates; they carry [`OUTBOUND`] in the
//! high bit, which the wire encoder masks off.

use std::ptr;

use log::debug;

use crate::atomic::{AtomPtr, AtomU32};
use crate::mem::Pool;
use crate::result::Result;
use crate::MsgId;

/// High bit marking an id allocated by this endpoint for an outbound
/// request, telling it apart from ids chosen by the peer.
pub const OUTBOUND: MsgId = 0x8000_0000;

/// Slots per layer; scales with the address size.
pub const LAYER_SIZE: usize = 16 * std::mem::size_of::<usize>();

struct Slot {
    id: AtomU32,
    pool: AtomPtr<Pool>,
}

struct Layer {
    next: AtomPtr<Layer>,
    slots: Vec<Slot>,
}

impl Layer {
    fn new() -> Layer {
        Layer {
            next: AtomPtr::null(),
            slots: (0..LAYER_SIZE)
                .map(|_| Slot {
                    id: AtomU32::new(0),
                    pool: AtomPtr::null(),
                })
                .collect(),
        }
    }
}

pub struct MsgIdRegistry {
    layers: AtomPtr<Layer>,
    next_id: AtomU32,
}

impl MsgIdRegistry {
    pub fn new() -> MsgIdRegistry {
        MsgIdRegistry {
            layers: AtomPtr::null(),
            next_id: AtomU32::new(1),
        }
    }

    /// Claim a fresh outbound message id and create its query pool.
    /// The returned id has [`OUTBOUND`] set.
    pub fn alloc(&self) -> Result<MsgId> {
        loop {
            let raw = self.next_id.fetch_add(1) & !OUTBOUND;
            if raw == 0 {
                continue;
            }
            let id = raw | OUTBOUND;
            if self.claim(id)? {
                return Ok(id);
            }
            // the slot already holds this very id; settle on another
        }
    }

    // Try to claim a slot for `id` across the layer chain, appending a
    // layer when every existing one has the slot taken. False means the
    // id itself is already live and the caller must pick a new one.
    fn claim(&self, id: MsgId) -> Result<bool> {
        let slot_idx = id as usize & (LAYER_SIZE - 1);
        let mut link = &self.layers;
        loop {
            let lp = link.load();
            if lp.is_null() {
                let fresh = Box::into_raw(Box::new(Layer::new()));
                if link.compare_exchange(ptr::null_mut(), fresh).is_err() {
                    // someone appended first; theirs is the next layer
                    drop(unsafe { Box::from_raw(fresh) });
                }
                continue;
            }
            let layer = unsafe { &*lp };
            let slot = &layer.slots[slot_idx];
            match slot.id.compare_exchange(0, id) {
                Ok(_) => {
                    // the slot is ours; publish the pool behind the id
                    let pool = match Pool::new() {
                        Ok(p) => p,
                        Err(e) => {
                            slot.id.store(0);
                            return Err(e);
                        }
                    };
                    slot.pool.store(Box::into_raw(Box::new(pool)));
                    debug!("msgid: allocated {:#010x}", id);
                    return Ok(true);
                }
                Err(existing) if existing == id => return Ok(false),
                Err(_) => link = &layer.next,
            }
        }
    }

    fn find(&self, id: MsgId) -> Option<&Slot> {
        if id == 0 {
            return None;
        }
        let slot_idx = id as usize & (LAYER_SIZE - 1);
        let mut lp = self.layers.load();
        while !lp.is_null() {
            let layer = unsafe { &*lp };
            let slot = &layer.slots[slot_idx];
            if slot.id.load() == id {
                return Some(slot);
            }
            lp = layer.next.load();
        }
        None
    }

    /// Is the id live?
    pub fn lookup(&self, id: MsgId) -> bool {
        self.find(id).is_some()
    }

    /// Run `f` against the live id's query pool. The caller must be the
    /// id's owner; ownership of an id is never shared between threads.
    pub fn with_pool<R>(&self, id: MsgId, f: impl FnOnce(&mut Pool) -> R) -> Option<R> {
        let slot = self.find(id)?;
        let p = slot.pool.load();
        if p.is_null() {
            return None;
        }
        Some(f(unsafe { &mut *p }))
    }

    /// Release the id: end its query pool, then free the slot. Idempotent.
    pub fn free(&self, id: MsgId) {
        if let Some(slot) = self.find(id) {
            let p = slot.pool.swap(ptr::null_mut());
            if !p.is_null() {
                drop(unsafe { Box::from_raw(p) });
            }
            // zeroing the id last is what releases the slot
            slot.id.store(0);
            debug!("msgid: freed {:#010x}", id);
        }
    }

    /// Release every live id; used at connection teardown.
    pub fn drain(&self) {
        let mut lp = self.layers.load();
        while !lp.is_null() {
            let layer = unsafe { &*lp };
            for slot in &layer.slots {
                let id = slot.id.load();
                if id != 0 {
                    self.free(id);
                }
            }
            lp = layer.next.load();
        }
    }
}

impl Default for MsgIdRegistry {
    fn default() -> Self {
        MsgIdRegistry::new()
    }
}

impl Drop for MsgIdRegistry {
    fn drop(&mut self) {
        self.drain();
        let mut lp = self.layers.swap(ptr::null_mut());
        while !lp.is_null() {
            let layer = unsafe { Box::from_raw(lp) };
            lp = layer.next.load();
        }
    }
}
