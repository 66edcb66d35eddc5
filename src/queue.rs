//! The outgoing queue: many producers, one transmitter, no locks.
//!
//! The queue is a singly linked list. `head` points at the first item or
//! is null; `tail` holds the *address of the null pointer at the end of
//! the list* — the `next` cell of the last item, or, right after
//! initialisation, null as an alias for `&head`. There is always exactly
//! one null next-pointer per queue.
//!
//! A producer appends by atomically swapping `tail` for the address of
//! its own item's `next` cell, then storing the item through the slot it
//! received. Between those two steps the previous slot still reads null,
//! which is the brief window the consumer may have to spin through. The
//! consumer takes items off `head`; before it can retire the last item
//! it offers the terminal slot back to `&head` with a compare-and-swap,
//! and when that loses it spins until the racing producer's back-link
//! appears.

use std::io::{self, Write};
use std::ptr;
use std::sync::RwLock;

use derwalk::Cursor;
use lazy_static::lazy_static;
use log::trace;

use crate::atomic::{AtomPtr, AtomU32, Backoff};
use crate::endpoint::Endpoint;
use crate::mem::Pool;
use crate::result::{Error, Result};

/// Called after every enqueue with the output descriptor, so an event
/// loop can start watching for writability.
pub type WakeupFn = fn(i32);

lazy_static! {
    static ref WAKEUP: RwLock<Option<WakeupFn>> = RwLock::new(None);
}

/// Register the hint that tells the host's event loop a `put_event` may
/// now make progress.
pub fn install_wakeup(f: WakeupFn) {
    *WAKEUP.write().expect("wakeup lock") = Some(f);
}

/// One queued transmission: a run of cursors written out in order, and
/// an optional pool ended once the last cursor has gone out. Null and
/// empty cursors in the run are skipped.
pub struct SendItem {
    next: AtomPtr<SendItem>,
    pool: Option<Pool>,
    cursors: Vec<Cursor>,
    // first cursor not yet fully written; consumer-private
    at: usize,
}

impl SendItem {
    pub fn new(pool: Option<Pool>, cursors: Vec<Cursor>) -> Box<SendItem> {
        Box::new(SendItem {
            next: AtomPtr::null(),
            pool,
            cursors,
            at: 0,
        })
    }
}

pub struct PutQueue {
    head: AtomPtr<SendItem>,
    tail: AtomPtr<AtomPtr<SendItem>>,
    // output descriptor handed to the wakeup hint; -1 when unknown
    fd: AtomU32,
}

impl PutQueue {
    pub fn new() -> PutQueue {
        PutQueue {
            head: AtomPtr::null(),
            tail: AtomPtr::null(),
            fd: AtomU32::new(-1i32 as u32),
        }
    }

    pub(crate) fn set_fd(&self, fd: i32) {
        self.fd.store(fd as u32);
    }

    fn head_slot(&self) -> *mut AtomPtr<SendItem> {
        &self.head as *const AtomPtr<SendItem> as *mut AtomPtr<SendItem>
    }

    /// Append one item. Safe to call from any number of threads.
    pub fn enqueue(&self, item: Box<SendItem>) {
        let item = Box::into_raw(item);
        let next_slot =
            unsafe { &(*item).next as *const AtomPtr<SendItem> as *mut AtomPtr<SendItem> };
        // grab the terminal null slot, leaving our own in its place
        let mut prev = self.tail.swap(next_slot);
        if prev.is_null() {
            // initialisation alias for the head pointer
            prev = self.head_slot();
        }
        let prev = unsafe { &*prev };
        // an earlier enqueuer may have swapped the tail but not yet
        // stored its back-link
        let mut wait = Backoff::new();
        while !prev.load().is_null() {
            wait.snooze();
        }
        prev.store(item);
        trace!("queue: item appended");
        if let Some(wakeup) = *WAKEUP.read().expect("wakeup lock") {
            wakeup(self.fd.load() as i32);
        }
    }

    /// Is there anything waiting to be written?
    pub fn can_send(&self) -> bool {
        !self.head.load().is_null()
    }

    /// Write the front of the queue to `sink`, retiring items whose
    /// cursors are exhausted. Single consumer only. Returns the write
    /// count, or `Retry` when the queue is empty.
    pub(crate) fn drain_once(&self, sink: &mut (dyn Write + Send)) -> Result<usize> {
        loop {
            let todo = self.head.load();
            if todo.is_null() {
                return Err(Error::Retry);
            }
            // the sole consumer owns item bodies; producers only ever
            // touch the next cell
            let item = unsafe { &mut *todo };
            while let Some(c) = item.cursors.get(item.at) {
                if c.is_null() || c.is_empty() {
                    item.at += 1;
                } else {
                    break;
                }
            }
            if item.at == item.cursors.len() {
                self.retire(todo);
                continue;
            }
            let cursor = &mut item.cursors[item.at];
            let sent = match sink.write(cursor.as_slice()) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(Error::Retry),
                Err(e) => return Err(Error::Io(e)),
            };
            cursor.advance(sent);
            return Ok(sent);
        }
    }

    // Unlink the fully written front item and end its pool.
    fn retire(&self, todo: *mut SendItem) {
        let item = unsafe { &*todo };
        let mut qnext = item.next.load();
        if qnext.is_null() {
            // offer to take the terminal null slot back to the head
            let next_slot =
                &item.next as *const AtomPtr<SendItem> as *mut AtomPtr<SendItem>;
            if self
                .tail
                .compare_exchange(next_slot, self.head_slot())
                .is_err()
            {
                // a producer is mid-append; its back-link will show up
                let mut wait = Backoff::new();
                loop {
                    qnext = item.next.load();
                    if !qnext.is_null() {
                        break;
                    }
                    wait.snooze();
                }
            }
        }
        self.head.store(qnext);
        // nobody references the item anymore
        let item = unsafe { Box::from_raw(todo) };
        if let Some(pool) = item.pool {
            pool.end();
        }
        trace!("queue: item retired");
    }
}

impl Default for PutQueue {
    fn default() -> Self {
        PutQueue::new()
    }
}

impl Drop for PutQueue {
    fn drop(&mut self) {
        let mut p = self.head.swap(ptr::null_mut());
        while !p.is_null() {
            let item = unsafe { Box::from_raw(p) };
            p = item.next.load();
        }
    }
}

/// Stage: wrap one framed message as a queue item and hand it, pool and
/// all, to the transmitter.
pub fn put_dercursor(lil: &mut Endpoint, pool: Pool, msg: Cursor) -> Result<()> {
    trace!("put: queueing {} octets", msg.len());
    lil.queue().enqueue(SendItem::new(Some(pool), vec![msg]));
    Ok(())
}

impl Endpoint {
    /// Drive one tick of the write side: send pending queue bytes to the
    /// output transport. Returns the write count; `Retry` means either
    /// an empty queue or a full transport, and the host should wait for
    /// its event loop.
    pub fn put_event(&mut self) -> Result<usize> {
        let queue = self.queue().clone();
        let sink = match self.sink_mut() {
            Some(s) => s,
            None => {
                return self.record(Error::Unsupported("no output transport attached"));
            }
        };
        let outcome = queue.drain_once(sink);
        match outcome {
            Ok(n) => Ok(n),
            Err(e) => self.record(e),
        }
    }

    /// Is there outgoing work queued on this endpoint?
    pub fn can_send(&self) -> bool {
        self.queue().can_send()
    }
}
