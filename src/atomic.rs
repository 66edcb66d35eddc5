//! Pointer and word cells with a build-time choice of atomicity.
//!
//! The output queue and the message-id registry are written against
//! these cells. The default build uses real atomics; the
//! `single-threaded` feature reduces every operation to a plain load or
//! store, for hosts that drive one endpoint from one thread and want the
//! fences gone.

#[cfg(not(feature = "single-threaded"))]
mod imp {
    use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

    pub struct AtomPtr<T>(AtomicPtr<T>);

    impl<T> AtomPtr<T> {
        pub fn null() -> Self {
            AtomPtr(AtomicPtr::new(std::ptr::null_mut()))
        }

        pub fn load(&self) -> *mut T {
            self.0.load(Ordering::Acquire)
        }

        pub fn store(&self, p: *mut T) {
            self.0.store(p, Ordering::Release)
        }

        pub fn swap(&self, p: *mut T) -> *mut T {
            self.0.swap(p, Ordering::AcqRel)
        }

        pub fn compare_exchange(&self, old: *mut T, new: *mut T) -> Result<*mut T, *mut T> {
            self.0
                .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
        }
    }

    pub struct AtomU32(AtomicU32);

    impl AtomU32 {
        pub fn new(v: u32) -> Self {
            AtomU32(AtomicU32::new(v))
        }

        pub fn load(&self) -> u32 {
            self.0.load(Ordering::Acquire)
        }

        pub fn store(&self, v: u32) {
            self.0.store(v, Ordering::Release)
        }

        pub fn fetch_add(&self, v: u32) -> u32 {
            self.0.fetch_add(v, Ordering::AcqRel)
        }

        pub fn compare_exchange(&self, old: u32, new: u32) -> Result<u32, u32> {
            self.0
                .compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
        }
    }
}

#[cfg(feature = "single-threaded")]
mod imp {
    use std::cell::Cell;

    pub struct AtomPtr<T>(Cell<*mut T>);

    impl<T> AtomPtr<T> {
        pub fn null() -> Self {
            AtomPtr(Cell::new(std::ptr::null_mut()))
        }

        pub fn load(&self) -> *mut T {
            self.0.get()
        }

        pub fn store(&self, p: *mut T) {
            self.0.set(p)
        }

        pub fn swap(&self, p: *mut T) -> *mut T {
            self.0.replace(p)
        }

        pub fn compare_exchange(&self, old: *mut T, new: *mut T) -> Result<*mut T, *mut T> {
            let seen = self.0.get();
            if seen == old {
                self.0.set(new);
                Ok(seen)
            } else {
                Err(seen)
            }
        }
    }

    pub struct AtomU32(Cell<u32>);

    impl AtomU32 {
        pub fn new(v: u32) -> Self {
            AtomU32(Cell::new(v))
        }

        pub fn load(&self) -> u32 {
            self.0.get()
        }

        pub fn store(&self, v: u32) {
            self.0.set(v)
        }

        pub fn fetch_add(&self, v: u32) -> u32 {
            let seen = self.0.get();
            self.0.set(seen.wrapping_add(v));
            seen
        }

        pub fn compare_exchange(&self, old: u32, new: u32) -> Result<u32, u32> {
            let seen = self.0.get();
            if seen == old {
                self.0.set(new);
                Ok(seen)
            } else {
                Err(seen)
            }
        }
    }
}

pub use imp::{AtomPtr, AtomU32};

/// Bounded spin that hands the processor back to the scheduler once the
/// wait stops being brief. Cooperatively scheduled hosts need the yield;
/// preemptive ones are merely polite about it.
pub struct Backoff {
    spins: u32,
}

const SPIN_LIMIT: u32 = 64;

impl Backoff {
    pub fn new() -> Backoff {
        Backoff { spins: 0 }
    }

    pub fn snooze(&mut self) {
        if self.spins < SPIN_LIMIT {
            self.spins += 1;
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new()
    }
}
