//! Fair, reentrant read/write lock scoped to a single cache region.
//!
//! Ownership is tracked per thread so that a release can be checked against
//! an actual acquisition. Non-blocking attempts (`try_*`) never wait; the
//! blocking `read()`/`write()` calls queue in FIFO order and the oldest
//! waiter is served first. Non-blocking attempts do not overtake queued
//! waiters unless they are reentrant.

use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::thread::{self, ThreadId};
use tracing::error;

use super::error::{LockError, LockMode};

/// Acquisition counters of a region lock
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LockStats {
    /// Successful acquisitions (read and write, reentrant ones included)
    pub acquisitions: u64,
    /// Successful releases
    pub releases: u64,
    /// Non-blocking attempts that failed
    pub contended: u64,
}

#[derive(Debug, Default)]
struct LockState {
    writer: Option<ThreadId>,
    write_holds: usize,
    readers: HashMap<ThreadId, usize>,
    waiters: VecDeque<u64>,
    next_ticket: u64,
    stats: LockStats,
}

impl LockState {
    fn holds_read(&self, me: ThreadId) -> bool {
        self.readers.contains_key(&me)
    }

    fn holds_write(&self, me: ThreadId) -> bool {
        self.writer == Some(me)
    }

    fn read_available(&self, me: ThreadId) -> bool {
        self.writer.is_none_or(|owner| owner == me)
    }

    // A read holder (including `me`) blocks writers: no upgrades
    fn write_available(&self, me: ThreadId) -> bool {
        match self.writer {
            Some(owner) => owner == me,
            None => self.readers.is_empty(),
        }
    }

    fn grant_read(&mut self, me: ThreadId) {
        *self.readers.entry(me).or_insert(0) += 1;
        self.stats.acquisitions += 1;
    }

    fn grant_write(&mut self, me: ThreadId) {
        self.writer = Some(me);
        self.write_holds += 1;
        self.stats.acquisitions += 1;
    }

    fn enqueue(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.waiters.push_back(ticket);
        ticket
    }
}

/// Read/write lock shared by all operations of one region
#[derive(Debug, Default)]
pub struct RegionLock {
    state: Mutex<LockState>,
    available: Condvar,
}

impl RegionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to take the read lock without waiting
    pub fn try_acquire_read(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();

        let reentrant = state.holds_read(me) || state.holds_write(me);
        if state.read_available(me) && (reentrant || state.waiters.is_empty()) {
            state.grant_read(me);
            true
        } else {
            state.stats.contended += 1;
            false
        }
    }

    /// Attempt to take the write lock without waiting
    pub fn try_acquire_write(&self) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.holds_write(me) || (state.write_available(me) && state.waiters.is_empty()) {
            state.grant_write(me);
            true
        } else {
            state.stats.contended += 1;
            false
        }
    }

    /// Release one read hold of the calling thread
    pub fn release_read(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        let remaining = match state.readers.get_mut(&me) {
            Some(count) => {
                *count -= 1;
                *count
            }
            None => return Err(LockError::NotHeld(LockMode::Read)),
        };
        if remaining == 0 {
            state.readers.remove(&me);
        }
        state.stats.releases += 1;
        drop(state);

        self.available.notify_all();
        Ok(())
    }

    /// Release one write hold of the calling thread
    pub fn release_write(&self) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if !state.holds_write(me) {
            return Err(LockError::NotHeld(LockMode::Write));
        }
        state.write_holds -= 1;
        if state.write_holds == 0 {
            state.writer = None;
        }
        state.stats.releases += 1;
        drop(state);

        self.available.notify_all();
        Ok(())
    }

    /// Non-blocking read acquisition returning a guard that releases on drop
    pub fn try_read(&self) -> Option<RegionReadGuard<'_>> {
        self.try_acquire_read().then(|| RegionReadGuard::new(self))
    }

    /// Non-blocking write acquisition returning a guard that releases on drop
    pub fn try_write(&self) -> Option<RegionWriteGuard<'_>> {
        self.try_acquire_write().then(|| RegionWriteGuard::new(self))
    }

    /// Block until the read lock is granted in arrival order
    pub fn read(&self) -> RegionReadGuard<'_> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        let reentrant = state.holds_read(me) || state.holds_write(me);
        if state.read_available(me) && (reentrant || state.waiters.is_empty()) {
            state.grant_read(me);
            return RegionReadGuard::new(self);
        }

        let ticket = state.enqueue();
        loop {
            if state.waiters.front() == Some(&ticket) && state.read_available(me) {
                state.waiters.pop_front();
                state.grant_read(me);
                break;
            }
            self.available.wait(&mut state);
        }
        drop(state);

        // Readers queued right behind us may proceed too
        self.available.notify_all();
        RegionReadGuard::new(self)
    }

    /// Block until the write lock is granted in arrival order
    pub fn write(&self) -> Result<RegionWriteGuard<'_>, LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();

        if state.holds_read(me) && !state.holds_write(me) {
            return Err(LockError::UpgradeNotSupported);
        }
        if state.holds_write(me) || (state.write_available(me) && state.waiters.is_empty()) {
            state.grant_write(me);
            return Ok(RegionWriteGuard::new(self));
        }

        let ticket = state.enqueue();
        loop {
            if state.waiters.front() == Some(&ticket) && state.write_available(me) {
                state.waiters.pop_front();
                state.grant_write(me);
                break;
            }
            self.available.wait(&mut state);
        }

        Ok(RegionWriteGuard::new(self))
    }

    /// Whether any thread holds the write lock
    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }

    /// Number of threads currently holding the read lock
    pub fn reader_count(&self) -> usize {
        self.state.lock().readers.len()
    }

    /// Number of threads blocked in `read()`/`write()`
    pub fn queued(&self) -> usize {
        self.state.lock().waiters.len()
    }

    pub fn stats(&self) -> LockStats {
        self.state.lock().stats
    }
}

/// Read hold released on drop. Bound to the acquiring thread.
#[must_use = "the read lock is released as soon as the guard is dropped"]
pub struct RegionReadGuard<'a> {
    lock: &'a RegionLock,
    _not_send: PhantomData<*const ()>,
}

impl<'a> RegionReadGuard<'a> {
    fn new(lock: &'a RegionLock) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }
}

impl Drop for RegionReadGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release_read() {
            error!("Read guard release failed: {}", err);
            debug_assert!(false, "read guard released an unheld lock: {err}");
        }
    }
}

/// Write hold released on drop. Bound to the acquiring thread.
#[must_use = "the write lock is released as soon as the guard is dropped"]
pub struct RegionWriteGuard<'a> {
    lock: &'a RegionLock,
    _not_send: PhantomData<*const ()>,
}

impl<'a> RegionWriteGuard<'a> {
    fn new(lock: &'a RegionLock) -> Self {
        Self {
            lock,
            _not_send: PhantomData,
        }
    }
}

impl Drop for RegionWriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release_write() {
            error!("Write guard release failed: {}", err);
            debug_assert!(false, "write guard released an unheld lock: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_readers_share() {
        let lock = Arc::new(RegionLock::new());
        let _guard = lock.try_read().unwrap();

        let other = Arc::clone(&lock);
        let acquired = thread::spawn(move || other.try_read().is_some())
            .join()
            .unwrap();
        assert!(acquired);
    }

    #[test]
    fn test_writer_excludes_readers() {
        let lock = Arc::new(RegionLock::new());
        let _guard = lock.try_write().unwrap();

        let other = Arc::clone(&lock);
        let (read, write) = thread::spawn(move || {
            (other.try_acquire_read(), other.try_acquire_write())
        })
        .join()
        .unwrap();
        assert!(!read);
        assert!(!write);
        assert_eq!(lock.stats().contended, 2);
    }

    #[test]
    fn test_reentrant_read_and_write() {
        let lock = RegionLock::new();

        let w1 = lock.try_write().unwrap();
        let w2 = lock.try_write().unwrap();
        let r = lock.try_read().unwrap();
        drop(w2);
        assert!(lock.is_write_locked());
        drop(w1);
        assert!(!lock.is_write_locked());
        assert_eq!(lock.reader_count(), 1);
        drop(r);
        assert_eq!(lock.reader_count(), 0);
    }

    #[test]
    fn test_upgrade_refused() {
        let lock = RegionLock::new();
        let _read = lock.try_read().unwrap();

        assert!(!lock.try_acquire_write());
        assert_eq!(lock.write().err(), Some(LockError::UpgradeNotSupported));
    }

    #[test]
    fn test_release_unheld_fails() {
        let lock = RegionLock::new();
        assert_eq!(
            lock.release_read(),
            Err(LockError::NotHeld(LockMode::Read))
        );
        assert_eq!(
            lock.release_write(),
            Err(LockError::NotHeld(LockMode::Write))
        );
        assert_eq!(lock.stats().releases, 0);
    }

    #[test]
    fn test_release_held_by_other_thread_fails() {
        let lock = Arc::new(RegionLock::new());
        assert!(lock.try_acquire_write());

        let other = Arc::clone(&lock);
        let result = thread::spawn(move || other.release_write()).join().unwrap();
        assert_eq!(result, Err(LockError::NotHeld(LockMode::Write)));
        assert!(lock.is_write_locked());

        lock.release_write().unwrap();
        assert!(!lock.is_write_locked());
    }

    #[test]
    fn test_acquisitions_match_releases() {
        let lock = RegionLock::new();
        for _ in 0..5 {
            drop(lock.try_read());
            drop(lock.try_write());
        }
        let stats = lock.stats();
        assert_eq!(stats.acquisitions, 10);
        assert_eq!(stats.acquisitions, stats.releases);
    }

    #[test]
    fn test_queued_writer_blocks_new_readers() {
        let lock = Arc::new(RegionLock::new());
        let read = lock.try_read().unwrap();

        let writer_lock = Arc::clone(&lock);
        let (tx, rx) = mpsc::channel();
        let writer = thread::spawn(move || {
            let _guard = writer_lock.write().unwrap();
            tx.send(()).unwrap();
        });

        while lock.queued() == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        // A fresh reader on another thread must not barge past the queued writer
        let reader_lock = Arc::clone(&lock);
        let barged = thread::spawn(move || reader_lock.try_acquire_read())
            .join()
            .unwrap();
        assert!(!barged);

        drop(read);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        writer.join().unwrap();
        assert_eq!(lock.queued(), 0);
    }

    #[test]
    fn test_blocking_waiters_served_in_order() {
        let lock = Arc::new(RegionLock::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let write = lock.try_write().unwrap();

        let mut handles = Vec::new();
        for id in 0..3 {
            let waiter = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                let _guard = waiter.write().unwrap();
                order.lock().push(id);
            }));
            while lock.queued() < id + 1 {
                thread::sleep(Duration::from_millis(1));
            }
        }

        drop(write);
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }
}
