//! Threads, mutexes and semaphores behind generation-checked handles.
//!
//! The emulation core treats these as opaque tokens: it creates a primitive,
//! passes the token around, and eventually frees it. The registry owns every
//! primitive; tokens are `Copy` ids resolved through [`HandleTable`], so a
//! freed token produces a `StaleHandle` error on its next use rather than
//! touching freed memory.
//!
//! Blocking never happens while a table lock is held: operations resolve the
//! token under a short lock, clone the `Arc` to the primitive, and block on
//! that outside the table.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::{PlatformError, Result};
use crate::handle::{HandleTable, RawHandle};
use crate::task::TaskBox;

macro_rules! opaque_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(RawHandle);
    };
}

opaque_handle!(
    /// One host-managed thread running a [`TaskBox`] to completion.
    ThreadHandle
);
opaque_handle!(
    /// A non-reentrant mutual-exclusion primitive. Unlock by a non-owner is
    /// caller discipline; the registry does not track owners.
    MutexHandle
);
opaque_handle!(
    /// A counting semaphore with a reset that does not wake waiters.
    SemaphoreHandle
);

struct ThreadSlot {
    join: Option<JoinHandle<()>>,
}

/// Binary lock built on `Mutex<bool>` so unlocking needs no guard lifetime.
/// The boundary contract hands lock and unlock out as separate calls, which a
/// `MutexGuard` cannot express.
struct RawLock {
    locked: Mutex<bool>,
    cond: Condvar,
}

impl RawLock {
    fn new() -> Self {
        Self {
            locked: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn lock(&self) {
        let mut locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        while *locked {
            locked = self
                .cond
                .wait(locked)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *locked = true;
    }

    fn try_lock(&self) -> bool {
        let mut locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        if *locked {
            false
        } else {
            *locked = true;
            true
        }
    }

    fn unlock(&self) {
        let mut locked = self.locked.lock().unwrap_or_else(PoisonError::into_inner);
        *locked = false;
        drop(locked);
        self.cond.notify_one();
    }
}

struct RawSemaphore {
    count: Mutex<u32>,
    cond: Condvar,
}

impl RawSemaphore {
    fn new() -> Self {
        Self {
            count: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        while *count == 0 {
            count = self
                .cond
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    /// Bounded wait, used by tests that must not hang on a contract
    /// violation. Returns false on timeout.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let deadline = std::time::Instant::now() + timeout;
        while *count == 0 {
            let remaining = match deadline.checked_duration_since(std::time::Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => return false,
            };
            let (guard, _) = self
                .cond
                .wait_timeout(count, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            count = guard;
        }
        *count -= 1;
        true
    }

    fn post(&self, n: u32) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_add(n);
        drop(count);
        if n == 1 {
            self.cond.notify_one();
        } else {
            self.cond.notify_all();
        }
    }

    /// Forces the count to zero. Waiters are deliberately not woken; a thread
    /// parked in `wait` stays parked until the next `post`. This is how a
    /// paused instance cancels a pending wait session.
    fn reset(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = 0;
    }
}

/// Owning registry for every sync primitive handed across the boundary.
pub struct SyncRegistry {
    threads: Mutex<HandleTable<ThreadSlot>>,
    mutexes: Mutex<HandleTable<Arc<RawLock>>>,
    semaphores: Mutex<HandleTable<Arc<RawSemaphore>>>,
    thread_seq: AtomicU64,
}

impl Default for SyncRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncRegistry {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(HandleTable::new()),
            mutexes: Mutex::new(HandleTable::new()),
            semaphores: Mutex::new(HandleTable::new()),
            thread_seq: AtomicU64::new(0),
        }
    }

    /// Hands `task` to a new host thread, which invokes it exactly once.
    ///
    /// Thread creation failure is surfaced as `ResourceUnavailable` and not
    /// retried; for the emulation core this is fatal.
    pub fn spawn(&self, task: TaskBox) -> Result<ThreadHandle> {
        let seq = self.thread_seq.fetch_add(1, Ordering::Relaxed);
        let join = std::thread::Builder::new()
            .name(format!("bedrock-worker-{seq}"))
            .spawn(move || task.invoke())
            .map_err(PlatformError::ResourceUnavailable)?;
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let raw = threads.insert(ThreadSlot { join: Some(join) });
        Ok(ThreadHandle(raw))
    }

    /// Blocks until the thread's closure has returned.
    ///
    /// Waiting a second time on the same handle returns `AlreadyWaited`.
    pub fn thread_wait(&self, handle: ThreadHandle) -> Result<()> {
        let join = {
            let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = threads
                .get_mut(handle.0)
                .ok_or_else(|| stale("thread", handle.0))?;
            slot.join.take().ok_or(PlatformError::AlreadyWaited)?
        };
        join.join().map_err(|_| PlatformError::ThreadPanicked)
    }

    /// Releases the thread's host resources and retires the handle. A second
    /// free of the same handle is rejected with `StaleHandle`.
    pub fn thread_free(&self, handle: ThreadHandle) -> Result<()> {
        let mut threads = self.threads.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = threads
            .remove(handle.0)
            .ok_or_else(|| stale("thread", handle.0))?;
        if slot.join.is_some() {
            // Freed without a wait: the thread keeps running detached. Legal
            // for teardown paths, but worth a trace because the contract says
            // wait-then-free.
            tracing::warn!(?handle, "thread freed before being waited on");
        }
        Ok(())
    }

    pub fn mutex_create(&self) -> MutexHandle {
        let mut mutexes = self.mutexes.lock().unwrap_or_else(PoisonError::into_inner);
        MutexHandle(mutexes.insert(Arc::new(RawLock::new())))
    }

    pub fn mutex_free(&self, handle: MutexHandle) -> Result<()> {
        let mut mutexes = self.mutexes.lock().unwrap_or_else(PoisonError::into_inner);
        mutexes
            .remove(handle.0)
            .map(drop)
            .ok_or_else(|| stale("mutex", handle.0))
    }

    pub fn mutex_lock(&self, handle: MutexHandle) -> Result<()> {
        self.resolve_mutex(handle)?.lock();
        Ok(())
    }

    /// Never blocks. Returns false iff another holder currently holds the
    /// lock.
    pub fn mutex_try_lock(&self, handle: MutexHandle) -> Result<bool> {
        Ok(self.resolve_mutex(handle)?.try_lock())
    }

    pub fn mutex_unlock(&self, handle: MutexHandle) -> Result<()> {
        self.resolve_mutex(handle)?.unlock();
        Ok(())
    }

    pub fn semaphore_create(&self) -> SemaphoreHandle {
        let mut semaphores = self
            .semaphores
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        SemaphoreHandle(semaphores.insert(Arc::new(RawSemaphore::new())))
    }

    pub fn semaphore_free(&self, handle: SemaphoreHandle) -> Result<()> {
        let mut semaphores = self
            .semaphores
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        semaphores
            .remove(handle.0)
            .map(drop)
            .ok_or_else(|| stale("semaphore", handle.0))
    }

    /// Blocks until the count is positive, then decrements it.
    pub fn semaphore_wait(&self, handle: SemaphoreHandle) -> Result<()> {
        self.resolve_semaphore(handle)?.wait();
        Ok(())
    }

    /// Like `semaphore_wait` but gives up after `timeout`. Returns whether
    /// the semaphore was acquired.
    pub fn semaphore_wait_timeout(
        &self,
        handle: SemaphoreHandle,
        timeout: Duration,
    ) -> Result<bool> {
        Ok(self.resolve_semaphore(handle)?.wait_timeout(timeout))
    }

    /// Increments the count by `n`, waking up to `n` waiters.
    pub fn semaphore_post(&self, handle: SemaphoreHandle, n: u32) -> Result<()> {
        self.resolve_semaphore(handle)?.post(n);
        Ok(())
    }

    /// Zeroes the count without waking anyone.
    pub fn semaphore_reset(&self, handle: SemaphoreHandle) -> Result<()> {
        self.resolve_semaphore(handle)?.reset();
        Ok(())
    }

    fn resolve_mutex(&self, handle: MutexHandle) -> Result<Arc<RawLock>> {
        let mutexes = self.mutexes.lock().unwrap_or_else(PoisonError::into_inner);
        mutexes
            .get(handle.0)
            .cloned()
            .ok_or_else(|| stale("mutex", handle.0))
    }

    fn resolve_semaphore(&self, handle: SemaphoreHandle) -> Result<Arc<RawSemaphore>> {
        let semaphores = self
            .semaphores
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        semaphores
            .get(handle.0)
            .cloned()
            .ok_or_else(|| stale("semaphore", handle.0))
    }
}

fn stale(kind: &'static str, raw: RawHandle) -> PlatformError {
    PlatformError::StaleHandle {
        kind,
        index: raw.index,
        generation: raw.generation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn spawn_wait_free_observes_the_closure_result() {
        let registry = SyncRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let handle = registry
            .spawn(TaskBox::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        registry.thread_wait(handle).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        registry.thread_free(handle).unwrap();
        // Second free resolves to a retired slot.
        assert!(matches!(
            registry.thread_free(handle),
            Err(PlatformError::StaleHandle { kind: "thread", .. })
        ));
    }

    #[test]
    fn double_wait_is_rejected() {
        let registry = SyncRegistry::new();
        let handle = registry.spawn(TaskBox::new(|| {})).unwrap();
        registry.thread_wait(handle).unwrap();
        assert!(matches!(
            registry.thread_wait(handle),
            Err(PlatformError::AlreadyWaited)
        ));
        registry.thread_free(handle).unwrap();
    }

    #[test]
    fn try_lock_fails_while_held_and_never_blocks() {
        let registry = SyncRegistry::new();
        let mutex = registry.mutex_create();
        registry.mutex_lock(mutex).unwrap();
        assert!(!registry.mutex_try_lock(mutex).unwrap());
        registry.mutex_unlock(mutex).unwrap();
        assert!(registry.mutex_try_lock(mutex).unwrap());
        registry.mutex_unlock(mutex).unwrap();
        registry.mutex_free(mutex).unwrap();
    }

    #[test]
    fn mutex_lock_blocks_until_unlocked() {
        let registry = Arc::new(SyncRegistry::new());
        let mutex = registry.mutex_create();
        registry.mutex_lock(mutex).unwrap();

        let r = registry.clone();
        let acquired = Arc::new(AtomicUsize::new(0));
        let a = acquired.clone();
        let thread = registry
            .spawn(TaskBox::new(move || {
                r.mutex_lock(mutex).unwrap();
                a.store(1, Ordering::SeqCst);
                r.mutex_unlock(mutex).unwrap();
            }))
            .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(acquired.load(Ordering::SeqCst), 0);
        registry.mutex_unlock(mutex).unwrap();
        registry.thread_wait(thread).unwrap();
        assert_eq!(acquired.load(Ordering::SeqCst), 1);
        registry.thread_free(thread).unwrap();
        registry.mutex_free(mutex).unwrap();
    }

    #[test]
    fn semaphore_wait_consumes_posts() {
        let registry = SyncRegistry::new();
        let sema = registry.semaphore_create();
        registry.semaphore_post(sema, 2).unwrap();
        registry.semaphore_wait(sema).unwrap();
        registry.semaphore_wait(sema).unwrap();
        assert!(!registry
            .semaphore_wait_timeout(sema, Duration::from_millis(10))
            .unwrap());
        registry.semaphore_free(sema).unwrap();
    }

    #[test]
    fn reset_does_not_wake_a_parked_waiter() {
        let registry = Arc::new(SyncRegistry::new());
        let sema = registry.semaphore_create();

        let r = registry.clone();
        let released = Arc::new(AtomicUsize::new(0));
        let flag = released.clone();
        let waiter = registry
            .spawn(TaskBox::new(move || {
                r.semaphore_wait(sema).unwrap();
                flag.store(1, Ordering::SeqCst);
            }))
            .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        registry.semaphore_reset(sema).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(released.load(Ordering::SeqCst), 0, "reset must not wake");

        registry.semaphore_post(sema, 1).unwrap();
        registry.thread_wait(waiter).unwrap();
        assert_eq!(released.load(Ordering::SeqCst), 1);
        registry.thread_free(waiter).unwrap();
        registry.semaphore_free(sema).unwrap();
    }

    #[test]
    fn freed_primitives_yield_stale_handle_errors() {
        let registry = SyncRegistry::new();
        let mutex = registry.mutex_create();
        registry.mutex_free(mutex).unwrap();
        assert!(matches!(
            registry.mutex_lock(mutex),
            Err(PlatformError::StaleHandle { kind: "mutex", .. })
        ));

        let sema = registry.semaphore_create();
        registry.semaphore_free(sema).unwrap();
        assert!(matches!(
            registry.semaphore_post(sema, 1),
            Err(PlatformError::StaleHandle {
                kind: "semaphore",
                ..
            })
        ));
    }
}
