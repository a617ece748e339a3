//! Per-source reader/writer lock scopes.
//!
//! Every resolver call holds exactly one [`LockScope`] for its source: loads
//! take a shared scope, stores an exclusive one.  Scopes are RAII guards and
//! release on drop, so early returns and panics unwind them too.
//!
//! The table only holds entries for paths that are currently claimed; paths
//! never contend with each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum LockError {
    /// A thread panicked while it held the lock table.
    #[error("source lock table poisoned")]
    Poisoned,
    /// The claim could not be granted within the configured timeout.
    #[error("timed out after {waited:?} waiting for lock on {}", path.display())]
    Timeout { path: PathBuf, waited: Duration },
}

impl<T> From<PoisonError<T>> for LockError {
    fn from(_: PoisonError<T>) -> Self {
        LockError::Poisoned
    }
}

/// Shared (read) or exclusive (write) claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

#[derive(Debug, Default)]
struct Holders {
    readers:         usize,
    writer:          bool,
    /// Exclusive claims blocked on this path.  New shared claims queue
    /// behind them so a stream of loads cannot starve a store.
    writers_waiting: usize,
}

impl Holders {
    fn admits(&self, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared    => !self.writer && self.writers_waiting == 0,
            LockMode::Exclusive => !self.writer && self.readers == 0,
        }
    }

    fn is_idle(&self) -> bool {
        !self.writer && self.readers == 0 && self.writers_waiting == 0
    }
}

/// Withdraw a queued exclusive claim that gave up.
fn dequeue_writer(table: &mut HashMap<PathBuf, Holders>, path: &Path) {
    if let Some(holders) = table.get_mut(path) {
        holders.writers_waiting = holders.writers_waiting.saturating_sub(1);
        if holders.is_idle() {
            table.remove(path);
        }
    }
}

/// Lock table keyed by source path.
#[derive(Debug, Default)]
pub struct SourceLocks {
    table:    Mutex<HashMap<PathBuf, Holders>>,
    released: Condvar,
    timeout:  Option<Duration>,
}

impl SourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail claims that wait longer than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout, ..Self::default() }
    }

    pub fn shared(&self, path: &Path) -> Result<LockScope<'_>, LockError> {
        self.acquire(path, LockMode::Shared)
    }

    pub fn exclusive(&self, path: &Path) -> Result<LockScope<'_>, LockError> {
        self.acquire(path, LockMode::Exclusive)
    }

    /// Block until `mode` can be granted on `path`.
    ///
    /// Writers are preferred: once an exclusive claim is waiting, later
    /// shared claims wait behind it.
    pub fn acquire(&self, path: &Path, mode: LockMode) -> Result<LockScope<'_>, LockError> {
        let started = Instant::now();
        let mut table = self.table.lock()?;
        let mut queued = false;

        loop {
            if table.get(path).map_or(true, |h| h.admits(mode)) {
                break;
            }
            if mode == LockMode::Exclusive && !queued {
                table.entry(path.to_owned()).or_default().writers_waiting += 1;
                queued = true;
            }
            let next = match self.timeout {
                None => self.released.wait(table).map_err(PoisonError::into_inner),
                Some(limit) => {
                    let waited = started.elapsed();
                    if waited >= limit {
                        if queued {
                            dequeue_writer(&mut table, path);
                            drop(table);
                            self.released.notify_all();
                        }
                        return Err(LockError::Timeout { path: path.to_owned(), waited });
                    }
                    self.released
                        .wait_timeout(table, limit - waited)
                        .map(|(t, _)| t)
                        .map_err(|e| e.into_inner().0)
                }
            };
            table = match next {
                Ok(t) => t,
                Err(mut t) => {
                    if queued {
                        dequeue_writer(&mut t, path);
                        drop(t);
                        self.released.notify_all();
                    }
                    return Err(LockError::Poisoned);
                }
            };
        }

        let holders = table.entry(path.to_owned()).or_default();
        match mode {
            LockMode::Shared    => holders.readers += 1,
            LockMode::Exclusive => {
                holders.writer = true;
                if queued {
                    holders.writers_waiting -= 1;
                }
            }
        }
        trace!(path = %path.display(), ?mode, "lock acquired");

        Ok(LockScope { locks: self, path: path.to_owned(), mode })
    }

    /// Number of paths currently claimed.
    pub fn active(&self) -> usize {
        self.table.lock().map(|t| t.len()).unwrap_or(0)
    }

    fn release(&self, path: &Path, mode: LockMode) {
        // Release even if another thread poisoned the table; leaving the
        // claim behind would block the source forever.
        let mut table: MutexGuard<'_, _> = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(holders) = table.get_mut(path) {
            match mode {
                LockMode::Shared    => holders.readers = holders.readers.saturating_sub(1),
                LockMode::Exclusive => holders.writer = false,
            }
            if holders.is_idle() {
                table.remove(path);
            }
        }
        drop(table);
        trace!(path = %path.display(), ?mode, "lock released");
        self.released.notify_all();
    }
}

/// RAII claim on one source.  Released when dropped.
#[derive(Debug)]
pub struct LockScope<'a> {
    locks: &'a SourceLocks,
    path:  PathBuf,
    mode:  LockMode,
}

impl LockScope<'_> {
    pub fn mode(&self) -> LockMode { self.mode }

    pub fn path(&self) -> &Path { &self.path }
}

impl Drop for LockScope<'_> {
    fn drop(&mut self) {
        self.locks.release(&self.path, self.mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn shared_scopes_coexist() {
        let locks = SourceLocks::new();
        let a = locks.shared(Path::new("book.cbx")).unwrap();
        let b = locks.shared(Path::new("book.cbx")).unwrap();
        assert_eq!(a.mode(), LockMode::Shared);
        assert_eq!(locks.active(), 1);
        drop(a);
        drop(b);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn exclusive_waits_for_readers_and_times_out() {
        let locks = SourceLocks::with_timeout(Some(Duration::from_millis(30)));
        let reader = locks.shared(Path::new("book.cbx")).unwrap();
        match locks.exclusive(Path::new("book.cbx")) {
            Err(LockError::Timeout { path, waited }) => {
                assert_eq!(path, PathBuf::from("book.cbx"));
                assert!(waited >= Duration::from_millis(30));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // The abandoned writer no longer holds readers back.
        let again = locks.shared(Path::new("book.cbx")).unwrap();
        drop(again);
        drop(reader);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn waiting_writer_goes_before_later_readers() {
        let locks = Arc::new(SourceLocks::new());
        let order = Arc::new(Mutex::new(Vec::new()));
        let first = locks.shared(Path::new("book.cbx")).unwrap();

        let writer = {
            let (locks, order) = (Arc::clone(&locks), Arc::clone(&order));
            thread::spawn(move || {
                let _scope = locks.exclusive(Path::new("book.cbx")).unwrap();
                order.lock().unwrap().push("writer");
                thread::sleep(Duration::from_millis(20));
            })
        };
        while locks.table.lock().unwrap().get(Path::new("book.cbx")).map_or(0, |h| h.writers_waiting) == 0 {
            thread::yield_now();
        }

        let late = {
            let (locks, order) = (Arc::clone(&locks), Arc::clone(&order));
            thread::spawn(move || {
                let _scope = locks.shared(Path::new("book.cbx")).unwrap();
                order.lock().unwrap().push("reader");
            })
        };
        thread::sleep(Duration::from_millis(30));
        assert!(order.lock().unwrap().is_empty());

        drop(first);
        writer.join().unwrap();
        late.join().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["writer", "reader"]);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn different_paths_do_not_contend() {
        let locks = SourceLocks::with_timeout(Some(Duration::from_millis(10)));
        let _a = locks.exclusive(Path::new("a.cbx")).unwrap();
        let _b = locks.exclusive(Path::new("b.cbx")).unwrap();
        assert_eq!(locks.active(), 2);
    }

    #[test]
    fn scope_is_released_on_early_return() {
        fn bail(locks: &SourceLocks) -> Result<(), LockError> {
            let _scope = locks.exclusive(Path::new("x.cbx"))?;
            Err(LockError::Poisoned)
        }
        let locks = SourceLocks::new();
        assert!(bail(&locks).is_err());
        assert_eq!(locks.active(), 0);
        assert!(locks.exclusive(Path::new("x.cbx")).is_ok());
    }

    #[test]
    fn writers_exclude_everyone() {
        let locks = Arc::new(SourceLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let writer_in = Arc::new(AtomicBool::new(false));
        let overlap = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let writer_in = Arc::clone(&writer_in);
                let overlap = Arc::clone(&overlap);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let mode = if i % 2 == 0 { LockMode::Exclusive } else { LockMode::Shared };
                        let _scope = locks.acquire(Path::new("same.cbx"), mode).unwrap();
                        let n = inside.fetch_add(1, Ordering::SeqCst);
                        if mode == LockMode::Exclusive {
                            if n != 0 { overlap.store(true, Ordering::SeqCst); }
                            writer_in.store(true, Ordering::SeqCst);
                        } else if writer_in.load(Ordering::SeqCst) {
                            overlap.store(true, Ordering::SeqCst);
                        }
                        thread::yield_now();
                        if mode == LockMode::Exclusive {
                            writer_in.store(false, Ordering::SeqCst);
                        }
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for h in handles { h.join().unwrap(); }
        assert!(!overlap.load(Ordering::SeqCst));
        assert_eq!(locks.active(), 0);
    }
}
