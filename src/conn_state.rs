//! Connection-completion state shared by the Connection Manager and
//! its per-session reader threads.
//!
//! Direct rendering of `conn_state_t` from the original's
//! `connmgr.h`/`connmgr.c`: an `active` count of still-running
//! sessions, a `served` count of terminated ones, guarded by one mutex
//! and one condition variable so the accept loop's shutdown path can
//! block until `active` reaches zero.

use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Counters {
    active: u32,
    served: u32,
}

/// Shared counters for in-flight and completed sensor sessions.
#[derive(Debug, Default)]
pub struct ConnState {
    counters: Mutex<Counters>,
    changed: Condvar,
}

impl ConnState {
    /// New state with `active == 0`, `served == 0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a session has been accepted and registered.
    pub fn register_active(&self) {
        let mut c = self.counters.lock().expect("conn state mutex poisoned");
        c.active += 1;
    }

    /// Check the quota and increment `active` under a single lock
    /// acquisition: returns `true` and registers the session if
    /// `served < max_conn`, or returns `false` without registering if
    /// the quota has already been met. Spec.md §4.2 step 2 requires
    /// this re-check and the increment to be one atomic step — holding
    /// the lock only across the read (`quota_reached`) and then again
    /// across the write (`register_active`) leaves a gap in which a
    /// concurrently finishing session's `record_completion` could push
    /// `served` to the quota between the two acquisitions, letting a
    /// session register after the quota was already met. Mirrors the
    /// single `pthread_mutex_lock` span around both steps in the
    /// original's `connmgr.c`.
    pub fn try_register_active(&self, max_conn: u32) -> bool {
        let mut c = self.counters.lock().expect("conn state mutex poisoned");
        if c.served >= max_conn {
            return false;
        }
        c.active += 1;
        true
    }

    /// Undo a `register_active` that was never matched by a running
    /// session (spawn failure, or the quota was already met).
    pub fn undo_active(&self) {
        let mut c = self.counters.lock().expect("conn state mutex poisoned");
        c.active = c.active.saturating_sub(1);
        self.changed.notify_all();
    }

    /// Record that a session has terminated: decrement `active`,
    /// increment `served`, and wake anyone waiting on `active == 0`.
    pub fn record_completion(&self) {
        let mut c = self.counters.lock().expect("conn state mutex poisoned");
        c.active = c.active.saturating_sub(1);
        c.served += 1;
        self.changed.notify_all();
    }

    /// Current `served` count.
    pub fn served(&self) -> u32 {
        self.counters.lock().expect("conn state mutex poisoned").served
    }

    /// Current `active` count.
    pub fn active(&self) -> u32 {
        self.counters.lock().expect("conn state mutex poisoned").active
    }

    /// True once `served >= max_conn`.
    pub fn quota_reached(&self, max_conn: u32) -> bool {
        self.served() >= max_conn
    }

    /// Block until `active == 0`.
    pub fn wait_for_drain(&self) {
        let mut c = self.counters.lock().expect("conn state mutex poisoned");
        while c.active > 0 {
            c = self.changed.wait(c).expect("conn state mutex poisoned");
        }
    }
}
