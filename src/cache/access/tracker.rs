//! Per-object access bookkeeping
//!
//! `AccessTracker` is the lock-free, shared form; `AccessStatus` is the plain
//! copy handed to monitoring collectors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::atomic::AtomicCell;
use serde::{Deserialize, Serialize};

use crate::cache::types::elapsed_since;

/// Lifecycle state of one object root
///
/// `Write` is the initial state. `Removed` and `Expired` are terminal: once
/// set, no further transition is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectState {
    Write,
    Read,
    Modified,
    NotModified,
    Removed,
    Expired,
}

impl ObjectState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, ObjectState::Removed | ObjectState::Expired)
    }
}

/// Read and modification counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessCount {
    pub reads: u64,
    pub modifications: u64,
    /// Writes that stored a value equal to the one already held
    pub unchanged_writes: u64,
}

/// Access timestamps in nanoseconds since the Unix epoch; zero means never
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessTime {
    pub created_ns: u64,
    /// Entry into the current state
    pub start_ns: u64,
    pub modified_ns: u64,
    pub read_ns: u64,
}

/// Point-in-time copy of an object's access bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessStatus {
    pub state: ObjectState,
    pub count: AccessCount,
    pub time: AccessTime,
}

impl AccessStatus {
    pub fn time_since_modified(&self, now_ns: u64) -> Duration {
        elapsed_since(self.time.modified_ns, now_ns)
    }

    /// Time since the last read; an object never read reports time since epoch
    pub fn time_since_read(&self, now_ns: u64) -> Duration {
        elapsed_since(self.time.read_ns, now_ns)
    }

    /// Time since the most recent read or modification
    pub fn time_since_accessed(&self, now_ns: u64) -> Duration {
        elapsed_since(self.time.read_ns.max(self.time.modified_ns), now_ns)
    }

    pub fn is_inactive(&self, timeout: Duration, now_ns: u64) -> bool {
        self.time_since_accessed(now_ns) > timeout
    }
}

/// Lock-free access tracker shared by every reader of an object root
#[derive(Debug)]
pub struct AccessTracker {
    state: AtomicCell<ObjectState>,
    reads: AtomicU64,
    modifications: AtomicU64,
    unchanged_writes: AtomicU64,
    created_ns: u64,
    start_ns: AtomicU64,
    modified_ns: AtomicU64,
    read_ns: AtomicU64,
}

impl AccessTracker {
    /// Tracker for an object created at `now_ns`, in state `Write`
    pub fn new(now_ns: u64) -> Self {
        Self {
            state: AtomicCell::new(ObjectState::Write),
            reads: AtomicU64::new(0),
            modifications: AtomicU64::new(0),
            unchanged_writes: AtomicU64::new(0),
            created_ns: now_ns,
            start_ns: AtomicU64::new(now_ns),
            modified_ns: AtomicU64::new(now_ns),
            read_ns: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn state(&self) -> ObjectState {
        self.state.load()
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    #[inline]
    pub fn created_ns(&self) -> u64 {
        self.created_ns
    }

    #[inline]
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn read_ns(&self) -> u64 {
        self.read_ns.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn modified_ns(&self) -> u64 {
        self.modified_ns.load(Ordering::Relaxed)
    }

    /// Move to `next` unless the current state is terminal
    fn transition(&self, next: ObjectState, now_ns: u64) -> bool {
        let mut current = self.state.load();
        loop {
            if current.is_terminal() {
                return false;
            }
            match self.state.compare_exchange(current, next) {
                Ok(_) => {
                    self.start_ns.store(now_ns, Ordering::Relaxed);
                    return true;
                }
                Err(observed) => current = observed,
            }
        }
    }

    /// Record a read
    pub fn on_read(&self, now_ns: u64) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.read_ns.fetch_max(now_ns, Ordering::Relaxed);
        self.transition(ObjectState::Read, now_ns)
    }

    /// Record a write; `changed` tells whether the stored value differs
    pub fn on_write(&self, changed: bool, now_ns: u64) -> bool {
        if self.is_terminal() {
            return false;
        }
        if changed {
            self.modifications.fetch_add(1, Ordering::Relaxed);
            self.modified_ns.fetch_max(now_ns, Ordering::Relaxed);
            self.transition(ObjectState::Modified, now_ns)
        } else {
            self.unchanged_writes.fetch_add(1, Ordering::Relaxed);
            self.transition(ObjectState::NotModified, now_ns)
        }
    }

    /// Enter the terminal `Removed` state; false if already terminal
    pub fn mark_removed(&self, now_ns: u64) -> bool {
        self.transition(ObjectState::Removed, now_ns)
    }

    /// Enter the terminal `Expired` state; false if already terminal
    pub fn mark_expired(&self, now_ns: u64) -> bool {
        self.transition(ObjectState::Expired, now_ns)
    }

    /// Plain copy for monitoring
    pub fn snapshot(&self) -> AccessStatus {
        AccessStatus {
            state: self.state(),
            count: AccessCount {
                reads: self.reads.load(Ordering::Relaxed),
                modifications: self.modifications.load(Ordering::Relaxed),
                unchanged_writes: self.unchanged_writes.load(Ordering::Relaxed),
            },
            time: AccessTime {
                created_ns: self.created_ns,
                start_ns: self.start_ns.load(Ordering::Relaxed),
                modified_ns: self.modified_ns.load(Ordering::Relaxed),
                read_ns: self.read_ns.load(Ordering::Relaxed),
            },
        }
    }
}
