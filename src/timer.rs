//! Clocks and one-shot timers for the cooperative event loop.
//!
//! Nothing here spawns a thread: the host asks the session for its next deadline
//! and calls `Session::poll_timers()` once it has passed.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time, in milliseconds since the unix epoch.
pub trait Clock: fmt::Debug {
    fn now_millis(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    millis: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(now_millis: u64) -> Self {
        Self {
            millis: Rc::new(Cell::new(now_millis)),
        }
    }

    pub fn at_secs(now_secs: u64) -> Self {
        Self::new(now_secs * 1000)
    }

    pub fn advance_millis(&self, millis: u64) {
        self.millis.set(self.millis.get().saturating_add(millis));
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance_millis(secs.saturating_mul(1000));
    }

    pub fn set_millis(&self, millis: u64) {
        self.millis.set(millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.get()
    }
}

/// Handle of a scheduled timer, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Entry<A> {
    id: TimerId,
    deadline: u64,
    action: A,
}

/// One-shot timers keyed by deadline. Each timer fires at most once.
#[derive(Debug)]
pub struct TimerQueue<A> {
    next_id: u64,
    entries: Vec<Entry<A>>,
}

impl<A> TimerQueue<A> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn schedule_at(&mut self, deadline_millis: u64, action: A) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);

        self.entries.push(Entry {
            id,
            deadline: deadline_millis,
            action,
        });

        id
    }

    /// Returns the action of a timer that had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<A> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index).action)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<u64> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.deadline)
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Removes and returns every timer due at `now_millis`, earliest first.
    pub fn take_due(&mut self, now_millis: u64) -> Vec<(TimerId, A)> {
        let mut due = Vec::new();
        let mut i = 0;

        while i < self.entries.len() {
            if self.entries[i].deadline <= now_millis {
                due.push(self.entries.remove(i));
            } else {
                i += 1;
            }
        }

        due.sort_by_key(|e| (e.deadline, e.id.0));
        due.into_iter().map(|e| (e.id, e.action)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}
