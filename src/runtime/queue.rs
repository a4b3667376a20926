//! Time-ordered queue of deferred actions.
//!
//! Entries are ordered by due time, and entries due at the same instant keep
//! the order they were posted in. Each entry is removed before it runs and is
//! never touched again; rescheduling means posting a new entry.

use crate::time::Timestamp;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

/// A zero-argument callback scheduled on the runloop.
pub(crate) type Action = Box<dyn FnOnce()>;

/// Identifies one posted entry; increases with every post.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

impl EntryId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

pub(crate) struct Entry {
    pub(crate) due: Timestamp,
    pub(crate) id: EntryId,
    pub(crate) action: Action,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.id == other.id
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the max-heap yields the earliest (due, id) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// The pending set of a runloop.
pub(crate) struct EventQueue {
    entries: BinaryHeap<Entry>,
    next_id: u64,
}

impl EventQueue {
    pub(crate) fn new() -> Self {
        Self {
            entries: BinaryHeap::new(),
            next_id: 0,
        }
    }

    /// Inserts an action due at `due`, after every entry already due at or before it.
    pub(crate) fn push(&mut self, due: Timestamp, action: Action) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;

        self.entries.push(Entry { due, id, action });

        id
    }

    /// Due time of the earliest entry.
    pub(crate) fn next_due(&self) -> Option<Timestamp> {
        self.entries.peek().map(|entry| entry.due)
    }

    /// Removes the earliest entry if it is due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Timestamp) -> Option<Entry> {
        if self.next_due()? > now {
            return None;
        }

        self.entries.pop()
    }

    /// Removes every entry without running it.
    pub(crate) fn drain(&mut self) -> Vec<Entry> {
        std::mem::take(&mut self.entries).into_vec()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
