//! Per-user rolling window of recent message texts.

use std::collections::{HashMap, VecDeque};

/// Bounded FIFO history for every user seen so far.
///
/// Windows are created on first admission and kept for the lifetime of the
/// store. The store has a single owner (the active ingestion phase), so it is
/// handed around by reference rather than shared behind a lock.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: usize,
    windows: HashMap<String, VecDeque<String>>,
}

impl HistoryStore {
    /// Creates an empty store; a capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            windows: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `text` to the user's window, dropping the oldest entry when full.
    pub fn admit(&mut self, user_id: &str, text: impl Into<String>) {
        let capacity = self.capacity;
        let window = self.windows.entry(user_id.to_string()).or_insert_with(|| VecDeque::with_capacity(capacity));

        if window.len() >= capacity {
            window.pop_front();
        }

        window.push_back(text.into());
    }

    /// Copy of the user's window, oldest first; empty for unknown users.
    pub fn snapshot(&self, user_id: &str) -> Vec<String> {
        self.windows.get(user_id).map(|window| window.iter().cloned().collect()).unwrap_or_default()
    }

    /// Number of users with a window.
    pub fn user_count(&self) -> usize {
        self.windows.len()
    }
}

// Tests.
