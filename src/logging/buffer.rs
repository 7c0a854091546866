//! In-memory log history
//!
//! Provides a thread-safe ring buffer that keeps the most recent formatted lines
//! for in-process inspection.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Number of lines retained by the sink's history
pub const HISTORY_CAPACITY: usize = 50;

/// Retained lines together with the switch that admits new ones
#[derive(Debug)]
struct BufferState {
    entries: VecDeque<String>,
    enabled: bool,
}

/// Thread-safe ring buffer for storing formatted log lines
///
/// Storage can be switched off. The switch lives under the same lock as the lines,
/// so once `set_enabled(false)` returns no push can land in the buffer.
#[derive(Debug)]
pub struct LogBuffer {
    state: Mutex<BufferState>,
    /// Maximum lines to keep
    max_entries: usize,
}

impl LogBuffer {
    /// Create a new, enabled log buffer with the given capacity
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(BufferState {
                entries: VecDeque::with_capacity(max_entries),
                enabled: true,
            }),
            max_entries,
        }
    }

    /// Push a line, evicting the oldest once the capacity is exceeded.
    ///
    /// Dropped while storage is disabled.
    pub fn push(&self, line: String) {
        if let Ok(mut state) = self.state.lock() {
            if !state.enabled {
                return;
            }
            state.entries.push_back(line);
            while state.entries.len() > self.max_entries {
                state.entries.pop_front();
            }
        }
    }

    /// Turn storage on or off. Turning it off drops every retained line.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.enabled = enabled;
        if !enabled {
            state.entries.clear();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().map(|s| s.enabled).unwrap_or(false)
    }

    /// Get all retained lines, oldest first
    pub fn all_entries(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Get the number of retained lines
    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every retained line
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.entries.clear();
        }
    }

    /// Maximum number of lines this buffer keeps
    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}
