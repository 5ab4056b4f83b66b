use crate::models::HistoryEntry;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

pub const DEFAULT_HISTORY_CAP: usize = 10;

/// Request history, newest first. Once `cap` is reached the oldest entry is
/// evicted on every insert.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    cap: usize,
}

impl Default for History {
    fn default() -> Self {
        History::with_cap(DEFAULT_HISTORY_CAP)
    }
}

impl History {
    pub fn with_cap(cap: usize) -> Self {
        let cap = cap.max(1);
        History {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    pub fn record(&mut self, name: &str, path: &str, time: DateTime<Utc>) {
        self.entries.push_front(HistoryEntry {
            name: name.to_string(),
            path: path.to_string(),
            time,
        });
        self.entries.truncate(self.cap);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entry `index` positions back from the newest.
    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn keeps_most_recent_entries_newest_first() {
        let mut history = History::default();
        let start = Utc::now();
        for i in 0..25 {
            history.record(&format!("req-{i}"), "/api/ping", start + Duration::seconds(i));
        }

        assert_eq!(history.len(), 10);
        let names: Vec<_> = history.iter().map(|e| e.name.as_str()).collect();
        let expected: Vec<String> = (15..25).rev().map(|i| format!("req-{i}")).collect();
        assert_eq!(names, expected);
        assert!(history.iter().zip(history.iter().skip(1)).all(|(a, b)| a.time > b.time));
    }

    #[test]
    fn zero_cap_still_keeps_latest() {
        let mut history = History::with_cap(0);
        history.record("a", "/a", Utc::now());
        history.record("b", "/b", Utc::now());
        assert_eq!(history.len(), 1);
        assert_eq!(history.get(0).map(|e| e.name.as_str()), Some("b"));
    }
}
