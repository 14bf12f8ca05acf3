use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Receives named diagnostic sections (`Request Headers`, `Page`, `Redirecting to`, ...).
pub trait DebugSink {
    fn section(&mut self, name: &str, value: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl DebugSink for NoopSink {
    fn section(&mut self, _name: &str, _value: &str) {}
}

/// Bounded in-memory sink. Clones share one buffer, so a test can keep a handle while
/// the browser owns another.
#[derive(Debug, Clone)]
pub struct RecordingSink {
    entries: Rc<RefCell<VecDeque<(String, String)>>>,
    limit: usize,
}

impl RecordingSink {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Rc::new(RefCell::new(VecDeque::new())),
            limit: limit.max(1),
        }
    }

    /// Drains and returns the recorded sections, oldest first.
    pub fn take(&self) -> Vec<(String, String)> {
        self.entries.borrow_mut().drain(..).collect()
    }

    pub fn sections(&self, name: &str) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|(section, _)| section == name)
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl DebugSink for RecordingSink {
    fn section(&mut self, name: &str, value: &str) {
        let mut entries = self.entries.borrow_mut();
        while entries.len() >= self.limit {
            entries.pop_front();
        }
        entries.push_back((name.to_string(), value.to_string()));
    }
}
