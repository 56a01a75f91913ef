//! Pure per-file stability state, kept separate from the event/poll plumbing
//! so the transition rules are unit-testable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Size/mtime snapshot taken at one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSnapshot {
    pub len: u64,
    pub mtime: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Seen once; waiting for an unchanged second observation.
    Seen(FileSnapshot),
    /// Enqueued this session; not enqueued again while it stays present.
    Enqueued,
}

/// Tracks candidate files across polls.
///
/// A file transitions unseen → stable → enqueued: [`observe`] returns `true`
/// exactly when two successive snapshots match for a file not yet enqueued
/// this session (guarding against files still being written). A path that
/// disappears (moved out by a worker) is forgotten, so an operator re-drop of
/// the same name starts the cycle over.
///
/// [`observe`]: StabilityTracker::observe
#[derive(Debug, Default)]
pub struct StabilityTracker {
    files: HashMap<PathBuf, State>,
}

impl StabilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a poll observation; returns whether the file is now stable and
    /// due for enqueueing.
    pub fn observe(&mut self, path: &Path, snapshot: FileSnapshot) -> bool {
        match self.files.get(path) {
            Some(State::Enqueued) => false,
            Some(State::Seen(prev)) if *prev == snapshot => true,
            _ => {
                self.files.insert(path.to_path_buf(), State::Seen(snapshot));
                false
            }
        }
    }

    /// Mark a file enqueued for this session.
    pub fn mark_enqueued(&mut self, path: &Path) {
        self.files.insert(path.to_path_buf(), State::Enqueued);
    }

    /// Forget a path that no longer exists in the drop directory.
    pub fn forget(&mut self, path: &Path) {
        self.files.remove(path);
    }

    /// Candidate paths currently tracked (for the poll pass).
    pub fn tracked(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn snap(len: u64, secs: u64) -> FileSnapshot {
        FileSnapshot {
            len,
            mtime: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    #[test]
    fn test_stable_after_two_identical_polls() {
        let mut tracker = StabilityTracker::new();
        let path = Path::new("raw/AAPL.csv");

        assert!(!tracker.observe(path, snap(100, 1)));
        assert!(tracker.observe(path, snap(100, 1)));
    }

    #[test]
    fn test_growing_file_never_stable() {
        let mut tracker = StabilityTracker::new();
        let path = Path::new("raw/AAPL.csv");

        assert!(!tracker.observe(path, snap(100, 1)));
        assert!(!tracker.observe(path, snap(200, 2)));
        assert!(!tracker.observe(path, snap(300, 3)));
        // Writes stopped; stable on the next matching poll.
        assert!(tracker.observe(path, snap(300, 3)));
    }

    #[test]
    fn test_enqueued_file_not_reported_again() {
        let mut tracker = StabilityTracker::new();
        let path = Path::new("raw/AAPL.csv");

        tracker.observe(path, snap(100, 1));
        assert!(tracker.observe(path, snap(100, 1)));
        tracker.mark_enqueued(path);

        assert!(!tracker.observe(path, snap(100, 1)));
        // Even a touched file stays suppressed while present this session.
        assert!(!tracker.observe(path, snap(100, 9)));
    }

    #[test]
    fn test_redrop_after_forget_starts_over() {
        let mut tracker = StabilityTracker::new();
        let path = Path::new("raw/AAPL.csv");

        tracker.observe(path, snap(100, 1));
        tracker.observe(path, snap(100, 1));
        tracker.mark_enqueued(path);
        tracker.forget(path);

        assert!(!tracker.is_tracked(path));
        assert!(!tracker.observe(path, snap(120, 5)));
        assert!(tracker.observe(path, snap(120, 5)));
    }
}
