//! Persistent toast board with relative-time labels.

use std::time::{Duration, Instant};

use crate::notifier::Alert;

/// A toast stays until dismissed; only its age label changes.
#[derive(Debug, Clone)]
pub struct Toast {
    pub id: u64,
    pub alert: Alert,
    pub created: Instant,
    pub label: String,
}

/// Human label for the age of a toast.
pub fn relative_time(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        return "just now".to_string();
    }
    let minutes = secs / 60;
    if minutes < 60 {
        return format!("{minutes} min ago");
    }
    let hours = minutes / 60;
    if hours < 24 {
        return format!("{hours} h ago");
    }
    "over 1 day".to_string()
}

#[derive(Debug, Default)]
pub struct ToastBoard {
    /// Newest first.
    toasts: Vec<Toast>,
    next_id: u64,
}

impl ToastBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a toast and return its id.
    pub fn push(&mut self, alert: Alert) -> u64 {
        self.push_at(alert, Instant::now())
    }

    pub fn push_at(&mut self, alert: Alert, created: Instant) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.toasts.insert(
            0,
            Toast {
                id,
                alert,
                created,
                label: relative_time(Duration::ZERO),
            },
        );
        id
    }

    /// Remove a toast by id. Returns whether it existed.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.toasts.len();
        self.toasts.retain(|t| t.id != id);
        self.toasts.len() != before
    }

    pub fn clear(&mut self) {
        self.toasts.clear();
    }

    /// Recompute every age label against `now`. Returns whether any label changed.
    pub fn refresh(&mut self, now: Instant) -> bool {
        let mut changed = false;
        for toast in &mut self.toasts {
            let label = relative_time(now.saturating_duration_since(toast.created));
            if label != toast.label {
                toast.label = label;
                changed = true;
            }
        }
        changed
    }

    pub fn toasts(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.toasts.first()
    }

    pub fn get(&self, id: u64) -> Option<&Toast> {
        self.toasts.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::{conflict_alert, test_alert};

    #[test]
    fn relative_time_buckets() {
        assert_eq!(relative_time(Duration::from_secs(0)), "just now");
        assert_eq!(relative_time(Duration::from_secs(59)), "just now");
        assert_eq!(relative_time(Duration::from_secs(60)), "1 min ago");
        assert_eq!(relative_time(Duration::from_secs(59 * 60 + 59)), "59 min ago");
        assert_eq!(relative_time(Duration::from_secs(3600)), "1 h ago");
        assert_eq!(relative_time(Duration::from_secs(23 * 3600 + 3599)), "23 h ago");
        assert_eq!(relative_time(Duration::from_secs(24 * 3600)), "over 1 day");
    }

    #[test]
    fn newest_first_and_unique_ids() {
        let mut board = ToastBoard::new();
        let a = board.push(test_alert());
        let b = board.push(conflict_alert("busy"));
        assert_ne!(a, b);
        assert_eq!(board.latest().unwrap().id, b);
        assert_eq!(board.toasts()[1].id, a);
    }

    #[test]
    fn dismiss_by_id() {
        let mut board = ToastBoard::new();
        let a = board.push(test_alert());
        assert!(!board.dismiss(a + 100));
        assert!(board.dismiss(a));
        assert!(board.is_empty());
    }

    #[test]
    fn get_by_id() {
        let mut board = ToastBoard::new();
        let a = board.push(test_alert());
        let b = board.push(conflict_alert("taken"));
        assert_eq!(board.get(a).unwrap().alert.title, "Test notification");
        assert_eq!(board.get(b).unwrap().alert.title, "Connection refused");
        assert!(board.get(b + 1).is_none());
    }

    #[test]
    fn refresh_updates_labels() {
        let mut board = ToastBoard::new();
        let start = Instant::now();
        board.push_at(test_alert(), start);
        assert!(!board.refresh(start + Duration::from_secs(30)));
        assert!(board.refresh(start + Duration::from_secs(125)));
        assert_eq!(board.toasts()[0].label, "2 min ago");
    }
}
