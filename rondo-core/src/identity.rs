//! Identity types for rondo runs

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Run identifier using UUIDv7 so run ids sort by start time.
pub type RunId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Position of a message in a run's history, assigned at append time.
pub type SequenceNumber = u64;

/// Generate a new UUIDv7 RunId (timestamp-sortable).
pub fn new_run_id() -> RunId {
    Uuid::now_v7()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_v7_and_sortable() {
        let a = new_run_id();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_run_id();
        assert_eq!(a.get_version_num(), 7);
        assert!(a < b);
    }
}
