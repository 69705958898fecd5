//! Cut operation and cut state values

use std::time::Duration;

use tokio::time::Instant;

/// Age after which an armed cut is considered abandoned
pub const STALE_AFTER: Duration = Duration::from_secs(300);

/// A pending move armed by a cut gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutOperation {
    created_at: Instant,
    file_count: Option<i64>,
}

impl CutOperation {
    /// Create an operation stamped with the current time
    pub fn new(file_count: Option<i64>) -> Self {
        Self::created_at(Instant::now(), file_count)
    }

    /// Create an operation with an explicit timestamp
    pub fn created_at(created_at: Instant, file_count: Option<i64>) -> Self {
        Self {
            created_at,
            file_count,
        }
    }

    pub fn timestamp(&self) -> Instant {
        self.created_at
    }

    /// Number of selected files, if the caller knew it
    pub fn file_count(&self) -> Option<i64> {
        self.file_count
    }

    /// Age of the operation measured at `now`
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn age(&self) -> Duration {
        self.age_at(Instant::now())
    }

    /// Whether the operation is younger than the stale window at `now`
    pub fn is_recent_at(&self, now: Instant) -> bool {
        self.age_at(now) < STALE_AFTER
    }

    #[cfg(test)]
    pub fn is_recent(&self) -> bool {
        self.is_recent_at(Instant::now())
    }
}

/// Cut mode: either nothing is armed or exactly one operation is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutState {
    #[default]
    Inactive,
    Active(CutOperation),
}

impl CutState {
    pub fn is_active(&self) -> bool {
        matches!(self, CutState::Active(_))
    }

    /// The armed operation, if any
    pub fn operation(&self) -> Option<&CutOperation> {
        match self {
            CutState::Active(operation) => Some(operation),
            CutState::Inactive => None,
        }
    }
}

impl std::fmt::Display for CutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CutState::Inactive => write!(f, "Inactive"),
            CutState::Active(_) => write!(f, "Active"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_operation_is_recent() {
        let operation = CutOperation::new(None);
        assert!(operation.is_recent());
    }

    #[test]
    fn test_is_recent_boundary() {
        let start = Instant::now();
        let operation = CutOperation::created_at(start, Some(3));

        assert!(operation.is_recent_at(start + Duration::from_secs(299)));
        assert!(!operation.is_recent_at(start + Duration::from_secs(300)));
        assert!(!operation.is_recent_at(start + Duration::from_secs(301)));
    }

    #[test]
    fn test_age_never_negative() {
        let start = Instant::now();
        let operation = CutOperation::created_at(start + Duration::from_secs(5), None);
        assert_eq!(operation.age_at(start), Duration::ZERO);
    }

    #[test]
    fn test_equality_uses_file_count() {
        let now = Instant::now();
        let a = CutOperation::created_at(now, Some(1));
        let b = CutOperation::created_at(now, Some(1));
        let c = CutOperation::created_at(now, Some(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_state_accessors() {
        let inactive = CutState::default();
        assert!(!inactive.is_active());
        assert!(inactive.operation().is_none());

        let active = CutState::Active(CutOperation::new(Some(7)));
        assert!(active.is_active());
        assert_eq!(active.operation().and_then(|op| op.file_count()), Some(7));
    }
}
