use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::certificates::Certificate;
use crate::ids::{CourseId, EnrollmentId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolled,
    InProgress,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "enrolled",
            EnrollmentStatus::InProgress => "in_progress",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "enrolled" => Some(EnrollmentStatus::Enrolled),
            "in_progress" => Some(EnrollmentStatus::InProgress),
            "completed" => Some(EnrollmentStatus::Completed),
            "dropped" => Some(EnrollmentStatus::Dropped),
            _ => None,
        }
    }

    pub const fn is_active(self) -> bool {
        !matches!(self, EnrollmentStatus::Dropped)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub progress_percentage: u8,
    pub amount_paid: Decimal,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    /// Applies a freshly computed progress value, advancing the status.
    pub fn apply_progress(&mut self, progress: u8, at: DateTime<Utc>) {
        self.progress_percentage = progress.min(100);
        if self.status == EnrollmentStatus::Completed || !self.status.is_active() {
            return;
        }
        if self.progress_percentage >= 100 {
            self.status = EnrollmentStatus::Completed;
            self.completed_at = Some(at);
        } else if self.progress_percentage > 0 {
            self.status = EnrollmentStatus::InProgress;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub amount_paid: Decimal,
    pub enrolled_at: DateTime<Utc>,
}

/// Completed lessons over total lessons, floored to a whole percent.
pub fn progress_percentage(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u64::from(completed.min(total)) * 100) / u64::from(total);
    pct as u8
}

/// Result of marking a lesson complete.
#[derive(Debug, Clone, Serialize)]
pub struct LessonProgress {
    pub enrollment: Enrollment,
    pub newly_recorded: bool,
    pub certificate: Option<Certificate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment() -> Enrollment {
        Enrollment {
            id: EnrollmentId(1),
            user_id: UserId(1),
            course_id: CourseId(1),
            status: EnrollmentStatus::Enrolled,
            progress_percentage: 0,
            amount_paid: Decimal::ZERO,
            enrolled_at: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn progress_is_floored_and_bounded() {
        assert_eq!(progress_percentage(1, 3), 33);
        assert_eq!(progress_percentage(2, 3), 66);
        assert_eq!(progress_percentage(3, 3), 100);
        assert_eq!(progress_percentage(5, 3), 100);
        assert_eq!(progress_percentage(0, 0), 0);
    }

    #[test]
    fn apply_progress_advances_status() {
        let mut record = enrollment();
        record.apply_progress(40, Utc::now());
        assert_eq!(record.status, EnrollmentStatus::InProgress);
        assert!(record.completed_at.is_none());

        record.apply_progress(100, Utc::now());
        assert_eq!(record.status, EnrollmentStatus::Completed);
        assert!(record.completed_at.is_some());
    }

    #[test]
    fn dropped_enrollments_keep_their_status() {
        let mut record = enrollment();
        record.status = EnrollmentStatus::Dropped;
        record.apply_progress(100, Utc::now());
        assert_eq!(record.status, EnrollmentStatus::Dropped);
    }

    #[test]
    fn labels_round_trip() {
        for status in [
            EnrollmentStatus::Enrolled,
            EnrollmentStatus::InProgress,
            EnrollmentStatus::Completed,
            EnrollmentStatus::Dropped,
        ] {
            assert_eq!(EnrollmentStatus::from_label(status.label()), Some(status));
        }
    }
}
