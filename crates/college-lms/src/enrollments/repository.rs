use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{Enrollment, EnrollmentStatus, NewEnrollment};
use crate::ids::{CourseId, EnrollmentId, LessonId, UserId};
use crate::storage::RepositoryError;

#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Fails with `Conflict` when the (user, course) pair already exists.
    async fn insert_enrollment(&self, enrollment: NewEnrollment)
        -> Result<Enrollment, RepositoryError>;
    async fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError>;
    async fn enrollment_for(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError>;
    async fn enrollments_for_user(&self, user: UserId) -> Result<Vec<Enrollment>, RepositoryError>;
    /// Returns `false` when the lesson was already recorded for the enrollment.
    async fn record_lesson_completion(
        &self,
        enrollment: EnrollmentId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    async fn completed_lessons(&self, enrollment: EnrollmentId) -> Result<u32, RepositoryError>;
    /// Persists status, progress, completion time and amount paid when the
    /// stored status still equals `expected`; fails with `InvalidTransition`
    /// otherwise.
    async fn update_enrollment(
        &self,
        enrollment: &Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<(), RepositoryError>;
}
