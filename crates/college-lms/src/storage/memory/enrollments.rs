use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryStore;
use crate::enrollments::{Enrollment, EnrollmentRepository, EnrollmentStatus, NewEnrollment};
use crate::ids::{CourseId, EnrollmentId, LessonId, UserId};
use crate::storage::RepositoryError;

#[async_trait]
impl EnrollmentRepository for MemoryStore {
    async fn insert_enrollment(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, RepositoryError> {
        let mut tables = self.lock()?;
        if tables
            .enrollment_for_mut(enrollment.user_id, enrollment.course_id)
            .is_some()
        {
            return Err(RepositoryError::Conflict(format!(
                "enrollments (user {}, course {})",
                enrollment.user_id, enrollment.course_id
            )));
        }
        let id = EnrollmentId(tables.next_id("enrollments"));
        let record = Enrollment {
            id,
            user_id: enrollment.user_id,
            course_id: enrollment.course_id,
            status: EnrollmentStatus::Enrolled,
            progress_percentage: 0,
            amount_paid: enrollment.amount_paid,
            enrolled_at: enrollment.enrolled_at,
            completed_at: None,
        };
        tables.enrollments.insert(id, record.clone());
        Ok(record)
    }

    async fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self.lock()?.enrollments.get(&id).cloned())
    }

    async fn enrollment_for(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self.lock()?.enrollment_for_mut(user, course).map(|e| e.clone()))
    }

    async fn enrollments_for_user(&self, user: UserId) -> Result<Vec<Enrollment>, RepositoryError> {
        Ok(self
            .lock()?
            .enrollments
            .values()
            .filter(|enrollment| enrollment.user_id == user)
            .cloned()
            .collect())
    }

    async fn record_lesson_completion(
        &self,
        enrollment: EnrollmentId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.enrollments.contains_key(&enrollment) {
            return Err(RepositoryError::NotFound);
        }
        let key = (enrollment, lesson);
        if tables.lesson_completions.contains_key(&key) {
            return Ok(false);
        }
        tables.lesson_completions.insert(key, at);
        Ok(true)
    }

    async fn completed_lessons(&self, enrollment: EnrollmentId) -> Result<u32, RepositoryError> {
        let tables = self.lock()?;
        let count = tables
            .lesson_completions
            .keys()
            .filter(|(owner, lesson)| {
                *owner == enrollment && tables.lessons.contains_key(lesson)
            })
            .count();
        Ok(count as u32)
    }

    async fn update_enrollment(
        &self,
        enrollment: &Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables
            .enrollments
            .get_mut(&enrollment.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.status != expected {
            return Err(RepositoryError::InvalidTransition {
                from: stored.status.label(),
                to: enrollment.status.label(),
            });
        }
        stored.status = enrollment.status;
        stored.progress_percentage = enrollment.progress_percentage;
        stored.amount_paid = enrollment.amount_paid;
        stored.completed_at = enrollment.completed_at;
        Ok(())
    }
}
