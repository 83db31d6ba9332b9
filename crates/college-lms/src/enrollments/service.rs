use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::domain::{progress_percentage, Enrollment, EnrollmentStatus, LessonProgress, NewEnrollment};
use super::repository::EnrollmentRepository;
use crate::catalog::CourseRepository;
use crate::certificates::{CertificateRepository, CertificateService};
use crate::ids::{CourseId, LessonId, UserId};
use crate::notifications::{dispatch_logged, EmailTemplate, Notification, NotificationDispatcher};
use crate::storage::RepositoryError;
use crate::web::UserFacing;

const MAX_PROGRESS_RETRIES: u32 = 3;

/// Direct enrollment, progress tracking and completion hand-off to certificates.
pub struct EnrollmentService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    certificates: CertificateService<S, N>,
}

impl<S, N> EnrollmentService<S, N>
where
    S: EnrollmentRepository + CourseRepository + CertificateRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        let certificates = CertificateService::new(store.clone(), notifier.clone());
        Self {
            store,
            notifier,
            certificates,
        }
    }

    /// Enrolls a user in a zero-price course without a payment.
    pub async fn enroll_free(
        &self,
        user: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, EnrollmentError> {
        let course = self
            .store
            .course(course_id)
            .await?
            .filter(|course| course.published)
            .ok_or(EnrollmentError::UnknownCourse)?;
        if !course.is_free() {
            return Err(EnrollmentError::PaymentRequired);
        }

        let now = Utc::now();
        let enrollment = match self.store.enrollment_for(user, course_id).await? {
            Some(existing) if existing.status.is_active() => {
                return Err(EnrollmentError::AlreadyEnrolled)
            }
            Some(mut dropped) => {
                dropped.status = EnrollmentStatus::Enrolled;
                dropped.apply_progress(dropped.progress_percentage, now);
                self.store
                    .update_enrollment(&dropped, EnrollmentStatus::Dropped)
                    .await
                    .map_err(|err| match err {
                        RepositoryError::InvalidTransition { .. } => {
                            EnrollmentError::AlreadyEnrolled
                        }
                        other => EnrollmentError::Repository(other),
                    })?;
                dropped
            }
            None => self
                .store
                .insert_enrollment(NewEnrollment {
                    user_id: user,
                    course_id,
                    amount_paid: Decimal::ZERO,
                    enrolled_at: now,
                })
                .await
                .map_err(|err| match err {
                    RepositoryError::Conflict(_) => EnrollmentError::AlreadyEnrolled,
                    other => EnrollmentError::Repository(other),
                })?,
        };

        info!(enrollment = %enrollment.id, %user, course = %course_id, "free enrollment");
        dispatch_logged(
            self.notifier.as_ref(),
            Notification::new(EmailTemplate::EnrollmentConfirm, user)
                .with("course", &course.title)
                .with("enrollment_id", enrollment.id),
        );
        Ok(enrollment)
    }

    pub async fn complete_lesson(
        &self,
        user: UserId,
        lesson_id: LessonId,
    ) -> Result<LessonProgress, EnrollmentError> {
        let lesson = self
            .store
            .lesson(lesson_id)
            .await?
            .ok_or(EnrollmentError::UnknownLesson)?;
        let mut enrollment = self.active_enrollment(user, lesson.course_id).await?;

        let now = Utc::now();
        let newly_recorded = self
            .store
            .record_lesson_completion(enrollment.id, lesson_id, now)
            .await?;

        let total = self.store.lessons(lesson.course_id).await?.len() as u32;
        let mut retries = 0;
        let was_completed = loop {
            let completed = self.store.completed_lessons(enrollment.id).await?;
            let read_status = enrollment.status;
            enrollment.apply_progress(progress_percentage(completed, total), now);
            match self.store.update_enrollment(&enrollment, read_status).await {
                Ok(()) => break read_status == EnrollmentStatus::Completed,
                // Another request moved the row since it was read: a drop or
                // refund ends the attempt, a parallel completion is re-applied.
                Err(RepositoryError::InvalidTransition { .. })
                    if retries < MAX_PROGRESS_RETRIES =>
                {
                    retries += 1;
                    enrollment = self.active_enrollment(user, lesson.course_id).await?;
                }
                Err(err) => return Err(err.into()),
            }
        };

        let mut certificate = None;
        if enrollment.status == EnrollmentStatus::Completed {
            if !was_completed {
                info!(enrollment = %enrollment.id, %user, "course completed");
            }
            match self.certificates.issue(enrollment.id).await {
                Ok(issued) => certificate = Some(issued),
                Err(err) => {
                    warn!(enrollment = %enrollment.id, error = %err, "certificate issuance failed")
                }
            }
        }

        Ok(LessonProgress {
            enrollment,
            newly_recorded,
            certificate,
        })
    }

    pub async fn drop_course(
        &self,
        user: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, EnrollmentError> {
        let mut enrollment = self.active_enrollment(user, course_id).await?;
        if enrollment.amount_paid > Decimal::ZERO {
            return Err(EnrollmentError::RefundRequired);
        }
        let read_status = enrollment.status;
        enrollment.status = EnrollmentStatus::Dropped;
        self.store
            .update_enrollment(&enrollment, read_status)
            .await
            .map_err(|err| match err {
                RepositoryError::InvalidTransition { .. } => EnrollmentError::NotEnrolled,
                other => EnrollmentError::Repository(other),
            })?;
        info!(enrollment = %enrollment.id, %user, "enrollment dropped");
        Ok(enrollment)
    }

    async fn active_enrollment(
        &self,
        user: UserId,
        course_id: CourseId,
    ) -> Result<Enrollment, EnrollmentError> {
        self.store
            .enrollment_for(user, course_id)
            .await?
            .filter(|enrollment| enrollment.status.is_active())
            .ok_or(EnrollmentError::NotEnrolled)
    }

    pub async fn enrollments(&self, user: UserId) -> Result<Vec<Enrollment>, EnrollmentError> {
        Ok(self.store.enrollments_for_user(user).await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error("course not found")]
    UnknownCourse,
    #[error("lesson not found")]
    UnknownLesson,
    #[error("this course requires payment before enrollment")]
    PaymentRequired,
    #[error("you are already enrolled in this course")]
    AlreadyEnrolled,
    #[error("you are not enrolled in this course")]
    NotEnrolled,
    #[error("paid enrollments end through a refund from the registrar")]
    RefundRequired,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl UserFacing for EnrollmentError {
    fn is_internal(&self) -> bool {
        matches!(self, EnrollmentError::Repository(err) if err.is_internal())
    }
}
