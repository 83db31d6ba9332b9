use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    Assignment, AssignmentDraft, NewAssignment, NewSubmission, Submission, SubmissionStatus,
};
use super::repository::AssignmentRepository;
use crate::catalog::CourseRepository;
use crate::enrollments::EnrollmentRepository;
use crate::ids::{AssignmentId, CourseId, SubmissionId, UserId};
use crate::storage::RepositoryError;
use crate::web::UserFacing;

const MAX_CONTENT_LEN: usize = 20_000;
const MAX_FEEDBACK_LEN: usize = 2_000;

pub struct AssignmentService<S> {
    store: Arc<S>,
}

impl<S> AssignmentService<S>
where
    S: AssignmentRepository + CourseRepository + EnrollmentRepository + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create_assignment(
        &self,
        course_id: CourseId,
        draft: AssignmentDraft,
    ) -> Result<Assignment, AssignmentError> {
        self.store
            .course(course_id)
            .await?
            .ok_or(AssignmentError::UnknownCourse)?;
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(AssignmentError::Invalid("title is required"));
        }
        if draft.max_points == 0 {
            return Err(AssignmentError::Invalid("max points must be positive"));
        }

        let assignment = self
            .store
            .insert_assignment(NewAssignment {
                course_id,
                title,
                max_points: draft.max_points,
                due_at: draft.due_at,
            })
            .await?;
        info!(assignment = %assignment.id, course = %course_id, "assignment created");
        Ok(assignment)
    }

    pub async fn submit(
        &self,
        user: UserId,
        assignment_id: AssignmentId,
        content: &str,
    ) -> Result<Submission, AssignmentError> {
        let assignment = self
            .store
            .assignment(assignment_id)
            .await?
            .ok_or(AssignmentError::UnknownAssignment)?;
        self.store
            .enrollment_for(user, assignment.course_id)
            .await?
            .filter(|enrollment| enrollment.status.is_active())
            .ok_or(AssignmentError::NotEnrolled)?;

        let content = content.trim();
        if content.is_empty() {
            return Err(AssignmentError::Invalid("the submission is empty"));
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(AssignmentError::Invalid("the submission is too long"));
        }

        let now = Utc::now();
        let submission = self
            .store
            .insert_submission(NewSubmission {
                assignment_id,
                user_id: user,
                content: content.to_string(),
                submitted_at: now,
                late: assignment.is_late(now),
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => AssignmentError::AlreadySubmitted,
                other => AssignmentError::Repository(other),
            })?;

        info!(
            submission = %submission.id,
            assignment = %assignment_id,
            %user,
            late = submission.late,
            "assignment submitted"
        );
        Ok(submission)
    }

    pub async fn grade(
        &self,
        submission_id: SubmissionId,
        score: u32,
        feedback: Option<String>,
    ) -> Result<Submission, AssignmentError> {
        let mut submission = self
            .store
            .submission(submission_id)
            .await?
            .ok_or(AssignmentError::UnknownSubmission)?;
        let assignment = self
            .store
            .assignment(submission.assignment_id)
            .await?
            .ok_or(AssignmentError::UnknownAssignment)?;
        if score > assignment.max_points {
            return Err(AssignmentError::ScoreExceedsMaximum(assignment.max_points));
        }
        let feedback = feedback
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());
        if feedback.as_ref().is_some_and(|text| text.len() > MAX_FEEDBACK_LEN) {
            return Err(AssignmentError::Invalid("feedback is too long"));
        }

        submission.score = Some(score);
        submission.feedback = feedback;
        submission.status = SubmissionStatus::Graded;
        self.store.update_submission(&submission).await?;
        info!(submission = %submission_id, score, "submission graded");
        Ok(submission)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    #[error("course not found")]
    UnknownCourse,
    #[error("assignment not found")]
    UnknownAssignment,
    #[error("submission not found")]
    UnknownSubmission,
    #[error("{0}")]
    Invalid(&'static str),
    #[error("you must be enrolled in the course to submit")]
    NotEnrolled,
    #[error("you have already submitted this assignment")]
    AlreadySubmitted,
    #[error("score cannot exceed {0}")]
    ScoreExceedsMaximum(u32),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl UserFacing for AssignmentError {
    fn is_internal(&self) -> bool {
        matches!(self, AssignmentError::Repository(err) if err.is_internal())
    }
}
