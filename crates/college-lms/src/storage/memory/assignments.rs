use async_trait::async_trait;

use super::MemoryStore;
use crate::assignments::{
    Assignment, AssignmentRepository, NewAssignment, NewSubmission, Submission, SubmissionStatus,
};
use crate::ids::{AssignmentId, SubmissionId};
use crate::storage::RepositoryError;

#[async_trait]
impl AssignmentRepository for MemoryStore {
    async fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<Assignment, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.courses.contains_key(&assignment.course_id) {
            return Err(RepositoryError::NotFound);
        }
        let id = AssignmentId(tables.next_id("assignments"));
        let record = Assignment {
            id,
            course_id: assignment.course_id,
            title: assignment.title,
            max_points: assignment.max_points,
            due_at: assignment.due_at,
        };
        tables.assignments.insert(id, record.clone());
        Ok(record)
    }

    async fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, RepositoryError> {
        Ok(self.lock()?.assignments.get(&id).cloned())
    }

    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, RepositoryError> {
        let mut tables = self.lock()?;
        let duplicate = tables.submissions.values().any(|existing| {
            existing.assignment_id == submission.assignment_id
                && existing.user_id == submission.user_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "submissions (assignment {}, user {})",
                submission.assignment_id, submission.user_id
            )));
        }
        let id = SubmissionId(tables.next_id("submissions"));
        let record = Submission {
            id,
            assignment_id: submission.assignment_id,
            user_id: submission.user_id,
            content: submission.content,
            submitted_at: submission.submitted_at,
            late: submission.late,
            status: SubmissionStatus::Submitted,
            score: None,
            feedback: None,
        };
        tables.submissions.insert(id, record.clone());
        Ok(record)
    }

    async fn submission(&self, id: SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        Ok(self.lock()?.submissions.get(&id).cloned())
    }

    async fn update_submission(&self, submission: &Submission) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables
            .submissions
            .get_mut(&submission.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.status = submission.status;
        stored.score = submission.score;
        stored.feedback = submission.feedback.clone();
        Ok(())
    }
}
