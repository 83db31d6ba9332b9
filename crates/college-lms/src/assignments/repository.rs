use async_trait::async_trait;

use super::domain::{Assignment, NewAssignment, NewSubmission, Submission};
use crate::ids::{AssignmentId, SubmissionId};
use crate::storage::RepositoryError;

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<Assignment, RepositoryError>;
    async fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, RepositoryError>;
    /// Fails with `Conflict` when the user already submitted this assignment.
    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, RepositoryError>;
    async fn submission(&self, id: SubmissionId) -> Result<Option<Submission>, RepositoryError>;
    /// Persists status, score and feedback.
    async fn update_submission(&self, submission: &Submission) -> Result<(), RepositoryError>;
}
