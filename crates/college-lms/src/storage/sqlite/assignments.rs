use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decode_count, decode_label, decode_optional_time, decode_time, encode_time, SqliteStore};
use crate::assignments::{
    Assignment, AssignmentRepository, NewAssignment, NewSubmission, Submission, SubmissionStatus,
};
use crate::ids::{AssignmentId, CourseId, SubmissionId, UserId};
use crate::storage::RepositoryError;

const SUBMISSION_COLUMNS: &str =
    "id, assignment_id, user_id, content, submitted_at, late, status, score, feedback";

fn assignment_from_row(row: &SqliteRow) -> Result<Assignment, RepositoryError> {
    Ok(Assignment {
        id: AssignmentId(row.try_get("id")?),
        course_id: CourseId(row.try_get("course_id")?),
        title: row.try_get("title")?,
        max_points: decode_count(row.try_get("max_points")?)?,
        due_at: decode_optional_time(row.try_get("due_at")?)?,
    })
}

fn submission_from_row(row: &SqliteRow) -> Result<Submission, RepositoryError> {
    Ok(Submission {
        id: SubmissionId(row.try_get("id")?),
        assignment_id: AssignmentId(row.try_get("assignment_id")?),
        user_id: UserId(row.try_get("user_id")?),
        content: row.try_get("content")?,
        submitted_at: decode_time(row.try_get::<&str, _>("submitted_at")?)?,
        late: row.try_get("late")?,
        status: decode_label(
            row.try_get::<&str, _>("status")?,
            SubmissionStatus::from_label,
        )?,
        score: row
            .try_get::<Option<i64>, _>("score")?
            .map(decode_count)
            .transpose()?,
        feedback: row.try_get("feedback")?,
    })
}

#[async_trait]
impl AssignmentRepository for SqliteStore {
    async fn insert_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<Assignment, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO assignments (course_id, title, max_points, due_at) VALUES (?, ?, ?, ?)",
        )
        .bind(assignment.course_id.0)
        .bind(&assignment.title)
        .bind(i64::from(assignment.max_points))
        .bind(assignment.due_at.map(encode_time))
        .execute(&self.pool)
        .await?;

        Ok(Assignment {
            id: AssignmentId(result.last_insert_rowid()),
            course_id: assignment.course_id,
            title: assignment.title,
            max_points: assignment.max_points,
            due_at: assignment.due_at,
        })
    }

    async fn assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, course_id, title, max_points, due_at FROM assignments WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(assignment_from_row).transpose()
    }

    async fn insert_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO submissions (assignment_id, user_id, content, submitted_at, late, status) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(submission.assignment_id.0)
        .bind(submission.user_id.0)
        .bind(&submission.content)
        .bind(encode_time(submission.submitted_at))
        .bind(submission.late)
        .bind(SubmissionStatus::Submitted.label())
        .execute(&self.pool)
        .await?;

        Ok(Submission {
            id: SubmissionId(result.last_insert_rowid()),
            assignment_id: submission.assignment_id,
            user_id: submission.user_id,
            content: submission.content,
            submitted_at: submission.submitted_at,
            late: submission.late,
            status: SubmissionStatus::Submitted,
            score: None,
            feedback: None,
        })
    }

    async fn submission(&self, id: SubmissionId) -> Result<Option<Submission>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(submission_from_row).transpose()
    }

    async fn update_submission(&self, submission: &Submission) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE submissions SET status = ?, score = ?, feedback = ? WHERE id = ?")
                .bind(submission.status.label())
                .bind(submission.score.map(i64::from))
                .bind(submission.feedback.as_deref())
                .bind(submission.id.0)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
