use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::{
    decode_count, decode_decimal, decode_label, decode_optional_time, decode_time, encode_time,
    SqliteStore,
};
use crate::enrollments::{Enrollment, EnrollmentRepository, EnrollmentStatus, NewEnrollment};
use crate::ids::{CourseId, EnrollmentId, LessonId, UserId};
use crate::storage::RepositoryError;

pub(super) const ENROLLMENT_COLUMNS: &str =
    "id, user_id, course_id, status, progress_percentage, amount_paid, enrolled_at, completed_at";

pub(super) fn enrollment_from_row(row: &SqliteRow) -> Result<Enrollment, RepositoryError> {
    let progress = decode_count(row.try_get("progress_percentage")?)?;
    Ok(Enrollment {
        id: EnrollmentId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        course_id: CourseId(row.try_get("course_id")?),
        status: decode_label(
            row.try_get::<&str, _>("status")?,
            EnrollmentStatus::from_label,
        )?,
        progress_percentage: progress.min(100) as u8,
        amount_paid: decode_decimal(row.try_get::<&str, _>("amount_paid")?)?,
        enrolled_at: decode_time(row.try_get::<&str, _>("enrolled_at")?)?,
        completed_at: decode_optional_time(row.try_get("completed_at")?)?,
    })
}

/// Shared by the settle and refund transactions.
pub(super) async fn enrollment_for_in(
    conn: &mut SqliteConnection,
    user: UserId,
    course: CourseId,
) -> Result<Option<Enrollment>, RepositoryError> {
    let row = sqlx::query(&format!(
        "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = ? AND course_id = ?"
    ))
    .bind(user.0)
    .bind(course.0)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(enrollment_from_row).transpose()
}

pub(super) async fn write_enrollment(
    conn: &mut SqliteConnection,
    enrollment: &Enrollment,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE enrollments SET status = ?, progress_percentage = ?, amount_paid = ?, \
         completed_at = ? WHERE id = ?",
    )
    .bind(enrollment.status.label())
    .bind(i64::from(enrollment.progress_percentage))
    .bind(enrollment.amount_paid.to_string())
    .bind(enrollment.completed_at.map(encode_time))
    .bind(enrollment.id.0)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

pub(super) async fn insert_enrollment_in(
    conn: &mut SqliteConnection,
    enrollment: NewEnrollment,
) -> Result<Enrollment, RepositoryError> {
    let result = sqlx::query(
        "INSERT INTO enrollments (user_id, course_id, status, progress_percentage, amount_paid, enrolled_at) \
         VALUES (?, ?, ?, 0, ?, ?)",
    )
    .bind(enrollment.user_id.0)
    .bind(enrollment.course_id.0)
    .bind(EnrollmentStatus::Enrolled.label())
    .bind(enrollment.amount_paid.to_string())
    .bind(encode_time(enrollment.enrolled_at))
    .execute(&mut *conn)
    .await?;

    Ok(Enrollment {
        id: EnrollmentId(result.last_insert_rowid()),
        user_id: enrollment.user_id,
        course_id: enrollment.course_id,
        status: EnrollmentStatus::Enrolled,
        progress_percentage: 0,
        amount_paid: enrollment.amount_paid,
        enrolled_at: enrollment.enrolled_at,
        completed_at: None,
    })
}

#[async_trait]
impl EnrollmentRepository for SqliteStore {
    async fn insert_enrollment(
        &self,
        enrollment: NewEnrollment,
    ) -> Result<Enrollment, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        insert_enrollment_in(&mut conn, enrollment).await
    }

    async fn enrollment(&self, id: EnrollmentId) -> Result<Option<Enrollment>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(enrollment_from_row).transpose()
    }

    async fn enrollment_for(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        enrollment_for_in(&mut conn, user, course).await
    }

    async fn enrollments_for_user(&self, user: UserId) -> Result<Vec<Enrollment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE user_id = ? ORDER BY id"
        ))
        .bind(user.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn record_lesson_completion(
        &self,
        enrollment: EnrollmentId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO lesson_completions (enrollment_id, lesson_id, completed_at) \
             VALUES (?, ?, ?) ON CONFLICT (enrollment_id, lesson_id) DO NOTHING",
        )
        .bind(enrollment.0)
        .bind(lesson.0)
        .bind(encode_time(at))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn completed_lessons(&self, enrollment: EnrollmentId) -> Result<u32, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM lesson_completions c \
             JOIN lessons l ON l.id = c.lesson_id WHERE c.enrollment_id = ?",
        )
        .bind(enrollment.0)
        .fetch_one(&self.pool)
        .await?;
        decode_count(count)
    }

    async fn update_enrollment(
        &self,
        enrollment: &Enrollment,
        expected: EnrollmentStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE enrollments SET status = ?, progress_percentage = ?, amount_paid = ?, \
             completed_at = ? WHERE id = ? AND status = ?",
        )
        .bind(enrollment.status.label())
        .bind(i64::from(enrollment.progress_percentage))
        .bind(enrollment.amount_paid.to_string())
        .bind(enrollment.completed_at.map(encode_time))
        .bind(enrollment.id.0)
        .bind(expected.label())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::InvalidTransition {
                from: expected.label(),
                to: enrollment.status.label(),
            });
        }
        Ok(())
    }
}
