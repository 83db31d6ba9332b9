use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decode_count, decode_decimal, decode_time, encode_time, SqliteStore};
use crate::catalog::{Course, CourseRepository, Lesson, NewCourse, NewLesson};
use crate::ids::{CourseId, LessonId};
use crate::storage::RepositoryError;

const COURSE_COLUMNS: &str = "id, title, slug, description, price, currency, published, created_at";

fn course_from_row(row: &SqliteRow) -> Result<Course, RepositoryError> {
    Ok(Course {
        id: CourseId(row.try_get("id")?),
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        price: decode_decimal(row.try_get::<&str, _>("price")?)?,
        currency: row.try_get("currency")?,
        published: row.try_get("published")?,
        created_at: decode_time(row.try_get::<&str, _>("created_at")?)?,
    })
}

fn lesson_from_row(row: &SqliteRow) -> Result<Lesson, RepositoryError> {
    Ok(Lesson {
        id: LessonId(row.try_get("id")?),
        course_id: CourseId(row.try_get("course_id")?),
        title: row.try_get("title")?,
        position: decode_count(row.try_get("position")?)?,
    })
}

#[async_trait]
impl CourseRepository for SqliteStore {
    async fn insert_course(&self, course: NewCourse) -> Result<Course, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO courses (title, slug, description, price, currency, published, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&course.title)
        .bind(&course.slug)
        .bind(&course.description)
        .bind(course.price.to_string())
        .bind(&course.currency)
        .bind(course.published)
        .bind(encode_time(course.created_at))
        .execute(&self.pool)
        .await?;

        Ok(Course {
            id: CourseId(result.last_insert_rowid()),
            title: course.title,
            slug: course.slug,
            description: course.description,
            price: course.price,
            currency: course.currency,
            published: course.published,
            created_at: course.created_at,
        })
    }

    async fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(course_from_row).transpose()
    }

    async fn published_courses(&self) -> Result<Vec<Course>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE published = 1 ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(course_from_row).collect()
    }

    async fn insert_lesson(&self, lesson: NewLesson) -> Result<Lesson, RepositoryError> {
        let result = sqlx::query("INSERT INTO lessons (course_id, title, position) VALUES (?, ?, ?)")
            .bind(lesson.course_id.0)
            .bind(&lesson.title)
            .bind(i64::from(lesson.position))
            .execute(&self.pool)
            .await?;

        Ok(Lesson {
            id: LessonId(result.last_insert_rowid()),
            course_id: lesson.course_id,
            title: lesson.title,
            position: lesson.position,
        })
    }

    async fn lesson(&self, id: LessonId) -> Result<Option<Lesson>, RepositoryError> {
        let row = sqlx::query("SELECT id, course_id, title, position FROM lessons WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(lesson_from_row).transpose()
    }

    async fn lessons(&self, course: CourseId) -> Result<Vec<Lesson>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, course_id, title, position FROM lessons \
             WHERE course_id = ? ORDER BY position, id",
        )
        .bind(course.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(lesson_from_row).collect()
    }
}
