use async_trait::async_trait;

use super::domain::{Course, Lesson, NewCourse, NewLesson};
use crate::ids::{CourseId, LessonId};
use crate::storage::RepositoryError;

#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Fails with `Conflict` when the slug is taken.
    async fn insert_course(&self, course: NewCourse) -> Result<Course, RepositoryError>;
    async fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError>;
    async fn published_courses(&self) -> Result<Vec<Course>, RepositoryError>;
    async fn insert_lesson(&self, lesson: NewLesson) -> Result<Lesson, RepositoryError>;
    async fn lesson(&self, id: LessonId) -> Result<Option<Lesson>, RepositoryError>;
    /// Lessons ordered by position.
    async fn lessons(&self, course: CourseId) -> Result<Vec<Lesson>, RepositoryError>;
}
