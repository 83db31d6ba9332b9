use async_trait::async_trait;

use super::MemoryStore;
use crate::catalog::{Course, CourseRepository, Lesson, NewCourse, NewLesson};
use crate::ids::{CourseId, LessonId};
use crate::storage::RepositoryError;

#[async_trait]
impl CourseRepository for MemoryStore {
    async fn insert_course(&self, course: NewCourse) -> Result<Course, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.courses.values().any(|existing| existing.slug == course.slug) {
            return Err(RepositoryError::Conflict(format!("courses.slug {}", course.slug)));
        }
        let id = CourseId(tables.next_id("courses"));
        let record = Course {
            id,
            title: course.title,
            slug: course.slug,
            description: course.description,
            price: course.price,
            currency: course.currency,
            published: course.published,
            created_at: course.created_at,
        };
        tables.courses.insert(id, record.clone());
        Ok(record)
    }

    async fn course(&self, id: CourseId) -> Result<Option<Course>, RepositoryError> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn published_courses(&self) -> Result<Vec<Course>, RepositoryError> {
        Ok(self
            .lock()?
            .courses
            .values()
            .filter(|course| course.published)
            .cloned()
            .collect())
    }

    async fn insert_lesson(&self, lesson: NewLesson) -> Result<Lesson, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.courses.contains_key(&lesson.course_id) {
            return Err(RepositoryError::NotFound);
        }
        let id = LessonId(tables.next_id("lessons"));
        let record = Lesson {
            id,
            course_id: lesson.course_id,
            title: lesson.title,
            position: lesson.position,
        };
        tables.lessons.insert(id, record.clone());
        Ok(record)
    }

    async fn lesson(&self, id: LessonId) -> Result<Option<Lesson>, RepositoryError> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn lessons(&self, course: CourseId) -> Result<Vec<Lesson>, RepositoryError> {
        let mut lessons: Vec<Lesson> = self
            .lock()?
            .lessons
            .values()
            .filter(|lesson| lesson.course_id == course)
            .cloned()
            .collect();
        lessons.sort_by_key(|lesson| (lesson.position, lesson.id));
        Ok(lessons)
    }
}
