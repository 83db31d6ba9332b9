use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use super::domain::{Course, CourseDetail, CourseDraft, Lesson, LessonDraft, NewCourse, NewLesson};
use super::repository::CourseRepository;
use crate::config::validate_currency;
use crate::ids::CourseId;
use crate::storage::RepositoryError;
use crate::web::UserFacing;

pub struct CatalogService<R> {
    repository: Arc<R>,
    default_currency: String,
}

impl<R> CatalogService<R>
where
    R: CourseRepository + 'static,
{
    pub fn new(repository: Arc<R>, default_currency: impl Into<String>) -> Self {
        Self {
            repository,
            default_currency: default_currency.into(),
        }
    }

    pub async fn create_course(&self, draft: CourseDraft) -> Result<Course, CatalogError> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::Invalid("title is required"));
        }
        let slug = draft.slug.trim().to_ascii_lowercase();
        if slug.is_empty()
            || !slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(CatalogError::Invalid(
                "slug may only contain letters, digits and dashes",
            ));
        }
        if draft.price < Decimal::ZERO {
            return Err(CatalogError::Invalid("price cannot be negative"));
        }
        let currency = match draft.currency.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => validate_currency(code)
                .map_err(|_| CatalogError::Invalid("currency must be a three letter code"))?,
            _ => self.default_currency.clone(),
        };

        let course = self
            .repository
            .insert_course(NewCourse {
                title,
                slug,
                description: draft.description.trim().to_string(),
                price: draft.price.round_dp(2),
                currency,
                published: draft.published,
                created_at: Utc::now(),
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => CatalogError::SlugTaken,
                other => CatalogError::Repository(other),
            })?;

        info!(course = %course.id, slug = %course.slug, "course created");
        Ok(course)
    }

    pub async fn add_lesson(
        &self,
        course_id: CourseId,
        draft: LessonDraft,
    ) -> Result<Lesson, CatalogError> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(CatalogError::Invalid("lesson title is required"));
        }
        self.repository
            .course(course_id)
            .await?
            .ok_or(CatalogError::UnknownCourse)?;

        let existing = self.repository.lessons(course_id).await?;
        let position = draft
            .position
            .unwrap_or_else(|| existing.iter().map(|l| l.position).max().unwrap_or(0) + 1);

        let lesson = self
            .repository
            .insert_lesson(NewLesson {
                course_id,
                title,
                position,
            })
            .await?;
        Ok(lesson)
    }

    pub async fn published(&self) -> Result<Vec<Course>, CatalogError> {
        Ok(self.repository.published_courses().await?)
    }

    /// Detail for the public catalog; unpublished courses are hidden.
    pub async fn course_detail(&self, course_id: CourseId) -> Result<CourseDetail, CatalogError> {
        let course = self
            .repository
            .course(course_id)
            .await?
            .filter(|course| course.published)
            .ok_or(CatalogError::UnknownCourse)?;
        let lessons = self.repository.lessons(course_id).await?;
        Ok(CourseDetail { course, lessons })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid course: {0}")]
    Invalid(&'static str),
    #[error("a course with that slug already exists")]
    SlugTaken,
    #[error("course not found")]
    UnknownCourse,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl UserFacing for CatalogError {
    fn is_internal(&self) -> bool {
        matches!(self, CatalogError::Repository(err) if err.is_internal())
    }
}
