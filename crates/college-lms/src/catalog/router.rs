use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::domain::{CourseDraft, LessonDraft};
use super::repository::CourseRepository;
use super::service::{CatalogError, CatalogService};
use crate::accounts::Role;
use crate::ids::CourseId;
use crate::web::{form_or_redirect, json_error, path_id, FlashRedirect, RequestContext};

#[derive(Debug, Deserialize)]
pub(crate) struct CourseForm {
    csrf_token: String,
    title: String,
    slug: String,
    #[serde(default)]
    description: String,
    price: Decimal,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    published: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LessonForm {
    csrf_token: String,
    title: String,
    #[serde(default)]
    position: Option<u32>,
}

pub fn catalog_router<R>(service: Arc<CatalogService<R>>) -> Router
where
    R: CourseRepository + 'static,
{
    Router::new()
        .route("/api/v1/courses", get(list_handler::<R>))
        .route("/api/v1/courses/:course_id", get(detail_handler::<R>))
        .route("/admin/courses", post(create_course_handler::<R>))
        .route(
            "/admin/courses/:course_id/lessons",
            post(add_lesson_handler::<R>),
        )
        .with_state(service)
}

pub(crate) async fn list_handler<R>(State(service): State<Arc<CatalogService<R>>>) -> Response
where
    R: CourseRepository + 'static,
{
    match service.published().await {
        Ok(courses) => (StatusCode::OK, Json(courses)).into_response(),
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) async fn detail_handler<R>(
    State(service): State<Arc<CatalogService<R>>>,
    Path(course_id): Path<i64>,
) -> Response
where
    R: CourseRepository + 'static,
{
    match service.course_detail(CourseId(course_id)).await {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(CatalogError::UnknownCourse) => json_error(StatusCode::NOT_FOUND, "course not found"),
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) async fn create_course_handler<R>(
    State(service): State<Arc<CatalogService<R>>>,
    ctx: RequestContext,
    form: Result<Form<CourseForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    R: CourseRepository + 'static,
{
    let form = form_or_redirect(form, "/admin/courses")?;
    ctx.verify_csrf(&form.csrf_token)?;
    ctx.require_role(&Role::STAFF)?;

    let draft = CourseDraft {
        title: form.title,
        slug: form.slug,
        description: form.description,
        price: form.price,
        currency: form.currency,
        published: form
            .published
            .as_deref()
            .is_some_and(|flag| matches!(flag, "on" | "true" | "1")),
    };
    match service.create_course(draft).await {
        Ok(course) => Ok(FlashRedirect::success(
            format!("/admin/courses/{}", course.id),
            format!("Course \"{}\" created.", course.title),
        )),
        Err(err) => Err(FlashRedirect::from_error("/admin/courses", &err)),
    }
}

pub(crate) async fn add_lesson_handler<R>(
    State(service): State<Arc<CatalogService<R>>>,
    ctx: RequestContext,
    Path(raw_course): Path<String>,
    form: Result<Form<LessonForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    R: CourseRepository + 'static,
{
    let course_id: CourseId = path_id(&raw_course, "/admin/courses")?;
    let back = format!("/admin/courses/{course_id}");
    let form = form_or_redirect(form, &back)?;
    ctx.verify_csrf(&form.csrf_token)?;
    ctx.require_role(&Role::STAFF)?;

    let draft = LessonDraft {
        title: form.title,
        position: form.position,
    };
    match service.add_lesson(course_id, draft).await {
        Ok(lesson) => Ok(FlashRedirect::success(
            back,
            format!("Lesson \"{}\" added.", lesson.title),
        )),
        Err(err) => Err(FlashRedirect::from_error(back, &err)),
    }
}
