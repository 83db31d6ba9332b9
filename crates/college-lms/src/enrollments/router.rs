use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};

use super::repository::EnrollmentRepository;
use super::service::EnrollmentService;
use crate::catalog::CourseRepository;
use crate::certificates::CertificateRepository;
use crate::ids::{CourseId, LessonId};
use crate::notifications::NotificationDispatcher;
use crate::web::{form_or_redirect, json_error, path_id, CsrfForm, FlashRedirect, RequestContext};

pub fn enrollment_router<S, N>(service: Arc<EnrollmentService<S, N>>) -> Router
where
    S: EnrollmentRepository + CourseRepository + CertificateRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/courses/:course_id/enroll", post(enroll_handler::<S, N>))
        .route("/courses/:course_id/drop", post(drop_handler::<S, N>))
        .route(
            "/lessons/:lesson_id/complete",
            post(complete_lesson_handler::<S, N>),
        )
        .route("/api/v1/me/enrollments", get(my_enrollments_handler::<S, N>))
        .with_state(service)
}

pub(crate) async fn enroll_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    ctx: RequestContext,
    Path(raw_course): Path<String>,
    form: Result<Form<CsrfForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: EnrollmentRepository + CourseRepository + CertificateRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let course_id: CourseId = path_id(&raw_course, "/courses")?;
    let back = format!("/courses/{course_id}");
    let form = form_or_redirect(form, &back)?;
    let user = ctx.require_user()?;
    ctx.verify_csrf(&form.csrf_token)?;

    match service.enroll_free(user, course_id).await {
        Ok(_) => Ok(FlashRedirect::success(
            format!("/courses/{course_id}/learn"),
            "You are enrolled. Happy learning!",
        )),
        Err(err) => Err(FlashRedirect::from_error(back, &err)),
    }
}

pub(crate) async fn drop_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    ctx: RequestContext,
    Path(raw_course): Path<String>,
    form: Result<Form<CsrfForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: EnrollmentRepository + CourseRepository + CertificateRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let course_id: CourseId = path_id(&raw_course, "/courses")?;
    let form = form_or_redirect(form, "/dashboard")?;
    let user = ctx.require_user()?;
    ctx.verify_csrf(&form.csrf_token)?;

    service
        .drop_course(user, course_id)
        .await
        .map(|_| FlashRedirect::success("/dashboard", "You have left the course."))
        .map_err(|err| FlashRedirect::from_error("/dashboard", &err))
}

pub(crate) async fn complete_lesson_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    ctx: RequestContext,
    Path(raw_lesson): Path<String>,
    form: Result<Form<CsrfForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: EnrollmentRepository + CourseRepository + CertificateRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let lesson_id: LessonId = path_id(&raw_lesson, "/dashboard")?;
    let form = form_or_redirect(form, "/dashboard")?;
    let user = ctx.require_user()?;
    ctx.verify_csrf(&form.csrf_token)?;

    let progress = service
        .complete_lesson(user, lesson_id)
        .await
        .map_err(|err| FlashRedirect::from_error("/dashboard", &err))?;

    let course_page = format!("/courses/{}/learn", progress.enrollment.course_id);
    let redirect = match &progress.certificate {
        Some(certificate) => FlashRedirect::success(
            format!("/certificates/{}", certificate.id),
            format!(
                "Course complete! Certificate {} has been issued.",
                certificate.certificate_number
            ),
        ),
        None if progress.newly_recorded => FlashRedirect::success(
            course_page,
            format!(
                "Lesson complete. You are {}% through the course.",
                progress.enrollment.progress_percentage
            ),
        ),
        None => FlashRedirect::new(
            crate::web::FlashLevel::Info,
            course_page,
            "You already completed this lesson.",
        ),
    };
    Ok(redirect)
}

pub(crate) async fn my_enrollments_handler<S, N>(
    State(service): State<Arc<EnrollmentService<S, N>>>,
    ctx: RequestContext,
) -> Response
where
    S: EnrollmentRepository + CourseRepository + CertificateRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let Some(user) = ctx.user() else {
        return json_error(StatusCode::UNAUTHORIZED, "sign in required");
    };
    match service.enrollments(user).await {
        Ok(enrollments) => (StatusCode::OK, Json(enrollments)).into_response(),
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}
