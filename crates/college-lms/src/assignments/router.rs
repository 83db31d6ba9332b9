use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Form, Router};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::domain::AssignmentDraft;
use super::repository::AssignmentRepository;
use super::service::AssignmentService;
use crate::accounts::Role;
use crate::catalog::CourseRepository;
use crate::enrollments::EnrollmentRepository;
use crate::ids::{AssignmentId, CourseId, SubmissionId};
use crate::web::{form_or_redirect, path_id, FlashRedirect, RequestContext};

const GRADING_QUEUE: &str = "/admin/submissions";

#[derive(Debug, Deserialize)]
pub(crate) struct SubmissionForm {
    csrf_token: String,
    content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GradeForm {
    csrf_token: String,
    score: u32,
    #[serde(default)]
    feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignmentForm {
    csrf_token: String,
    title: String,
    max_points: u32,
    #[serde(default)]
    due_at: Option<DateTime<Utc>>,
}

pub fn assignment_router<S>(service: Arc<AssignmentService<S>>) -> Router
where
    S: AssignmentRepository + CourseRepository + EnrollmentRepository + 'static,
{
    Router::new()
        .route(
            "/assignments/:assignment_id/submit",
            post(submit_handler::<S>),
        )
        .route(
            "/admin/submissions/:submission_id/grade",
            post(grade_handler::<S>),
        )
        .route(
            "/admin/courses/:course_id/assignments",
            post(create_handler::<S>),
        )
        .with_state(service)
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<AssignmentService<S>>>,
    ctx: RequestContext,
    Path(raw_assignment): Path<String>,
    form: Result<Form<SubmissionForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: AssignmentRepository + CourseRepository + EnrollmentRepository + 'static,
{
    let assignment_id: AssignmentId = path_id(&raw_assignment, "/")?;
    let back = format!("/assignments/{assignment_id}");
    let form = form_or_redirect(form, &back)?;
    let user = ctx.require_user()?;
    ctx.verify_csrf(&form.csrf_token)?;

    match service.submit(user, assignment_id, &form.content).await {
        Ok(submission) if submission.late => Ok(FlashRedirect::warning(
            back,
            "Submission received after the due date and is marked late.",
        )),
        Ok(_) => Ok(FlashRedirect::success(back, "Submission received.")),
        Err(err) => Err(FlashRedirect::from_error(back, &err)),
    }
}

pub(crate) async fn grade_handler<S>(
    State(service): State<Arc<AssignmentService<S>>>,
    ctx: RequestContext,
    Path(raw_submission): Path<String>,
    form: Result<Form<GradeForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: AssignmentRepository + CourseRepository + EnrollmentRepository + 'static,
{
    let submission_id: SubmissionId = path_id(&raw_submission, GRADING_QUEUE)?;
    let form = form_or_redirect(form, GRADING_QUEUE)?;
    ctx.verify_csrf(&form.csrf_token)?;
    ctx.require_role(&Role::STAFF)?;

    match service.grade(submission_id, form.score, form.feedback).await {
        Ok(submission) => Ok(FlashRedirect::success(
            GRADING_QUEUE,
            format!("Submission {} graded.", submission.id),
        )),
        Err(err) => Err(FlashRedirect::from_error(GRADING_QUEUE, &err)),
    }
}

pub(crate) async fn create_handler<S>(
    State(service): State<Arc<AssignmentService<S>>>,
    ctx: RequestContext,
    Path(raw_course): Path<String>,
    form: Result<Form<AssignmentForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: AssignmentRepository + CourseRepository + EnrollmentRepository + 'static,
{
    let course_id: CourseId = path_id(&raw_course, "/admin/courses")?;
    let back = format!("/admin/courses/{course_id}");
    let form = form_or_redirect(form, &back)?;
    ctx.verify_csrf(&form.csrf_token)?;
    ctx.require_role(&Role::STAFF)?;

    let draft = AssignmentDraft {
        title: form.title,
        max_points: form.max_points,
        due_at: form.due_at,
    };
    match service.create_assignment(course_id, draft).await {
        Ok(assignment) => Ok(FlashRedirect::success(
            back,
            format!("Assignment \"{}\" created.", assignment.title),
        )),
        Err(err) => Err(FlashRedirect::from_error(back, &err)),
    }
}
