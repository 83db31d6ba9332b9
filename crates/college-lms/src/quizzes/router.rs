use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Form, Json, Router};
use serde::Deserialize;

use super::domain::NewQuiz;
use super::repository::QuizRepository;
use super::service::{QuizError, QuizService};
use crate::accounts::Role;
use crate::catalog::CourseRepository;
use crate::enrollments::EnrollmentRepository;
use crate::ids::{QuestionId, QuizId, ResponseId};
use crate::web::{form_or_redirect, json_error, path_id, FlashRedirect, RequestContext};

const ANSWER_PREFIX: &str = "q_";
const REVIEW_QUEUE: &str = "/admin/quiz-responses";

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseGradeForm {
    csrf_token: String,
    points: u32,
}

pub fn quiz_router<S>(service: Arc<QuizService<S>>) -> Router
where
    S: QuizRepository + CourseRepository + EnrollmentRepository + 'static,
{
    Router::new()
        .route("/quizzes/:quiz_id/submit", post(submit_handler::<S>))
        .route(
            "/admin/quiz-responses/:response_id/grade",
            post(grade_response_handler::<S>),
        )
        .route("/api/v1/admin/quizzes", post(create_quiz_handler::<S>))
        .with_state(service)
}

/// Collects `q_<question id>` fields; anything else is ignored.
fn answers_from_form(fields: HashMap<String, String>) -> BTreeMap<QuestionId, String> {
    fields
        .into_iter()
        .filter_map(|(key, value)| {
            let id = key.strip_prefix(ANSWER_PREFIX)?.parse::<QuestionId>().ok()?;
            Some((id, value))
        })
        .collect()
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<QuizService<S>>>,
    ctx: RequestContext,
    Path(raw_quiz): Path<String>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: QuizRepository + CourseRepository + EnrollmentRepository + 'static,
{
    let quiz_id: QuizId = path_id(&raw_quiz, "/")?;
    let back = format!("/quizzes/{quiz_id}");
    let mut fields = form_or_redirect(form, &back)?;
    let user = ctx.require_user()?;
    let token = fields.remove("csrf_token").unwrap_or_default();
    ctx.verify_csrf(&token)?;

    let attempt = service
        .submit(user, quiz_id, answers_from_form(fields))
        .await
        .map_err(|err| FlashRedirect::from_error(back.clone(), &err))?;

    let result_page = format!("/quizzes/{quiz_id}/attempts/{}", attempt.id);
    let verdict = if attempt.passed { "passed" } else { "did not pass" };
    let mut message = format!("You scored {:.2}% and {verdict}.", attempt.percentage);
    let pending = attempt.pending_review();
    if pending > 0 {
        message.push_str(&format!(
            " {pending} answer(s) await instructor review and may raise your score."
        ));
    }
    Ok(if attempt.passed {
        FlashRedirect::success(result_page, message)
    } else {
        FlashRedirect::warning(result_page, message)
    })
}

pub(crate) async fn grade_response_handler<S>(
    State(service): State<Arc<QuizService<S>>>,
    ctx: RequestContext,
    Path(raw_response): Path<String>,
    form: Result<Form<ResponseGradeForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: QuizRepository + CourseRepository + EnrollmentRepository + 'static,
{
    let response_id: ResponseId = path_id(&raw_response, REVIEW_QUEUE)?;
    let form = form_or_redirect(form, REVIEW_QUEUE)?;
    ctx.verify_csrf(&form.csrf_token)?;
    ctx.require_role(&Role::STAFF)?;

    service
        .grade_response(response_id, form.points)
        .await
        .map(|attempt| {
            FlashRedirect::success(
                REVIEW_QUEUE,
                format!(
                    "Response graded. Attempt {} now stands at {:.2}%.",
                    attempt.id, attempt.percentage
                ),
            )
        })
        .map_err(|err| FlashRedirect::from_error(REVIEW_QUEUE, &err))
}

pub(crate) async fn create_quiz_handler<S>(
    State(service): State<Arc<QuizService<S>>>,
    ctx: RequestContext,
    Json(quiz): Json<NewQuiz>,
) -> Response
where
    S: QuizRepository + CourseRepository + EnrollmentRepository + 'static,
{
    if !ctx.role().is_some_and(|role| Role::STAFF.contains(&role)) {
        return json_error(StatusCode::FORBIDDEN, "staff role required");
    }
    match service.create_quiz(quiz).await {
        Ok(quiz) => (StatusCode::CREATED, Json(quiz)).into_response(),
        Err(err @ (QuizError::Invalid(_) | QuizError::UnknownCourse)) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_fields_are_keyed_by_question() {
        let mut fields = HashMap::new();
        fields.insert("q_3".to_string(), "12".to_string());
        fields.insert("q_x".to_string(), "ignored".to_string());
        fields.insert("csrf_token".to_string(), "abc".to_string());

        let answers = answers_from_form(fields);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers.get(&QuestionId(3)).map(String::as_str), Some("12"));
    }
}
