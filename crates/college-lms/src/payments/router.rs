use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;

use super::domain::{CheckoutRequest, PaymentMethod, VerificationDecision};
use super::repository::PaymentRepository;
use super::service::{PaymentError, PaymentService};
use crate::accounts::Role;
use crate::catalog::CourseRepository;
use crate::enrollments::EnrollmentRepository;
use crate::ids::{CourseId, PaymentId};
use crate::notifications::NotificationDispatcher;
use crate::web::{
    form_or_redirect, json_error, path_id, CsrfForm, FlashLevel, FlashRedirect, RequestContext,
};

const PAYMENT_QUEUE: &str = "/admin/payments";

#[derive(Debug, Deserialize)]
pub(crate) struct CheckoutForm {
    csrf_token: String,
    method: PaymentMethod,
    transaction_reference: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerificationForm {
    csrf_token: String,
    decision: VerificationDecision,
    #[serde(default)]
    note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PendingQuery {
    #[serde(default)]
    limit: Option<usize>,
}

/// Router builder exposing checkout, the verification queue and refunds.
pub fn payment_router<S, N>(service: Arc<PaymentService<S, N>>) -> Router
where
    S: PaymentRepository + CourseRepository + EnrollmentRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/courses/:course_id/checkout", post(checkout_handler::<S, N>))
        .route(
            "/admin/payments/:payment_id/verify",
            post(verify_handler::<S, N>),
        )
        .route(
            "/admin/payments/:payment_id/refund",
            post(refund_handler::<S, N>),
        )
        .route("/api/v1/payments/:payment_id", get(payment_handler::<S, N>))
        .route(
            "/api/v1/admin/payments/pending",
            get(pending_handler::<S, N>),
        )
        .with_state(service)
}

pub(crate) async fn checkout_handler<S, N>(
    State(service): State<Arc<PaymentService<S, N>>>,
    ctx: RequestContext,
    Path(raw_course): Path<String>,
    form: Result<Form<CheckoutForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: PaymentRepository + CourseRepository + EnrollmentRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let course_id: CourseId = path_id(&raw_course, "/courses")?;
    let back = format!("/courses/{course_id}");
    let form = form_or_redirect(form, &back)?;
    let student = ctx.require_user()?;
    ctx.verify_csrf(&form.csrf_token)?;

    let request = CheckoutRequest {
        method: form.method,
        transaction_reference: form.transaction_reference,
    };
    match service.checkout(student, course_id, request).await {
        Ok(payment) => Ok(FlashRedirect::success(
            back,
            format!(
                "Payment {} received. An administrator will verify it shortly.",
                payment.transaction_reference
            ),
        )),
        Err(err) => Err(FlashRedirect::from_error(back, &err)),
    }
}

pub(crate) async fn verify_handler<S, N>(
    State(service): State<Arc<PaymentService<S, N>>>,
    ctx: RequestContext,
    Path(raw_payment): Path<String>,
    form: Result<Form<VerificationForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: PaymentRepository + CourseRepository + EnrollmentRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let payment_id: PaymentId = path_id(&raw_payment, PAYMENT_QUEUE)?;
    let form = form_or_redirect(form, PAYMENT_QUEUE)?;
    ctx.verify_csrf(&form.csrf_token)?;
    let admin = ctx.require_role(&[Role::Admin])?;

    let outcome = service
        .verify(payment_id, form.decision, admin, form.note)
        .await
        .map_err(|err| FlashRedirect::from_error(PAYMENT_QUEUE, &err))?;

    let redirect = match (form.decision, outcome.notifications_sent) {
        (VerificationDecision::Approve, true) => FlashRedirect::success(
            PAYMENT_QUEUE,
            format!("Payment {payment_id} approved and the student is enrolled."),
        ),
        (VerificationDecision::Approve, false) => FlashRedirect::warning(
            PAYMENT_QUEUE,
            format!(
                "Payment {payment_id} approved and the student is enrolled, \
                 but the confirmation e-mail could not be sent."
            ),
        ),
        (VerificationDecision::Reject, _) => FlashRedirect::new(
            FlashLevel::Info,
            PAYMENT_QUEUE,
            format!("Payment {payment_id} marked as failed."),
        ),
    };
    Ok(redirect)
}

pub(crate) async fn refund_handler<S, N>(
    State(service): State<Arc<PaymentService<S, N>>>,
    ctx: RequestContext,
    Path(raw_payment): Path<String>,
    form: Result<Form<CsrfForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: PaymentRepository + CourseRepository + EnrollmentRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let payment_id: PaymentId = path_id(&raw_payment, PAYMENT_QUEUE)?;
    let form = form_or_redirect(form, PAYMENT_QUEUE)?;
    ctx.verify_csrf(&form.csrf_token)?;
    let admin = ctx.require_role(&[Role::Admin])?;

    service
        .refund(payment_id, admin)
        .await
        .map(|_| {
            FlashRedirect::success(
                PAYMENT_QUEUE,
                format!("Payment {payment_id} refunded; the enrollment was dropped."),
            )
        })
        .map_err(|err| FlashRedirect::from_error(PAYMENT_QUEUE, &err))
}

pub(crate) async fn payment_handler<S, N>(
    State(service): State<Arc<PaymentService<S, N>>>,
    ctx: RequestContext,
    Path(payment_id): Path<i64>,
) -> Response
where
    S: PaymentRepository + CourseRepository + EnrollmentRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let Some(user) = ctx.user() else {
        return json_error(StatusCode::UNAUTHORIZED, "sign in required");
    };
    match service.payment(PaymentId(payment_id)).await {
        Ok(payment) if payment.student_id == user || ctx.role() == Some(Role::Admin) => {
            (StatusCode::OK, Json(payment)).into_response()
        }
        Ok(_) | Err(PaymentError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "payment not found")
        }
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) async fn pending_handler<S, N>(
    State(service): State<Arc<PaymentService<S, N>>>,
    ctx: RequestContext,
    Query(query): Query<PendingQuery>,
) -> Response
where
    S: PaymentRepository + CourseRepository + EnrollmentRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    if ctx.role() != Some(Role::Admin) {
        return json_error(StatusCode::FORBIDDEN, "admin role required");
    }
    let limit = query.limit.unwrap_or(50).clamp(1, 500);
    match service.pending(limit).await {
        Ok(payments) => (StatusCode::OK, Json(payments)).into_response(),
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}
