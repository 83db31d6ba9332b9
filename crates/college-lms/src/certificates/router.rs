use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

use super::domain::CertificateVerification;
use super::repository::CertificateRepository;
use super::service::{CertificateError, CertificateService};
use crate::accounts::Role;
use crate::catalog::CourseRepository;
use crate::enrollments::EnrollmentRepository;
use crate::ids::{CertificateId, EnrollmentId};
use crate::notifications::NotificationDispatcher;
use crate::web::{form_or_redirect, json_error, path_id, CsrfForm, FlashRedirect, RequestContext};

#[derive(Debug, Deserialize)]
pub(crate) struct RevocationForm {
    csrf_token: String,
    reason: String,
}

pub fn certificate_router<S, N>(service: Arc<CertificateService<S, N>>) -> Router
where
    S: CertificateRepository + EnrollmentRepository + CourseRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/certificates/verify/:code",
            get(verify_handler::<S, N>),
        )
        .route(
            "/admin/certificates/:certificate_id/revoke",
            post(revoke_handler::<S, N>),
        )
        .route(
            "/admin/enrollments/:enrollment_id/certificate",
            post(issue_handler::<S, N>),
        )
        .with_state(service)
}

pub(crate) async fn verify_handler<S, N>(
    State(service): State<Arc<CertificateService<S, N>>>,
    Path(code): Path<String>,
) -> Response
where
    S: CertificateRepository + EnrollmentRepository + CourseRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    match service.verify(&code).await {
        Ok(certificate) => (
            StatusCode::OK,
            Json(CertificateVerification::from(&certificate)),
        )
            .into_response(),
        Err(CertificateError::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "valid": false, "error": "certificate not found" })),
        )
            .into_response(),
        Err(err) => json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

pub(crate) async fn revoke_handler<S, N>(
    State(service): State<Arc<CertificateService<S, N>>>,
    ctx: RequestContext,
    Path(raw_certificate): Path<String>,
    form: Result<Form<RevocationForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: CertificateRepository + EnrollmentRepository + CourseRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let certificate_id: CertificateId = path_id(&raw_certificate, "/admin/certificates")?;
    let form = form_or_redirect(form, "/admin/certificates")?;
    ctx.verify_csrf(&form.csrf_token)?;
    ctx.require_role(&[Role::Admin])?;

    service
        .revoke(certificate_id, &form.reason)
        .await
        .map(|certificate| {
            FlashRedirect::success(
                "/admin/certificates",
                format!("Certificate {} revoked.", certificate.certificate_number),
            )
        })
        .map_err(|err| FlashRedirect::from_error("/admin/certificates", &err))
}

pub(crate) async fn issue_handler<S, N>(
    State(service): State<Arc<CertificateService<S, N>>>,
    ctx: RequestContext,
    Path(raw_enrollment): Path<String>,
    form: Result<Form<CsrfForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    S: CertificateRepository + EnrollmentRepository + CourseRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let enrollment_id: EnrollmentId = path_id(&raw_enrollment, "/admin/enrollments")?;
    let form = form_or_redirect(form, "/admin/enrollments")?;
    ctx.verify_csrf(&form.csrf_token)?;
    ctx.require_role(&[Role::Admin])?;

    service
        .issue(enrollment_id)
        .await
        .map(|certificate| {
            FlashRedirect::success(
                format!("/admin/certificates/{}", certificate.id),
                format!("Certificate {} issued.", certificate.certificate_number),
            )
        })
        .map_err(|err| FlashRedirect::from_error("/admin/enrollments", &err))
}
