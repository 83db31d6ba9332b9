//! Request plumbing shared by the form endpoints: caller identity, anti-forgery
//! tokens and redirect-with-flash responses.

mod context;
mod csrf;
mod flash;

pub use context::{RequestContext, ROLE_HEADER, USER_HEADER};
pub use csrf::{CsrfRegistry, CSRF_TOKEN_CAPACITY, CSRF_TOKEN_TTL_MINUTES};
pub use flash::{Flash, FlashLevel, FlashRedirect, UserFacing};

use std::str::FromStr;

use axum::extract::rejection::FormRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::json;

/// Body of forms that carry nothing but the anti-forgery token.
#[derive(Debug, Clone, Deserialize)]
pub struct CsrfForm {
    pub csrf_token: String,
}

/// Unwraps a form body or redirects when fields are missing or malformed.
pub fn form_or_redirect<T>(
    form: Result<Form<T>, FormRejection>,
    location: &str,
) -> Result<T, FlashRedirect> {
    form.map(|Form(inner)| inner).map_err(|rejection| {
        tracing::debug!(error = %rejection, "form rejected");
        FlashRedirect::error(location, "The submitted form was incomplete.")
    })
}

/// Parses a record id from a path segment, redirecting on garbage.
pub fn path_id<T: FromStr>(raw: &str, location: &str) -> Result<T, FlashRedirect> {
    raw.parse::<T>()
        .map_err(|_| FlashRedirect::error(location, "That record does not exist."))
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    let message: String = message.into();
    (status, Json(json!({ "error": message }))).into_response()
}

/// `GET /api/v1/csrf` hands the caller a token for their next form post.
pub fn csrf_router() -> Router {
    Router::new().route("/api/v1/csrf", get(issue_token_handler))
}

pub(crate) async fn issue_token_handler(ctx: RequestContext) -> Json<serde_json::Value> {
    Json(json!({ "csrf_token": ctx.issue_csrf() }))
}
