use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// One-time notice shown on the page the client is redirected to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

/// `303 See Other` carrying the flash for the next page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashRedirect {
    pub location: String,
    pub flash: Flash,
}

impl FlashRedirect {
    pub fn new(level: FlashLevel, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            flash: Flash {
                level,
                message: message.into(),
            },
        }
    }

    pub fn success(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, location, message)
    }

    pub fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Warning, location, message)
    }

    pub fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Error, location, message)
    }

    /// Error redirect that hides backend failures from the user.
    pub fn from_error<E>(location: impl Into<String>, err: &E) -> Self
    where
        E: UserFacing + std::fmt::Display,
    {
        if err.is_internal() {
            tracing::error!(error = %err, "request failed");
            Self::error(location, "We could not complete that request. Please try again.")
        } else {
            Self::error(location, err.to_string())
        }
    }
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "redirect": self.location,
            "flash": self.flash,
        }));
        (
            StatusCode::SEE_OTHER,
            [(header::LOCATION, self.location.clone())],
            body,
        )
            .into_response()
    }
}

/// Separates caller mistakes, which are safe to echo, from backend failures.
pub trait UserFacing {
    fn is_internal(&self) -> bool;
}
