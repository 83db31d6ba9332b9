use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::csrf::CsrfRegistry;
use super::flash::FlashRedirect;
use crate::accounts::Role;
use crate::ids::UserId;

/// Header set by the authenticating gateway with the signed-in user's id.
pub const USER_HEADER: &str = "x-user-id";
/// Header set by the authenticating gateway with the user's role.
pub const ROLE_HEADER: &str = "x-user-role";

/// Per-request state handed to every form handler.
#[derive(Debug, Clone)]
pub struct RequestContext {
    user: Option<UserId>,
    role: Option<Role>,
    csrf: CsrfRegistry,
}

impl RequestContext {
    pub fn new(user: Option<UserId>, role: Option<Role>, csrf: CsrfRegistry) -> Self {
        let role = user.and(role.or(Some(Role::Student)));
        Self { user, role, csrf }
    }

    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn require_user(&self) -> Result<UserId, FlashRedirect> {
        self.user
            .ok_or_else(|| FlashRedirect::error("/login", "Please sign in to continue."))
    }

    pub fn require_role(&self, allowed: &[Role]) -> Result<UserId, FlashRedirect> {
        let user = self.require_user()?;
        match self.role {
            Some(role) if allowed.contains(&role) => Ok(user),
            _ => Err(FlashRedirect::error(
                "/",
                "You are not authorized to perform that action.",
            )),
        }
    }

    pub fn verify_csrf(&self, token: &str) -> Result<(), FlashRedirect> {
        if self.csrf.verify(self.user, token) {
            Ok(())
        } else {
            tracing::warn!(user = ?self.user, "csrf token rejected");
            Err(FlashRedirect::error(
                "/",
                "Your form expired. Please reload the page and try again.",
            ))
        }
    }

    pub fn issue_csrf(&self) -> String {
        self.csrf.issue(self.user)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let csrf = parts.extensions.get::<CsrfRegistry>().cloned().ok_or_else(|| {
            (StatusCode::INTERNAL_SERVER_ERROR, "csrf registry not configured").into_response()
        })?;

        let user = header_value(parts, USER_HEADER).and_then(|raw| raw.parse::<UserId>().ok());
        let role = header_value(parts, ROLE_HEADER).and_then(Role::parse);

        Ok(Self::new(user, role, csrf))
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
