use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Form, Router};
use serde::Deserialize;

use super::domain::Registration;
use super::repository::AccountRepository;
use super::service::AccountService;
use crate::notifications::NotificationDispatcher;
use crate::web::{form_or_redirect, FlashRedirect, RequestContext};

#[derive(Debug, Deserialize)]
pub(crate) struct RegistrationForm {
    csrf_token: String,
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VerifyEmailForm {
    csrf_token: String,
    token: String,
}

pub fn account_router<R, N>(service: Arc<AccountService<R, N>>) -> Router
where
    R: AccountRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/register", post(register_handler::<R, N>))
        .route("/verify-email", post(verify_email_handler::<R, N>))
        .with_state(service)
}

pub(crate) async fn register_handler<R, N>(
    State(service): State<Arc<AccountService<R, N>>>,
    ctx: RequestContext,
    form: Result<Form<RegistrationForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    R: AccountRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let form = form_or_redirect(form, "/register")?;
    ctx.verify_csrf(&form.csrf_token)?;

    let registration = Registration {
        name: form.name,
        email: form.email,
    };
    match service.register(registration).await {
        Ok(user) => Ok(FlashRedirect::success(
            "/login",
            format!(
                "Welcome, {}! Check {} for a verification link.",
                user.name, user.email
            ),
        )),
        Err(err) => Err(FlashRedirect::from_error("/register", &err)),
    }
}

pub(crate) async fn verify_email_handler<R, N>(
    State(service): State<Arc<AccountService<R, N>>>,
    ctx: RequestContext,
    form: Result<Form<VerifyEmailForm>, FormRejection>,
) -> Result<FlashRedirect, FlashRedirect>
where
    R: AccountRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    let form = form_or_redirect(form, "/")?;
    ctx.verify_csrf(&form.csrf_token)?;

    service
        .verify_email(&form.token)
        .await
        .map(|_| FlashRedirect::success("/login", "Your e-mail address is verified."))
        .map_err(|err| FlashRedirect::from_error("/", &err))
}
