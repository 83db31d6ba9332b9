use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::{Extension, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::catalog::{Course, CourseRepository, NewCourse};
use crate::ids::UserId;
use crate::notifications::{DispatchError, MemoryOutbox, Notification, NotificationDispatcher};
use crate::payments::{payment_router, CheckoutRequest, Payment, PaymentMethod, PaymentService};
use crate::storage::MemoryStore;
use crate::web::{CsrfRegistry, ROLE_HEADER, USER_HEADER};

pub(super) const STUDENT: UserId = UserId(7);
pub(super) const ADMIN: UserId = UserId(1);

pub(super) type Service<N> = PaymentService<MemoryStore, N>;

pub(super) async fn priced_course(store: &MemoryStore) -> Course {
    course_with(store, "electrical-installation-2", dec!(450.00)).await
}

pub(super) async fn course_with(store: &MemoryStore, slug: &str, price: Decimal) -> Course {
    store
        .insert_course(NewCourse {
            title: format!("Course {slug}"),
            slug: slug.to_string(),
            description: "Practical trade course".to_string(),
            price,
            currency: "GHS".to_string(),
            published: true,
            created_at: Utc::now(),
        })
        .await
        .expect("course inserted")
}

pub(super) async fn build_service() -> (Service<MemoryOutbox>, MemoryStore, MemoryOutbox, Course) {
    let store = MemoryStore::new();
    let outbox = MemoryOutbox::default();
    let course = priced_course(&store).await;
    let service = PaymentService::new(Arc::new(store.clone()), Arc::new(outbox.clone()));
    (service, store, outbox, course)
}

pub(super) fn mobile_money(reference: &str) -> CheckoutRequest {
    CheckoutRequest {
        method: PaymentMethod::MobileMoney,
        transaction_reference: reference.to_string(),
    }
}

pub(super) async fn pending_payment<N>(service: &Service<N>, course: &Course) -> Payment
where
    N: NotificationDispatcher + 'static,
{
    service
        .checkout(STUDENT, course.id, mobile_money("MM-20261019-0001"))
        .await
        .expect("checkout succeeds")
}

/// Mail relay that refuses every message.
#[derive(Debug, Default)]
pub(super) struct OfflineMailer;

impl NotificationDispatcher for OfflineMailer {
    fn dispatch(&self, _notification: Notification) -> Result<(), DispatchError> {
        Err(DispatchError::Transport("smtp relay unreachable".to_string()))
    }
}

pub(super) fn router_with<N>(service: Service<N>, csrf: CsrfRegistry) -> Router
where
    N: NotificationDispatcher + 'static,
{
    payment_router(Arc::new(service)).layer(Extension(csrf))
}

pub(super) fn form_post(uri: &str, user: UserId, role: &str, body: String) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(USER_HEADER, user.to_string())
        .header(ROLE_HEADER, role)
        .body(Body::from(body))
        .expect("request builds")
}

pub(super) fn get_as(uri: &str, user: UserId, role: &str) -> Request<Body> {
    Request::get(uri)
        .header(USER_HEADER, user.to_string())
        .header(ROLE_HEADER, role)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) fn location(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}
