use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde_json::json;

/// Adds the probes and the Prometheus scrape endpoint to the LMS routes.
pub(crate) fn with_operational_routes(app: Router) -> Router {
    app.route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::lms_routes;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use axum::response::Response;
    use college_lms::catalog::{CatalogService, CourseDraft};
    use college_lms::config::LmsConfig;
    use college_lms::ids::UserId;
    use college_lms::notifications::{EmailTemplate, MemoryOutbox};
    use college_lms::storage::MemoryStore;
    use college_lms::web::{ROLE_HEADER, USER_HEADER};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_decimal::Decimal;
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    const STUDENT: UserId = UserId(21);
    const ADMIN: UserId = UserId(1);

    struct Harness {
        app: Router,
        store: Arc<MemoryStore>,
        outbox: Arc<MemoryOutbox>,
        readiness: Arc<AtomicBool>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::default());
        let readiness = Arc::new(AtomicBool::new(false));
        let state = AppState {
            readiness: readiness.clone(),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        let app = with_operational_routes(lms_routes(
            store.clone(),
            outbox.clone(),
            &LmsConfig::default(),
        ))
        .layer(Extension(state));
        Harness {
            app,
            store,
            outbox,
            readiness,
        }
    }

    async fn publish_course(store: &Arc<MemoryStore>, price: i64) -> i64 {
        let catalog = CatalogService::new(store.clone(), "USD");
        let course = catalog
            .create_course(CourseDraft {
                title: "Bookkeeping Essentials".to_string(),
                slug: "bookkeeping-essentials".to_string(),
                description: String::new(),
                price: Decimal::new(price, 0),
                currency: None,
                published: true,
            })
            .await
            .expect("course created");
        course.id.0
    }

    fn get_as(uri: &str, user: UserId, role: &str) -> Request<Body> {
        Request::get(uri)
            .header(USER_HEADER, user.to_string())
            .header(ROLE_HEADER, role)
            .body(Body::empty())
            .expect("request builds")
    }

    fn form_post(uri: &str, user: UserId, role: &str, body: String) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(USER_HEADER, user.to_string())
            .header(ROLE_HEADER, role)
            .body(Body::from(body))
            .expect("request builds")
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    async fn csrf_token(app: &Router, user: UserId, role: &str) -> String {
        let response = app
            .clone()
            .oneshot(get_as("/api/v1/csrf", user, role))
            .await
            .expect("csrf served");
        let body = json_body(response).await;
        body["csrf_token"]
            .as_str()
            .expect("token string")
            .to_string()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let harness = harness();
        let response = harness
            .app
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health served");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_follows_the_startup_flag() {
        let harness = harness();
        let ready = || Request::get("/ready").body(Body::empty()).expect("request");

        let response = harness.app.clone().oneshot(ready()).await.expect("served");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        harness.readiness.store(true, Ordering::Release);
        let response = harness.app.oneshot(ready()).await.expect("served");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn metrics_render_as_prometheus_text() {
        let harness = harness();
        let response = harness
            .app
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("metrics served");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn catalog_lists_published_courses() {
        let harness = harness();
        publish_course(&harness.store, 300).await;

        let response = harness
            .app
            .oneshot(get_as("/api/v1/courses", STUDENT, "student"))
            .await
            .expect("catalog served");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["slug"], "bookkeeping-essentials");
    }

    #[tokio::test]
    async fn paid_checkout_and_approval_grant_an_enrollment() {
        let harness = harness();
        let course = publish_course(&harness.store, 300).await;

        let token = csrf_token(&harness.app, STUDENT, "student").await;
        let response = harness
            .app
            .clone()
            .oneshot(form_post(
                &format!("/courses/{course}/checkout"),
                STUDENT,
                "student",
                format!(
                    "csrf_token={token}&method=bank_transfer&transaction_reference=BNK-5521"
                ),
            ))
            .await
            .expect("checkout served");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = harness
            .app
            .clone()
            .oneshot(get_as("/api/v1/admin/payments/pending", ADMIN, "admin"))
            .await
            .expect("queue served");
        let queue = json_body(response).await;
        let payment_id = queue[0]["id"].as_i64().expect("payment id");

        let admin_token = csrf_token(&harness.app, ADMIN, "admin").await;
        let response = harness
            .app
            .clone()
            .oneshot(form_post(
                &format!("/admin/payments/{payment_id}/verify"),
                ADMIN,
                "admin",
                format!("csrf_token={admin_token}&decision=approve"),
            ))
            .await
            .expect("verification served");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(json_body(response).await["flash"]["level"], "success");

        let response = harness
            .app
            .oneshot(get_as("/api/v1/me/enrollments", STUDENT, "student"))
            .await
            .expect("enrollments served");
        let enrollments = json_body(response).await;
        assert_eq!(enrollments.as_array().map(Vec::len), Some(1));
        assert_eq!(enrollments[0]["course_id"], course);

        let templates = harness.outbox.templates();
        assert!(templates.contains(&EmailTemplate::PaymentReceived));
        assert!(templates.contains(&EmailTemplate::EnrollmentConfirm));
    }

    #[tokio::test]
    async fn csrf_tokens_are_bound_to_their_user() {
        let harness = harness();
        let course = publish_course(&harness.store, 0).await;

        let foreign = csrf_token(&harness.app, ADMIN, "admin").await;
        let response = harness
            .app
            .clone()
            .oneshot(form_post(
                &format!("/courses/{course}/enroll"),
                STUDENT,
                "student",
                format!("csrf_token={foreign}"),
            ))
            .await
            .expect("enroll served");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");

        let response = harness
            .app
            .oneshot(get_as("/api/v1/me/enrollments", STUDENT, "student"))
            .await
            .expect("enrollments served");
        assert_eq!(json_body(response).await, serde_json::json!([]));
    }
}
