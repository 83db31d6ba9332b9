use axum::http::StatusCode;
use tower::ServiceExt;

use super::common::*;
use crate::enrollments::EnrollmentRepository;
use crate::payments::{PaymentRepository, PaymentStatus};
use crate::web::CsrfRegistry;

#[tokio::test]
async fn checkout_route_redirects_back_to_course_with_flash() {
    let (service, store, _, course) = build_service().await;
    let csrf = CsrfRegistry::default();
    let token = csrf.issue(Some(STUDENT));
    let router = router_with(service, csrf);

    let response = router
        .oneshot(form_post(
            &format!("/courses/{}/checkout", course.id),
            STUDENT,
            "student",
            format!("csrf_token={token}&method=mobile_money&transaction_reference=MM-4410"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some(format!("/courses/{}", course.id).as_str()));
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["level"], "success");

    let payments = store.payments_for(STUDENT, course.id).await.expect("lookup");
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Pending);
}

#[tokio::test]
async fn forged_token_redirects_home_without_side_effects() {
    let (service, store, _, course) = build_service().await;
    let router = router_with(service, CsrfRegistry::default());

    let response = router
        .oneshot(form_post(
            &format!("/courses/{}/checkout", course.id),
            STUDENT,
            "student",
            "csrf_token=forged&method=card&transaction_reference=CARD-1".to_string(),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    let payload = read_json_body(response).await;
    assert_eq!(payload["flash"]["level"], "error");
    assert!(store.payments_for(STUDENT, course.id).await.expect("lookup").is_empty());
}

#[tokio::test]
async fn students_cannot_verify_payments() {
    let (service, store, _, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;
    let csrf = CsrfRegistry::default();
    let token = csrf.issue(Some(STUDENT));
    let router = router_with(service, csrf);

    let response = router
        .oneshot(form_post(
            &format!("/admin/payments/{}/verify", payment.id),
            STUDENT,
            "student",
            format!("csrf_token={token}&decision=approve"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/"));
    let stored = store.payment(payment.id).await.expect("lookup").expect("exists");
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn admin_approval_enrolls_and_returns_to_queue() {
    let (service, store, _, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;
    let csrf = CsrfRegistry::default();
    let token = csrf.issue(Some(ADMIN));
    let router = router_with(service, csrf);

    let response = router
        .oneshot(form_post(
            &format!("/admin/payments/{}/verify", payment.id),
            ADMIN,
            "admin",
            format!("csrf_token={token}&decision=approve&note=bank+statement+matched"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/payments"));
    let payload = read_json_body(response).await;
    assert_eq!(payload["redirect"], "/admin/payments");
    assert_eq!(payload["flash"]["level"], "success");
    assert!(store.enrollment_for(STUDENT, course.id).await.expect("lookup").is_some());
}

#[tokio::test]
async fn second_approval_surfaces_as_error_flash() {
    let (service, _, _, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;
    let csrf = CsrfRegistry::default();
    let router = router_with(service, csrf.clone());

    for expected in ["success", "error"] {
        let token = csrf.issue(Some(ADMIN));
        let response = router
            .clone()
            .oneshot(form_post(
                &format!("/admin/payments/{}/verify", payment.id),
                ADMIN,
                "admin",
                format!("csrf_token={token}&decision=approve"),
            ))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let payload = read_json_body(response).await;
        assert_eq!(payload["flash"]["level"], expected);
    }
}

#[tokio::test]
async fn malformed_payment_id_redirects_to_queue() {
    let (service, _, _, _) = build_service().await;
    let csrf = CsrfRegistry::default();
    let token = csrf.issue(Some(ADMIN));
    let router = router_with(service, csrf);

    let response = router
        .oneshot(form_post(
            "/admin/payments/not-a-number/refund",
            ADMIN,
            "admin",
            format!("csrf_token={token}"),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/admin/payments"));
}

#[tokio::test]
async fn payment_json_is_visible_to_owner_only() {
    let (service, _, _, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;
    let router = router_with(service, CsrfRegistry::default());
    let uri = format!("/api/v1/payments/{}", payment.id);

    let response = router
        .clone()
        .oneshot(get_as(&uri, STUDENT, "student"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["status"], "pending");
    assert_eq!(payload["amount"], "450.00");

    let response = router
        .oneshot(get_as(&uri, crate::ids::UserId(99), "student"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pending_queue_requires_admin() {
    let (service, _, _, course) = build_service().await;
    pending_payment(&service, &course).await;
    let router = router_with(service, CsrfRegistry::default());

    let response = router
        .clone()
        .oneshot(get_as("/api/v1/admin/payments/pending", STUDENT, "student"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = router
        .oneshot(get_as("/api/v1/admin/payments/pending?limit=5", ADMIN, "admin"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
}
