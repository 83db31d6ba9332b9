use std::sync::Arc;

use rust_decimal_macros::dec;

use super::common::*;
use crate::enrollments::{EnrollmentError, EnrollmentRepository, EnrollmentService, EnrollmentStatus};
use crate::notifications::EmailTemplate;
use crate::payments::{PaymentError, PaymentRepository, PaymentService, PaymentStatus, VerificationDecision};
use crate::storage::MemoryStore;

#[tokio::test]
async fn checkout_records_pending_payment_at_course_price() {
    let (service, _, outbox, course) = build_service().await;

    let payment = service
        .checkout(STUDENT, course.id, mobile_money("  MM-778812  "))
        .await
        .expect("checkout succeeds");

    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, dec!(450.00));
    assert_eq!(payment.currency, "GHS");
    assert_eq!(payment.transaction_reference, "MM-778812");
    assert!(outbox.sent().is_empty(), "nothing is mailed before verification");
}

#[tokio::test]
async fn checkout_rejects_blank_reference_and_second_pending_payment() {
    let (service, _, _, course) = build_service().await;

    let blank = service.checkout(STUDENT, course.id, mobile_money("   ")).await;
    assert!(matches!(blank, Err(PaymentError::InvalidReference(_))));

    pending_payment(&service, &course).await;
    let again = service
        .checkout(STUDENT, course.id, mobile_money("MM-SECOND"))
        .await;
    assert!(matches!(again, Err(PaymentError::PaymentPending)));
}

#[tokio::test]
async fn approving_creates_exactly_one_enrollment_and_mails_student() {
    let (service, store, outbox, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;

    let outcome = service
        .verify(payment.id, VerificationDecision::Approve, ADMIN, Some(" matched statement ".to_string()))
        .await
        .expect("approval succeeds");

    assert!(outcome.notifications_sent);
    assert!(outcome.settlement.enrollment_created);
    let settled = &outcome.settlement.payment;
    assert_eq!(settled.status, PaymentStatus::Completed);
    assert_eq!(settled.verified_by, Some(ADMIN));
    assert_eq!(settled.note.as_deref(), Some("matched statement"));

    let enrollment = store
        .enrollment_for(STUDENT, course.id)
        .await
        .expect("lookup")
        .expect("enrollment exists");
    assert_eq!(enrollment.status, EnrollmentStatus::Enrolled);
    assert_eq!(enrollment.amount_paid, dec!(450.00));
    assert_eq!(
        outbox.templates(),
        vec![EmailTemplate::PaymentReceived, EmailTemplate::EnrollmentConfirm]
    );
}

#[tokio::test]
async fn approving_twice_is_an_invalid_transition() {
    let (service, store, outbox, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;

    service
        .verify(payment.id, VerificationDecision::Approve, ADMIN, None)
        .await
        .expect("first approval succeeds");
    let second = service
        .verify(payment.id, VerificationDecision::Approve, ADMIN, None)
        .await;

    match second {
        Err(PaymentError::InvalidTransition { from, to }) => {
            assert_eq!((from, to), ("completed", "completed"));
        }
        other => panic!("expected invalid transition, got {other:?}"),
    }
    let enrollments = store.enrollments_for_user(STUDENT).await.expect("listing");
    assert_eq!(enrollments.len(), 1);
    assert_eq!(outbox.sent().len(), 2, "second approval sends nothing");
}

#[tokio::test]
async fn concurrent_approvals_settle_once() {
    let (service, store, _, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;
    let service = Arc::new(service);

    let first = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .verify(payment.id, VerificationDecision::Approve, ADMIN, None)
                .await
        })
    };
    let second = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .verify(payment.id, VerificationDecision::Approve, ADMIN, None)
                .await
        })
    };
    let results = [
        first.await.expect("task joins"),
        second.await.expect("task joins"),
    ];

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(store.enrollments_for_user(STUDENT).await.expect("listing").len(), 1);
}

#[tokio::test]
async fn rejecting_fails_payment_without_enrollment() {
    let (service, store, outbox, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;

    let outcome = service
        .verify(payment.id, VerificationDecision::Reject, ADMIN, Some("reference not found".to_string()))
        .await
        .expect("rejection succeeds");

    assert_eq!(outcome.settlement.payment.status, PaymentStatus::Failed);
    assert!(outcome.settlement.enrollment.is_none());
    assert!(store.enrollment_for(STUDENT, course.id).await.expect("lookup").is_none());
    assert!(outbox.sent().is_empty());

    let refund = service.refund(payment.id, ADMIN).await;
    assert!(matches!(
        refund,
        Err(PaymentError::InvalidTransition { from: "failed", to: "refunded" })
    ));
}

#[tokio::test]
async fn refund_drops_the_enrollment_and_allows_a_new_checkout() {
    let (service, store, _, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;
    service
        .verify(payment.id, VerificationDecision::Approve, ADMIN, None)
        .await
        .expect("approval succeeds");

    let outcome = service.refund(payment.id, ADMIN).await.expect("refund succeeds");
    assert_eq!(outcome.payment.status, PaymentStatus::Refunded);
    assert_eq!(
        outcome.enrollment.map(|enrollment| enrollment.status),
        Some(EnrollmentStatus::Dropped)
    );

    let stored = store.payment(payment.id).await.expect("lookup").expect("kept");
    assert_eq!(stored.status, PaymentStatus::Refunded);

    let retry = service
        .checkout(STUDENT, course.id, mobile_money("MM-RETRY"))
        .await
        .expect("dropped students may pay again");
    let reenrolled = service
        .verify(retry.id, VerificationDecision::Approve, ADMIN, None)
        .await
        .expect("second approval succeeds");
    assert!(!reenrolled.settlement.enrollment_created);
    assert_eq!(
        reenrolled.settlement.enrollment.map(|enrollment| enrollment.status),
        Some(EnrollmentStatus::Enrolled)
    );
}

#[tokio::test]
async fn paid_enrollments_are_only_withdrawn_by_refund() {
    let (service, store, outbox, course) = build_service().await;
    let payment = pending_payment(&service, &course).await;
    service
        .verify(payment.id, VerificationDecision::Approve, ADMIN, None)
        .await
        .expect("approval succeeds");

    let enrollments = EnrollmentService::new(Arc::new(store.clone()), Arc::new(outbox));
    assert!(matches!(
        enrollments.drop_course(STUDENT, course.id).await,
        Err(EnrollmentError::RefundRequired)
    ));
    let kept = store
        .enrollment_for(STUDENT, course.id)
        .await
        .expect("lookup")
        .expect("enrollment exists");
    assert_eq!(kept.status, EnrollmentStatus::Enrolled);

    service.refund(payment.id, ADMIN).await.expect("refund succeeds");
    assert!(matches!(
        enrollments.drop_course(STUDENT, course.id).await,
        Err(EnrollmentError::NotEnrolled)
    ));
}

#[tokio::test]
async fn approval_commits_even_when_mail_fails() {
    let store = MemoryStore::new();
    let course = priced_course(&store).await;
    let service = PaymentService::new(Arc::new(store.clone()), Arc::new(OfflineMailer));
    let payment = pending_payment(&service, &course).await;

    let outcome = service
        .verify(payment.id, VerificationDecision::Approve, ADMIN, None)
        .await
        .expect("approval succeeds despite mail outage");

    assert!(!outcome.notifications_sent);
    assert_eq!(outcome.settlement.payment.status, PaymentStatus::Completed);
    assert!(store.enrollment_for(STUDENT, course.id).await.expect("lookup").is_some());
}

#[tokio::test]
async fn pending_queue_is_oldest_first_and_limited() {
    let (service, store, _, course) = build_service().await;
    let other = course_with(&store, "plumbing-level-1", dec!(300)).await;
    let first = pending_payment(&service, &course).await;
    let second = service
        .checkout(STUDENT, other.id, mobile_money("MM-PLUMB"))
        .await
        .expect("checkout succeeds");

    let queue = service.pending(10).await.expect("queue");
    assert_eq!(
        queue.iter().map(|payment| payment.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );
    assert_eq!(service.pending(1).await.expect("queue").len(), 1);
}

#[tokio::test]
async fn free_and_unknown_courses_cannot_be_bought() {
    let (service, store, _, _) = build_service().await;
    let free = course_with(&store, "orientation", dec!(0)).await;

    let result = service.checkout(STUDENT, free.id, mobile_money("MM-1")).await;
    assert!(matches!(result, Err(PaymentError::FreeCourse)));

    let result = service
        .checkout(STUDENT, crate::ids::CourseId(999), mobile_money("MM-1"))
        .await;
    assert!(matches!(result, Err(PaymentError::UnknownCourse)));
}
