use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use super::domain::{
    CheckoutRequest, NewPayment, Payment, PaymentStatus, RefundOutcome, Settlement,
    SettlementOutcome, VerificationDecision,
};
use super::repository::PaymentRepository;
use crate::catalog::CourseRepository;
use crate::enrollments::EnrollmentRepository;
use crate::ids::{CourseId, PaymentId, UserId};
use crate::notifications::{dispatch_logged, EmailTemplate, Notification, NotificationDispatcher};
use crate::storage::RepositoryError;
use crate::web::UserFacing;

const MAX_REFERENCE_LEN: usize = 64;
const MAX_NOTE_LEN: usize = 500;

/// Service composing the payment store, the catalog and the mail hook.
pub struct PaymentService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

/// Result of an admin verification, including whether mail went out.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub settlement: SettlementOutcome,
    pub notifications_sent: bool,
}

impl<S, N> PaymentService<S, N>
where
    S: PaymentRepository + CourseRepository + EnrollmentRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    /// Records a Pending payment for a priced, published course.
    pub async fn checkout(
        &self,
        student: UserId,
        course_id: CourseId,
        request: CheckoutRequest,
    ) -> Result<Payment, PaymentError> {
        let course = self
            .store
            .course(course_id)
            .await?
            .filter(|course| course.published)
            .ok_or(PaymentError::UnknownCourse)?;
        if course.is_free() {
            return Err(PaymentError::FreeCourse);
        }

        let reference = request.transaction_reference.trim().to_string();
        if reference.is_empty() {
            return Err(PaymentError::InvalidReference("a transaction reference is required"));
        }
        if reference.len() > MAX_REFERENCE_LEN {
            return Err(PaymentError::InvalidReference(
                "the transaction reference is too long",
            ));
        }

        if let Some(enrollment) = self.store.enrollment_for(student, course_id).await? {
            if enrollment.status.is_active() {
                return Err(PaymentError::AlreadyEnrolled);
            }
        }
        let earlier = self.store.payments_for(student, course_id).await?;
        if earlier
            .iter()
            .any(|payment| payment.status == PaymentStatus::Pending)
        {
            return Err(PaymentError::PaymentPending);
        }

        let payment = self
            .store
            .insert_payment(NewPayment {
                student_id: student,
                course_id,
                amount: course.price,
                currency: course.currency.clone(),
                method: request.method,
                transaction_reference: reference,
                created_at: Utc::now(),
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => PaymentError::PaymentPending,
                other => PaymentError::Repository(other),
            })?;

        info!(
            payment = %payment.id,
            %student,
            course = %course_id,
            amount = %payment.amount,
            method = payment.method.label(),
            "payment submitted for verification"
        );
        Ok(payment)
    }

    /// Applies an admin decision to a Pending payment.
    pub async fn verify(
        &self,
        payment_id: PaymentId,
        decision: VerificationDecision,
        admin: UserId,
        note: Option<String>,
    ) -> Result<VerificationOutcome, PaymentError> {
        let note = note
            .map(|note| note.trim().to_string())
            .filter(|note| !note.is_empty());
        if note.as_ref().is_some_and(|note| note.len() > MAX_NOTE_LEN) {
            return Err(PaymentError::NoteTooLong);
        }

        let settlement = self
            .store
            .settle(Settlement {
                payment_id,
                decision,
                verified_by: admin,
                note,
                at: Utc::now(),
            })
            .await
            .map_err(PaymentError::from_repository)?;

        let payment = &settlement.payment;
        info!(
            payment = %payment.id,
            %admin,
            status = payment.status.label(),
            enrollment_created = settlement.enrollment_created,
            "payment verified"
        );

        let notifications_sent = match decision {
            VerificationDecision::Approve => self.notify_approval(&settlement).await,
            VerificationDecision::Reject => true,
        };

        Ok(VerificationOutcome {
            settlement,
            notifications_sent,
        })
    }

    async fn notify_approval(&self, settlement: &SettlementOutcome) -> bool {
        let payment = &settlement.payment;
        let course_title = match self.store.course(payment.course_id).await {
            Ok(Some(course)) => course.title,
            _ => format!("course #{}", payment.course_id),
        };

        let mut sent = dispatch_logged(
            self.notifier.as_ref(),
            Notification::new(EmailTemplate::PaymentReceived, payment.student_id)
                .with("course", &course_title)
                .with("amount", payment.amount)
                .with("currency", &payment.currency)
                .with("reference", &payment.transaction_reference),
        );

        if let (true, Some(enrollment)) = (settlement.enrollment_created, &settlement.enrollment) {
            sent &= dispatch_logged(
                self.notifier.as_ref(),
                Notification::new(EmailTemplate::EnrollmentConfirm, payment.student_id)
                    .with("course", &course_title)
                    .with("enrollment_id", enrollment.id),
            );
        }
        sent
    }

    /// Refunds a Completed payment and drops the enrollment it paid for.
    pub async fn refund(
        &self,
        payment_id: PaymentId,
        admin: UserId,
    ) -> Result<RefundOutcome, PaymentError> {
        let outcome = self
            .store
            .refund(payment_id, admin, Utc::now())
            .await
            .map_err(PaymentError::from_repository)?;
        info!(payment = %payment_id, %admin, "payment refunded");
        Ok(outcome)
    }

    pub async fn payment(&self, payment_id: PaymentId) -> Result<Payment, PaymentError> {
        self.store
            .payment(payment_id)
            .await?
            .ok_or(PaymentError::NotFound)
    }

    pub async fn pending(&self, limit: usize) -> Result<Vec<Payment>, PaymentError> {
        Ok(self.store.pending_payments(limit).await?)
    }
}

/// Error raised by the payment service.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("course not found")]
    UnknownCourse,
    #[error("this course is free; enroll directly instead")]
    FreeCourse,
    #[error("{0}")]
    InvalidReference(&'static str),
    #[error("the verification note is too long")]
    NoteTooLong,
    #[error("you are already enrolled in this course")]
    AlreadyEnrolled,
    #[error("a payment for this course is already awaiting verification")]
    PaymentPending,
    #[error("payment not found")]
    NotFound,
    #[error("payment is {from} and cannot become {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PaymentError {
    fn from_repository(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => PaymentError::NotFound,
            RepositoryError::InvalidTransition { from, to } => {
                PaymentError::InvalidTransition { from, to }
            }
            other => PaymentError::Repository(other),
        }
    }
}

impl UserFacing for PaymentError {
    fn is_internal(&self) -> bool {
        matches!(self, PaymentError::Repository(err) if err.is_internal())
    }
}
