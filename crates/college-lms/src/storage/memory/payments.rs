use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryStore;
use crate::enrollments::{Enrollment, EnrollmentStatus};
use crate::ids::{CourseId, EnrollmentId, PaymentId, UserId};
use crate::payments::{
    NewPayment, Payment, PaymentRepository, PaymentStatus, RefundOutcome, Settlement,
    SettlementOutcome, VerificationDecision,
};
use crate::storage::RepositoryError;

#[async_trait]
impl PaymentRepository for MemoryStore {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, RepositoryError> {
        let mut tables = self.lock()?;
        let pending = tables.payments.values().any(|existing| {
            existing.student_id == payment.student_id
                && existing.course_id == payment.course_id
                && existing.status == PaymentStatus::Pending
        });
        if pending {
            return Err(RepositoryError::Conflict(
                "a pending payment already exists for this course".to_string(),
            ));
        }
        let id = PaymentId(tables.next_id("payments"));
        let record = Payment {
            id,
            student_id: payment.student_id,
            course_id: payment.course_id,
            amount: payment.amount,
            currency: payment.currency,
            method: payment.method,
            status: PaymentStatus::Pending,
            transaction_reference: payment.transaction_reference,
            created_at: payment.created_at,
            verified_at: None,
            verified_by: None,
            note: None,
        };
        tables.payments.insert(id, record.clone());
        Ok(record)
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        Ok(self.lock()?.payments.get(&id).cloned())
    }

    async fn payments_for(
        &self,
        student: UserId,
        course: CourseId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        Ok(self
            .lock()?
            .payments
            .values()
            .filter(|payment| payment.student_id == student && payment.course_id == course)
            .cloned()
            .collect())
    }

    async fn pending_payments(&self, limit: usize) -> Result<Vec<Payment>, RepositoryError> {
        let mut pending: Vec<Payment> = self
            .lock()?
            .payments
            .values()
            .filter(|payment| payment.status == PaymentStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|payment| (payment.created_at, payment.id));
        pending.truncate(limit);
        Ok(pending)
    }

    async fn settle(&self, settlement: Settlement) -> Result<SettlementOutcome, RepositoryError> {
        let mut tables = self.lock()?;
        let payment = tables
            .payments
            .get_mut(&settlement.payment_id)
            .ok_or(RepositoryError::NotFound)?;
        payment.status = payment
            .status
            .transition(settlement.decision.target_status())?;
        payment.verified_at = Some(settlement.at);
        payment.verified_by = Some(settlement.verified_by);
        payment.note = settlement.note;
        let payment = payment.clone();

        if settlement.decision == VerificationDecision::Reject {
            return Ok(SettlementOutcome {
                payment,
                enrollment: None,
                enrollment_created: false,
            });
        }

        if let Some(existing) = tables.enrollment_for_mut(payment.student_id, payment.course_id) {
            existing.amount_paid = payment.amount;
            if existing.status == EnrollmentStatus::Dropped {
                existing.status = EnrollmentStatus::Enrolled;
                let progress = existing.progress_percentage;
                existing.apply_progress(progress, settlement.at);
            }
            return Ok(SettlementOutcome {
                enrollment: Some(existing.clone()),
                payment,
                enrollment_created: false,
            });
        }

        let id = EnrollmentId(tables.next_id("enrollments"));
        let enrollment = Enrollment {
            id,
            user_id: payment.student_id,
            course_id: payment.course_id,
            status: EnrollmentStatus::Enrolled,
            progress_percentage: 0,
            amount_paid: payment.amount,
            enrolled_at: settlement.at,
            completed_at: None,
        };
        tables.enrollments.insert(id, enrollment.clone());
        Ok(SettlementOutcome {
            payment,
            enrollment: Some(enrollment),
            enrollment_created: true,
        })
    }

    async fn refund(
        &self,
        id: PaymentId,
        refunded_by: UserId,
        at: DateTime<Utc>,
    ) -> Result<RefundOutcome, RepositoryError> {
        let mut tables = self.lock()?;
        let payment = tables.payments.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        payment.status = payment.status.transition(PaymentStatus::Refunded)?;
        payment.verified_at = Some(at);
        payment.verified_by = Some(refunded_by);
        let payment = payment.clone();

        let enrollment = tables
            .enrollment_for_mut(payment.student_id, payment.course_id)
            .map(|enrollment| {
                enrollment.status = EnrollmentStatus::Dropped;
                enrollment.clone()
            });
        Ok(RefundOutcome {
            payment,
            enrollment,
        })
    }
}
