use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{NewPayment, Payment, RefundOutcome, Settlement, SettlementOutcome};
use crate::ids::{CourseId, PaymentId, UserId};
use crate::storage::RepositoryError;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, RepositoryError>;
    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError>;
    async fn payments_for(
        &self,
        student: UserId,
        course: CourseId,
    ) -> Result<Vec<Payment>, RepositoryError>;
    /// Oldest first.
    async fn pending_payments(&self, limit: usize) -> Result<Vec<Payment>, RepositoryError>;
    /// Moves a Pending payment to Completed or Failed. On approval the
    /// (student, course) enrollment is created, or updated with the amount
    /// paid and reactivated if dropped, as part of the same atomic operation.
    async fn settle(&self, settlement: Settlement) -> Result<SettlementOutcome, RepositoryError>;
    /// Moves a Completed payment to Refunded and drops the matching
    /// enrollment atomically.
    async fn refund(
        &self,
        id: PaymentId,
        refunded_by: UserId,
        at: DateTime<Utc>,
    ) -> Result<RefundOutcome, RepositoryError>;
}
