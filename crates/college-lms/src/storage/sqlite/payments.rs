use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::enrollments::{enrollment_for_in, insert_enrollment_in, write_enrollment};
use super::{decode_decimal, decode_label, decode_optional_time, decode_time, encode_time, SqliteStore};
use crate::enrollments::{EnrollmentStatus, NewEnrollment};
use crate::ids::{CourseId, PaymentId, UserId};
use crate::payments::{
    NewPayment, Payment, PaymentMethod, PaymentRepository, PaymentStatus, RefundOutcome,
    Settlement, SettlementOutcome, VerificationDecision,
};
use crate::storage::RepositoryError;

const PAYMENT_COLUMNS: &str = "id, student_id, course_id, amount, currency, method, status, \
     transaction_reference, created_at, verified_at, verified_by, note";

fn payment_from_row(row: &SqliteRow) -> Result<Payment, RepositoryError> {
    Ok(Payment {
        id: PaymentId(row.try_get("id")?),
        student_id: UserId(row.try_get("student_id")?),
        course_id: CourseId(row.try_get("course_id")?),
        amount: decode_decimal(row.try_get::<&str, _>("amount")?)?,
        currency: row.try_get("currency")?,
        method: decode_label(row.try_get::<&str, _>("method")?, PaymentMethod::from_label)?,
        status: decode_label(row.try_get::<&str, _>("status")?, PaymentStatus::from_label)?,
        transaction_reference: row.try_get("transaction_reference")?,
        created_at: decode_time(row.try_get::<&str, _>("created_at")?)?,
        verified_at: decode_optional_time(row.try_get("verified_at")?)?,
        verified_by: row.try_get::<Option<i64>, _>("verified_by")?.map(UserId),
        note: row.try_get("note")?,
    })
}

async fn payment_in(
    conn: &mut SqliteConnection,
    id: PaymentId,
) -> Result<Payment, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    payment_from_row(&row)
}

/// Moves the payment out of `from`, failing when another writer got there
/// first.
async fn guarded_status_update(
    conn: &mut SqliteConnection,
    payment: &Payment,
    from: PaymentStatus,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE payments SET status = ?, verified_at = ?, verified_by = ?, note = ? \
         WHERE id = ? AND status = ?",
    )
    .bind(payment.status.label())
    .bind(payment.verified_at.map(encode_time))
    .bind(payment.verified_by.map(|user| user.0))
    .bind(payment.note.as_deref())
    .bind(payment.id.0)
    .bind(from.label())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepositoryError::InvalidTransition {
            from: from.label(),
            to: payment.status.label(),
        });
    }
    Ok(())
}

#[async_trait]
impl PaymentRepository for SqliteStore {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO payments (student_id, course_id, amount, currency, method, status, \
             transaction_reference, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payment.student_id.0)
        .bind(payment.course_id.0)
        .bind(payment.amount.to_string())
        .bind(&payment.currency)
        .bind(payment.method.label())
        .bind(PaymentStatus::Pending.label())
        .bind(&payment.transaction_reference)
        .bind(encode_time(payment.created_at))
        .execute(&self.pool)
        .await?;

        Ok(Payment {
            id: PaymentId(result.last_insert_rowid()),
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
        })
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        match payment_in(&mut conn, id).await {
            Ok(payment) => Ok(Some(payment)),
            Err(RepositoryError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn payments_for(
        &self,
        student: UserId,
        course: CourseId,
    ) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE student_id = ? AND course_id = ? ORDER BY id"
        ))
        .bind(student.0)
        .bind(course.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(payment_from_row).collect()
    }

    async fn pending_payments(&self, limit: usize) -> Result<Vec<Payment>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = ? \
             ORDER BY created_at, id LIMIT ?"
        ))
        .bind(PaymentStatus::Pending.label())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(payment_from_row).collect()
    }

    async fn settle(&self, settlement: Settlement) -> Result<SettlementOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut payment = payment_in(&mut tx, settlement.payment_id).await?;
        let from = payment.status;
        payment.status = from.transition(settlement.decision.target_status())?;
        payment.verified_at = Some(settlement.at);
        payment.verified_by = Some(settlement.verified_by);
        payment.note = settlement.note;
        guarded_status_update(&mut tx, &payment, from).await?;

        if settlement.decision == VerificationDecision::Reject {
            tx.commit().await?;
            return Ok(SettlementOutcome {
                payment,
                enrollment: None,
                enrollment_created: false,
            });
        }

        let (enrollment, enrollment_created) =
            match enrollment_for_in(&mut tx, payment.student_id, payment.course_id).await? {
                Some(mut existing) => {
                    existing.amount_paid = payment.amount;
                    if existing.status == EnrollmentStatus::Dropped {
                        existing.status = EnrollmentStatus::Enrolled;
                        let progress = existing.progress_percentage;
                        existing.apply_progress(progress, settlement.at);
                    }
                    write_enrollment(&mut tx, &existing).await?;
                    (existing, false)
                }
                None => {
                    let created = insert_enrollment_in(
                        &mut tx,
                        NewEnrollment {
                            user_id: payment.student_id,
                            course_id: payment.course_id,
                            amount_paid: payment.amount,
                            enrolled_at: settlement.at,
                        },
                    )
                    .await?;
                    (created, true)
                }
            };
        tx.commit().await?;

        Ok(SettlementOutcome {
            payment,
            enrollment: Some(enrollment),
            enrollment_created,
        })
    }

    async fn refund(
        &self,
        id: PaymentId,
        refunded_by: UserId,
        at: DateTime<Utc>,
    ) -> Result<RefundOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut payment = payment_in(&mut tx, id).await?;
        let from = payment.status;
        payment.status = from.transition(PaymentStatus::Refunded)?;
        payment.verified_at = Some(at);
        payment.verified_by = Some(refunded_by);
        guarded_status_update(&mut tx, &payment, from).await?;

        let enrollment =
            match enrollment_for_in(&mut tx, payment.student_id, payment.course_id).await? {
                Some(mut enrollment) => {
                    enrollment.status = EnrollmentStatus::Dropped;
                    write_enrollment(&mut tx, &enrollment).await?;
                    Some(enrollment)
                }
                None => None,
            };
        tx.commit().await?;

        Ok(RefundOutcome {
            payment,
            enrollment,
        })
    }
}
