use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decode_optional_time, decode_time, encode_time, SqliteStore};
use crate::certificates::{certificate_number, Certificate, CertificateRepository, NewCertificate};
use crate::ids::{CertificateId, CourseId, EnrollmentId, UserId};
use crate::storage::RepositoryError;

const CERTIFICATE_COLUMNS: &str = "id, enrollment_id, user_id, course_id, certificate_number, \
     verification_code, issued_at, verified, revoked_at, revocation_reason";

fn certificate_from_row(row: &SqliteRow) -> Result<Certificate, RepositoryError> {
    Ok(Certificate {
        id: CertificateId(row.try_get("id")?),
        enrollment_id: EnrollmentId(row.try_get("enrollment_id")?),
        user_id: UserId(row.try_get("user_id")?),
        course_id: CourseId(row.try_get("course_id")?),
        certificate_number: row
            .try_get::<Option<String>, _>("certificate_number")?
            .unwrap_or_default(),
        verification_code: row.try_get("verification_code")?,
        issued_at: decode_time(row.try_get::<&str, _>("issued_at")?)?,
        verified: row.try_get("verified")?,
        revoked_at: decode_optional_time(row.try_get("revoked_at")?)?,
        revocation_reason: row.try_get("revocation_reason")?,
    })
}

#[async_trait]
impl CertificateRepository for SqliteStore {
    async fn insert_certificate(
        &self,
        certificate: NewCertificate,
    ) -> Result<Certificate, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = CertificateId(
            sqlx::query(
                "INSERT INTO certificates (enrollment_id, user_id, course_id, verification_code, \
                 issued_at, verified) VALUES (?, ?, ?, ?, ?, 1)",
            )
            .bind(certificate.enrollment_id.0)
            .bind(certificate.user_id.0)
            .bind(certificate.course_id.0)
            .bind(&certificate.verification_code)
            .bind(encode_time(certificate.issued_at))
            .execute(&mut *tx)
            .await?
            .last_insert_rowid(),
        );

        let number = certificate_number(certificate.issued_at, id);
        sqlx::query("UPDATE certificates SET certificate_number = ? WHERE id = ?")
            .bind(&number)
            .bind(id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Certificate {
            id,
            enrollment_id: certificate.enrollment_id,
            user_id: certificate.user_id,
            course_id: certificate.course_id,
            certificate_number: number,
            verification_code: certificate.verification_code,
            issued_at: certificate.issued_at,
            verified: true,
            revoked_at: None,
            revocation_reason: None,
        })
    }

    async fn certificate(&self, id: CertificateId) -> Result<Option<Certificate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(certificate_from_row).transpose()
    }

    async fn certificate_for_enrollment(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<Option<Certificate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE enrollment_id = ?"
        ))
        .bind(enrollment.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(certificate_from_row).transpose()
    }

    async fn certificate_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Certificate>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE verification_code = ?"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(certificate_from_row).transpose()
    }

    async fn revoke_certificate(
        &self,
        id: CertificateId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Certificate, RepositoryError> {
        let result = sqlx::query(
            "UPDATE certificates SET verified = 0, revoked_at = ?, revocation_reason = ? \
             WHERE id = ? AND verified = 1 AND revoked_at IS NULL",
        )
        .bind(encode_time(at))
        .bind(reason)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        let certificate = self
            .certificate(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::InvalidTransition {
                from: "revoked",
                to: "revoked",
            });
        }
        Ok(certificate)
    }
}
