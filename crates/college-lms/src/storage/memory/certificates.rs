use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryStore;
use crate::certificates::{certificate_number, Certificate, CertificateRepository, NewCertificate};
use crate::ids::{CertificateId, EnrollmentId};
use crate::storage::RepositoryError;

#[async_trait]
impl CertificateRepository for MemoryStore {
    async fn insert_certificate(
        &self,
        certificate: NewCertificate,
    ) -> Result<Certificate, RepositoryError> {
        let mut tables = self.lock()?;
        for existing in tables.certificates.values() {
            if existing.enrollment_id == certificate.enrollment_id {
                return Err(RepositoryError::Conflict(format!(
                    "certificates.enrollment_id {}",
                    certificate.enrollment_id
                )));
            }
            if existing.verification_code == certificate.verification_code {
                return Err(RepositoryError::Conflict(
                    "certificates.verification_code".to_string(),
                ));
            }
        }
        let id = CertificateId(tables.next_id("certificates"));
        let record = Certificate {
            id,
            enrollment_id: certificate.enrollment_id,
            user_id: certificate.user_id,
            course_id: certificate.course_id,
            certificate_number: certificate_number(certificate.issued_at, id),
            verification_code: certificate.verification_code,
            issued_at: certificate.issued_at,
            verified: true,
            revoked_at: None,
            revocation_reason: None,
        };
        tables.certificates.insert(id, record.clone());
        Ok(record)
    }

    async fn certificate(&self, id: CertificateId) -> Result<Option<Certificate>, RepositoryError> {
        Ok(self.lock()?.certificates.get(&id).cloned())
    }

    async fn certificate_for_enrollment(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<Option<Certificate>, RepositoryError> {
        Ok(self
            .lock()?
            .certificates
            .values()
            .find(|certificate| certificate.enrollment_id == enrollment)
            .cloned())
    }

    async fn certificate_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Certificate>, RepositoryError> {
        Ok(self
            .lock()?
            .certificates
            .values()
            .find(|certificate| certificate.verification_code == code)
            .cloned())
    }

    async fn revoke_certificate(
        &self,
        id: CertificateId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Certificate, RepositoryError> {
        let mut tables = self.lock()?;
        let certificate = tables
            .certificates
            .get_mut(&id)
            .ok_or(RepositoryError::NotFound)?;
        if certificate.is_revoked() {
            return Err(RepositoryError::InvalidTransition {
                from: "revoked",
                to: "revoked",
            });
        }
        certificate.verified = false;
        certificate.revoked_at = Some(at);
        certificate.revocation_reason = Some(reason.to_string());
        Ok(certificate.clone())
    }
}
