use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{Certificate, NewCertificate};
use crate::ids::{CertificateId, EnrollmentId};
use crate::storage::RepositoryError;

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Assigns the certificate number; `Conflict` when the enrollment already
    /// holds a certificate or the code collides.
    async fn insert_certificate(
        &self,
        certificate: NewCertificate,
    ) -> Result<Certificate, RepositoryError>;
    async fn certificate(&self, id: CertificateId) -> Result<Option<Certificate>, RepositoryError>;
    async fn certificate_for_enrollment(
        &self,
        enrollment: EnrollmentId,
    ) -> Result<Option<Certificate>, RepositoryError>;
    async fn certificate_by_code(&self, code: &str)
        -> Result<Option<Certificate>, RepositoryError>;
    /// `InvalidTransition` when the certificate is already revoked.
    async fn revoke_certificate(
        &self,
        id: CertificateId,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Certificate, RepositoryError>;
}
