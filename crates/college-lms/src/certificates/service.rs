use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{verification_code, Certificate, NewCertificate};
use super::repository::CertificateRepository;
use crate::catalog::CourseRepository;
use crate::enrollments::{EnrollmentRepository, EnrollmentStatus};
use crate::ids::{CertificateId, EnrollmentId};
use crate::notifications::{dispatch_logged, EmailTemplate, Notification, NotificationDispatcher};
use crate::storage::RepositoryError;
use crate::web::UserFacing;

pub struct CertificateService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
}

impl<S, N> CertificateService<S, N>
where
    S: CertificateRepository + EnrollmentRepository + CourseRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self { store, notifier }
    }

    /// Issues the certificate for a completed enrollment, or returns the one
    /// already on file.
    pub async fn issue(&self, enrollment_id: EnrollmentId) -> Result<Certificate, CertificateError> {
        let enrollment = self
            .store
            .enrollment(enrollment_id)
            .await?
            .ok_or(CertificateError::UnknownEnrollment)?;
        if enrollment.status != EnrollmentStatus::Completed {
            return Err(CertificateError::NotCompleted);
        }
        if let Some(existing) = self.store.certificate_for_enrollment(enrollment_id).await? {
            return Ok(existing);
        }

        let inserted = self
            .store
            .insert_certificate(NewCertificate {
                enrollment_id,
                user_id: enrollment.user_id,
                course_id: enrollment.course_id,
                verification_code: verification_code(),
                issued_at: Utc::now(),
            })
            .await;
        let certificate = match inserted {
            Ok(certificate) => certificate,
            Err(RepositoryError::Conflict(_)) => self
                .store
                .certificate_for_enrollment(enrollment_id)
                .await?
                .ok_or(CertificateError::Repository(RepositoryError::NotFound))?,
            Err(other) => return Err(other.into()),
        };

        info!(
            certificate = %certificate.id,
            number = %certificate.certificate_number,
            enrollment = %enrollment_id,
            "certificate issued"
        );

        let course_title = self
            .store
            .course(enrollment.course_id)
            .await?
            .map(|course| course.title)
            .unwrap_or_default();
        dispatch_logged(
            self.notifier.as_ref(),
            Notification::new(EmailTemplate::CertificateIssued, certificate.user_id)
                .with("course", course_title)
                .with("certificate_number", &certificate.certificate_number)
                .with("verification_code", &certificate.verification_code),
        );

        Ok(certificate)
    }

    /// Public lookup by code. Revoked certificates read as not found.
    pub async fn verify(&self, code: &str) -> Result<Certificate, CertificateError> {
        let code = code.trim().to_ascii_uppercase();
        if code.is_empty() {
            return Err(CertificateError::NotFound);
        }
        self.store
            .certificate_by_code(&code)
            .await?
            .filter(|certificate| !certificate.is_revoked())
            .ok_or(CertificateError::NotFound)
    }

    pub async fn revoke(
        &self,
        certificate_id: CertificateId,
        reason: &str,
    ) -> Result<Certificate, CertificateError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CertificateError::ReasonRequired);
        }
        let certificate = self
            .store
            .revoke_certificate(certificate_id, reason, Utc::now())
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => CertificateError::NotFound,
                RepositoryError::InvalidTransition { .. } => CertificateError::AlreadyRevoked,
                other => CertificateError::Repository(other),
            })?;
        info!(certificate = %certificate.id, reason, "certificate revoked");
        Ok(certificate)
    }

    pub async fn certificate(
        &self,
        certificate_id: CertificateId,
    ) -> Result<Certificate, CertificateError> {
        self.store
            .certificate(certificate_id)
            .await?
            .ok_or(CertificateError::NotFound)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("enrollment not found")]
    UnknownEnrollment,
    #[error("the course has not been completed yet")]
    NotCompleted,
    #[error("certificate not found")]
    NotFound,
    #[error("a revocation reason is required")]
    ReasonRequired,
    #[error("certificate is already revoked")]
    AlreadyRevoked,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl UserFacing for CertificateError {
    fn is_internal(&self) -> bool {
        matches!(self, CertificateError::Repository(err) if err.is_internal())
    }
}
