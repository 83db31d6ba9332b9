use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::{CertificateId, CourseId, EnrollmentId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub enrollment_id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub certificate_number: String,
    pub verification_code: String,
    pub issued_at: DateTime<Utc>,
    pub verified: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revocation_reason: Option<String>,
}

impl Certificate {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some() || !self.verified
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub enrollment_id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub verification_code: String,
    pub issued_at: DateTime<Utc>,
}

/// `CERT-<year>-<id>`; the numeric part is the row id, so numbers never repeat.
pub fn certificate_number(issued_at: DateTime<Utc>, id: CertificateId) -> String {
    format!("CERT-{}-{:06}", issued_at.year(), id.0)
}

/// Sixteen uppercase hex characters drawn from a v4 UUID.
pub fn verification_code() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    raw[..16].to_ascii_uppercase()
}

/// What the public verification page is allowed to show.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateVerification {
    pub valid: bool,
    pub certificate_number: String,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub issued_at: DateTime<Utc>,
}

impl From<&Certificate> for CertificateVerification {
    fn from(certificate: &Certificate) -> Self {
        Self {
            valid: !certificate.is_revoked(),
            certificate_number: certificate.certificate_number.clone(),
            user_id: certificate.user_id,
            course_id: certificate.course_id,
            issued_at: certificate.issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn numbers_embed_year_and_padded_id() {
        let issued = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).single().expect("valid");
        assert_eq!(certificate_number(issued, CertificateId(42)), "CERT-2026-000042");
    }

    #[test]
    fn verification_codes_are_uppercase_hex() {
        let code = verification_code();
        assert_eq!(code.len(), 16);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_ne!(code, verification_code());
    }
}
