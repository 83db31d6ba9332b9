//! Completion certificates: issuance, public verification and revocation.
//!
//! Verification is a lookup of the stored code; codes are not signed.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    certificate_number, verification_code, Certificate, CertificateVerification, NewCertificate,
};
pub use repository::CertificateRepository;
pub use router::certificate_router;
pub use service::{CertificateError, CertificateService};
