//! Persistence backends shared by every workflow area.
//!
//! Each area declares its own repository trait next to its service; both
//! [`MemoryStore`] and [`SqliteStore`] implement all of them so a single store
//! handle can back every service.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::accounts::AccountRepository;
use crate::assignments::AssignmentRepository;
use crate::catalog::CourseRepository;
use crate::certificates::CertificateRepository;
use crate::enrollments::EnrollmentRepository;
use crate::payments::PaymentRepository;
use crate::quizzes::QuizRepository;

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("illegal status change from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
    #[error("attempt limit of {0} reached")]
    LimitReached(u32),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Failures caused by the backend rather than by the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_))
    }
}

/// Every repository trait the services need, implemented by one backend.
pub trait LmsStore:
    AccountRepository
    + AssignmentRepository
    + CourseRepository
    + CertificateRepository
    + EnrollmentRepository
    + PaymentRepository
    + QuizRepository
    + 'static
{
}

impl<T> LmsStore for T where
    T: AccountRepository
        + AssignmentRepository
        + CourseRepository
        + CertificateRepository
        + EnrollmentRepository
        + PaymentRepository
        + QuizRepository
        + 'static
{
}
