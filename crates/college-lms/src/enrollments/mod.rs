//! Enrollment records and lesson progress tracking.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    progress_percentage, Enrollment, EnrollmentStatus, LessonProgress, NewEnrollment,
};
pub use repository::EnrollmentRepository;
pub use router::enrollment_router;
pub use service::{EnrollmentError, EnrollmentService};
