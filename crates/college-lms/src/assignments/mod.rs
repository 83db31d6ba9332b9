//! Graded coursework submitted as free text.

pub mod domain;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    Assignment, AssignmentDraft, NewAssignment, NewSubmission, Submission, SubmissionStatus,
};
pub use repository::AssignmentRepository;
pub use router::assignment_router;
pub use service::{AssignmentError, AssignmentService};
