//! Learning-management workflows for a training college: course catalog,
//! enrollment and progress, quizzes, assignments, certificates and the payment
//! verification workflow that grants enrollments.
//!
//! Each workflow area exposes a domain module, a storage trait, a service and
//! an axum router. Storage traits are implemented by [`storage::MemoryStore`]
//! and [`storage::SqliteStore`].

pub mod accounts;
pub mod assignments;
pub mod catalog;
pub mod certificates;
pub mod config;
pub mod enrollments;
pub mod error;
pub mod ids;
pub mod notifications;
pub mod payments;
pub mod quizzes;
pub mod storage;
pub mod telemetry;
pub mod web;
