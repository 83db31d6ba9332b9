//! Process-local store used by tests, the demo walkthrough and servers started
//! without `DATABASE_URL`.
//!
//! All tables sit behind one mutex, so every repository call (including the
//! multi-row settle and refund operations) observes and mutates a consistent
//! snapshot.

mod accounts;
mod assignments;
mod catalog;
mod certificates;
mod enrollments;
mod payments;
mod quizzes;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::accounts::User;
use crate::assignments::{Assignment, Submission};
use crate::catalog::{Course, Lesson};
use crate::certificates::Certificate;
use crate::enrollments::Enrollment;
use crate::ids::{
    AssignmentId, AttemptId, CertificateId, CourseId, EnrollmentId, LessonId, PaymentId, QuizId,
    SubmissionId, UserId,
};
use crate::payments::Payment;
use crate::quizzes::{Quiz, QuizAttempt};
use crate::storage::RepositoryError;

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

#[derive(Debug, Default)]
pub(super) struct Tables {
    sequences: BTreeMap<&'static str, i64>,
    users: BTreeMap<UserId, User>,
    courses: BTreeMap<CourseId, Course>,
    lessons: BTreeMap<LessonId, Lesson>,
    lesson_completions: BTreeMap<(EnrollmentId, LessonId), DateTime<Utc>>,
    payments: BTreeMap<PaymentId, Payment>,
    enrollments: BTreeMap<EnrollmentId, Enrollment>,
    quizzes: BTreeMap<QuizId, Quiz>,
    attempts: BTreeMap<AttemptId, QuizAttempt>,
    assignments: BTreeMap<AssignmentId, Assignment>,
    submissions: BTreeMap<SubmissionId, Submission>,
    certificates: BTreeMap<CertificateId, Certificate>,
}

impl Tables {
    /// Autoincrement per table, starting at 1.
    fn next_id(&mut self, table: &'static str) -> i64 {
        let next = self.sequences.entry(table).or_insert(0);
        *next += 1;
        *next
    }

    fn enrollment_for_mut(
        &mut self,
        user: UserId,
        course: CourseId,
    ) -> Option<&mut Enrollment> {
        self.enrollments
            .values_mut()
            .find(|enrollment| enrollment.user_id == user && enrollment.course_id == course)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store lock poisoned".to_string()))
    }
}
