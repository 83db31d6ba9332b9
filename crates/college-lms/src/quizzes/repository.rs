use async_trait::async_trait;

use super::domain::{NewAttempt, NewQuiz, Quiz, QuizAttempt, QuizResponse};
use crate::ids::{AttemptId, QuizId, ResponseId};
use crate::storage::RepositoryError;

#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn insert_quiz(&self, quiz: NewQuiz) -> Result<Quiz, RepositoryError>;
    /// Loads the quiz with its questions and answer options in position order.
    async fn quiz(&self, id: QuizId) -> Result<Option<Quiz>, RepositoryError>;
    /// Stores an attempt and its responses. With a limit, fails with
    /// `LimitReached` when the user already used every attempt; the check and
    /// the insert are atomic.
    async fn insert_attempt(
        &self,
        attempt: NewAttempt,
        max_attempts: Option<u32>,
    ) -> Result<QuizAttempt, RepositoryError>;
    async fn attempt(&self, id: AttemptId) -> Result<Option<QuizAttempt>, RepositoryError>;
    async fn response(&self, id: ResponseId) -> Result<Option<QuizResponse>, RepositoryError>;
    /// Persists score totals and every response's grading fields.
    async fn update_attempt(&self, attempt: &QuizAttempt) -> Result<(), RepositoryError>;
}
