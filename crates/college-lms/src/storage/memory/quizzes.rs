use async_trait::async_trait;

use super::MemoryStore;
use crate::ids::{AnswerOptionId, AttemptId, QuestionId, QuizId, ResponseId};
use crate::quizzes::{
    AnswerOption, NewAttempt, NewQuiz, Question, Quiz, QuizAttempt, QuizRepository, QuizResponse,
};
use crate::storage::RepositoryError;

#[async_trait]
impl QuizRepository for MemoryStore {
    async fn insert_quiz(&self, quiz: NewQuiz) -> Result<Quiz, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.courses.contains_key(&quiz.course_id) {
            return Err(RepositoryError::NotFound);
        }
        let quiz_id = QuizId(tables.next_id("quizzes"));
        let mut questions = Vec::with_capacity(quiz.questions.len());
        for (index, question) in quiz.questions.into_iter().enumerate() {
            let question_id = QuestionId(tables.next_id("questions"));
            let options = question
                .options
                .into_iter()
                .map(|option| AnswerOption {
                    id: AnswerOptionId(tables.next_id("answer_options")),
                    question_id,
                    text: option.text,
                    is_correct: option.is_correct,
                })
                .collect();
            questions.push(Question {
                id: question_id,
                quiz_id,
                kind: question.kind,
                prompt: question.prompt,
                points: question.points,
                position: index as u32 + 1,
                options,
            });
        }
        let record = Quiz {
            id: quiz_id,
            course_id: quiz.course_id,
            title: quiz.title,
            passing_score: quiz.passing_score,
            max_attempts: quiz.max_attempts,
            questions,
        };
        tables.quizzes.insert(quiz_id, record.clone());
        Ok(record)
    }

    async fn quiz(&self, id: QuizId) -> Result<Option<Quiz>, RepositoryError> {
        Ok(self.lock()?.quizzes.get(&id).cloned())
    }

    async fn insert_attempt(
        &self,
        attempt: NewAttempt,
        max_attempts: Option<u32>,
    ) -> Result<QuizAttempt, RepositoryError> {
        let mut tables = self.lock()?;
        if let Some(max) = max_attempts {
            let used = tables
                .attempts
                .values()
                .filter(|prior| prior.quiz_id == attempt.quiz_id && prior.user_id == attempt.user_id)
                .count();
            if used >= max as usize {
                return Err(RepositoryError::LimitReached(max));
            }
        }

        let id = AttemptId(tables.next_id("quiz_attempts"));
        let responses = attempt
            .responses
            .into_iter()
            .map(|response| QuizResponse {
                id: ResponseId(tables.next_id("quiz_responses")),
                attempt_id: id,
                question_id: response.question_id,
                answer_id: response.answer_id,
                answer_text: response.answer_text,
                is_correct: response.is_correct,
                points_earned: response.points_earned,
                needs_review: response.needs_review,
            })
            .collect();
        let record = QuizAttempt {
            id,
            quiz_id: attempt.quiz_id,
            user_id: attempt.user_id,
            score: attempt.score,
            total_points: attempt.total_points,
            percentage: attempt.percentage,
            passed: attempt.passed,
            submitted_at: attempt.submitted_at,
            responses,
        };
        tables.attempts.insert(id, record.clone());
        Ok(record)
    }

    async fn attempt(&self, id: AttemptId) -> Result<Option<QuizAttempt>, RepositoryError> {
        Ok(self.lock()?.attempts.get(&id).cloned())
    }

    async fn response(&self, id: ResponseId) -> Result<Option<QuizResponse>, RepositoryError> {
        Ok(self
            .lock()?
            .attempts
            .values()
            .flat_map(|attempt| attempt.responses.iter())
            .find(|response| response.id == id)
            .cloned())
    }

    async fn update_attempt(&self, attempt: &QuizAttempt) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let stored = tables
            .attempts
            .get_mut(&attempt.id)
            .ok_or(RepositoryError::NotFound)?;
        stored.score = attempt.score;
        stored.percentage = attempt.percentage;
        stored.passed = attempt.passed;
        for response in &attempt.responses {
            if let Some(target) = stored.responses.iter_mut().find(|r| r.id == response.id) {
                target.is_correct = response.is_correct;
                target.points_earned = response.points_earned;
                target.needs_review = response.needs_review;
            }
        }
        Ok(())
    }
}
