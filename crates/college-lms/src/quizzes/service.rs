use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use super::domain::{
    NewAttempt, NewQuestion, NewQuiz, QuestionKind, Quiz, QuizAttempt, SubmittedAnswer,
};
use super::grading::{grade, summarize};
use super::repository::QuizRepository;
use crate::catalog::CourseRepository;
use crate::enrollments::EnrollmentRepository;
use crate::ids::{AnswerOptionId, QuestionId, QuizId, ResponseId, UserId};
use crate::storage::RepositoryError;
use crate::web::UserFacing;

const MAX_SHORT_ANSWER_LEN: usize = 2_000;
pub const MAX_QUESTION_POINTS: u32 = 1_000;
pub const MAX_QUESTIONS: usize = 200;

/// Quiz authoring, submission and manual review of short answers.
pub struct QuizService<S> {
    store: Arc<S>,
}

impl<S> QuizService<S>
where
    S: QuizRepository + CourseRepository + EnrollmentRepository + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn create_quiz(&self, mut quiz: NewQuiz) -> Result<Quiz, QuizError> {
        self.store
            .course(quiz.course_id)
            .await?
            .ok_or(QuizError::UnknownCourse)?;

        quiz.title = quiz.title.trim().to_string();
        if quiz.title.is_empty() {
            return Err(QuizError::Invalid("title is required"));
        }
        if quiz.passing_score > 100 {
            return Err(QuizError::Invalid("passing score must be between 0 and 100"));
        }
        if quiz.max_attempts == Some(0) {
            return Err(QuizError::Invalid("max attempts must be at least one"));
        }
        if quiz.questions.is_empty() {
            return Err(QuizError::Invalid("a quiz needs at least one question"));
        }
        if quiz.questions.len() > MAX_QUESTIONS {
            return Err(QuizError::Invalid("a quiz holds at most 200 questions"));
        }
        for question in &mut quiz.questions {
            question.prompt = question.prompt.trim().to_string();
            validate_question(question)?;
        }

        let quiz = self.store.insert_quiz(quiz).await?;
        info!(quiz = %quiz.id, course = %quiz.course_id, questions = quiz.questions.len(), "quiz created");
        Ok(quiz)
    }

    pub async fn quiz(&self, quiz_id: QuizId) -> Result<Quiz, QuizError> {
        self.store.quiz(quiz_id).await?.ok_or(QuizError::UnknownQuiz)
    }

    /// Grades and stores one submission. `answers` carries the raw form value
    /// per question: an option id for choice questions, free text otherwise.
    pub async fn submit(
        &self,
        user: UserId,
        quiz_id: QuizId,
        answers: BTreeMap<QuestionId, String>,
    ) -> Result<QuizAttempt, QuizError> {
        let quiz = self.quiz(quiz_id).await?;
        self.store
            .enrollment_for(user, quiz.course_id)
            .await?
            .filter(|enrollment| enrollment.status.is_active())
            .ok_or(QuizError::NotEnrolled)?;

        let answers = interpret_answers(&quiz, answers)?;
        let graded = grade(&quiz, &answers);

        let attempt = self
            .store
            .insert_attempt(
                NewAttempt {
                    quiz_id,
                    user_id: user,
                    score: graded.summary.earned,
                    total_points: graded.summary.total,
                    percentage: graded.summary.percentage,
                    passed: graded.summary.passed,
                    submitted_at: Utc::now(),
                    responses: graded.responses,
                },
                quiz.max_attempts,
            )
            .await
            .map_err(|err| match err {
                RepositoryError::LimitReached(max) => QuizError::AttemptsExhausted(max),
                other => QuizError::Repository(other),
            })?;

        info!(
            attempt = %attempt.id,
            quiz = %quiz_id,
            %user,
            percentage = attempt.percentage,
            passed = attempt.passed,
            pending_review = attempt.pending_review(),
            "quiz submitted"
        );
        Ok(attempt)
    }

    /// Manual grading of a short answer; recomputes the attempt totals.
    pub async fn grade_response(
        &self,
        response_id: ResponseId,
        points: u32,
    ) -> Result<QuizAttempt, QuizError> {
        let response = self
            .store
            .response(response_id)
            .await?
            .ok_or(QuizError::UnknownResponse)?;
        let mut attempt = self
            .store
            .attempt(response.attempt_id)
            .await?
            .ok_or(QuizError::UnknownResponse)?;
        let quiz = self.quiz(attempt.quiz_id).await?;
        let question = quiz
            .question(response.question_id)
            .ok_or(QuizError::UnknownResponse)?;
        if question.kind != QuestionKind::ShortAnswer {
            return Err(QuizError::NotReviewable);
        }
        if points > question.points {
            return Err(QuizError::PointsExceedMaximum(question.points));
        }

        for stored in attempt.responses.iter_mut().filter(|r| r.id == response_id) {
            stored.points_earned = points;
            stored.is_correct = points == question.points;
            stored.needs_review = false;
        }
        let earned = attempt
            .responses
            .iter()
            .fold(0u32, |sum, r| sum.saturating_add(r.points_earned));
        let summary = summarize(earned, attempt.total_points, quiz.passing_score);
        attempt.score = summary.earned;
        attempt.percentage = summary.percentage;
        attempt.passed = summary.passed;
        self.store.update_attempt(&attempt).await?;

        info!(
            attempt = %attempt.id,
            response = %response_id,
            points,
            percentage = attempt.percentage,
            "short answer graded"
        );
        Ok(attempt)
    }
}

fn validate_question(question: &NewQuestion) -> Result<(), QuizError> {
    if question.prompt.is_empty() {
        return Err(QuizError::Invalid("every question needs a prompt"));
    }
    if question.points == 0 {
        return Err(QuizError::Invalid("every question must be worth points"));
    }
    if question.points > MAX_QUESTION_POINTS {
        return Err(QuizError::Invalid("a question is worth at most 1000 points"));
    }
    let correct = question.options.iter().filter(|o| o.is_correct).count();
    match question.kind {
        QuestionKind::MultipleChoice if question.options.len() < 2 || correct != 1 => Err(
            QuizError::Invalid("multiple choice needs two or more options and one correct answer"),
        ),
        QuestionKind::TrueFalse if question.options.len() != 2 || correct != 1 => Err(
            QuizError::Invalid("true/false needs exactly two options and one correct answer"),
        ),
        QuestionKind::ShortAnswer if !question.options.is_empty() => {
            Err(QuizError::Invalid("short answers take no options"))
        }
        _ => Ok(()),
    }
}

fn interpret_answers(
    quiz: &Quiz,
    raw: BTreeMap<QuestionId, String>,
) -> Result<BTreeMap<QuestionId, SubmittedAnswer>, QuizError> {
    let mut answers = BTreeMap::new();
    for (question_id, value) in raw {
        let Some(question) = quiz.question(question_id) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        let answer = match question.kind {
            QuestionKind::ShortAnswer => {
                if value.len() > MAX_SHORT_ANSWER_LEN {
                    return Err(QuizError::InvalidAnswer(question_id));
                }
                SubmittedAnswer::Text(value.to_string())
            }
            QuestionKind::MultipleChoice | QuestionKind::TrueFalse => value
                .parse::<AnswerOptionId>()
                .map(SubmittedAnswer::Choice)
                .map_err(|_| QuizError::InvalidAnswer(question_id))?,
        };
        answers.insert(question_id, answer);
    }
    Ok(answers)
}

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("course not found")]
    UnknownCourse,
    #[error("quiz not found")]
    UnknownQuiz,
    #[error("{0}")]
    Invalid(&'static str),
    #[error("you must be enrolled in the course to take this quiz")]
    NotEnrolled,
    #[error("you have used all {0} attempts for this quiz")]
    AttemptsExhausted(u32),
    #[error("the answer to question {0} is not valid")]
    InvalidAnswer(QuestionId),
    #[error("response not found")]
    UnknownResponse,
    #[error("only short answers are graded by hand")]
    NotReviewable,
    #[error("points cannot exceed {0}")]
    PointsExceedMaximum(u32),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl UserFacing for QuizError {
    fn is_internal(&self) -> bool {
        matches!(self, QuizError::Repository(err) if err.is_internal())
    }
}
