use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AnswerOptionId, AttemptId, CourseId, QuestionId, QuizId, ResponseId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

impl QuestionKind {
    pub const fn label(self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice => "multiple_choice",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::ShortAnswer => "short_answer",
        }
    }

    pub fn from_label(raw: &str) -> Option<Self> {
        match raw {
            "multiple_choice" => Some(QuestionKind::MultipleChoice),
            "true_false" => Some(QuestionKind::TrueFalse),
            "short_answer" => Some(QuestionKind::ShortAnswer),
            _ => None,
        }
    }

    pub const fn is_auto_graded(self) -> bool {
        !matches!(self, QuestionKind::ShortAnswer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: AnswerOptionId,
    pub question_id: QuestionId,
    pub text: String,
    #[serde(skip_serializing)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub quiz_id: QuizId,
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: u32,
    pub position: u32,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub course_id: CourseId,
    pub title: String,
    /// Minimum percentage required to pass, 0..=100.
    pub passing_score: u8,
    pub max_attempts: Option<u32>,
    pub questions: Vec<Question>,
}

impl Quiz {
    pub fn total_points(&self) -> u32 {
        self.questions
            .iter()
            .fold(0u32, |total, q| total.saturating_add(q.points))
    }

    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAnswerOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewQuestion {
    pub kind: QuestionKind,
    pub prompt: String,
    pub points: u32,
    #[serde(default)]
    pub options: Vec<NewAnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewQuiz {
    pub course_id: CourseId,
    pub title: String,
    pub passing_score: u8,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    pub questions: Vec<NewQuestion>,
}

/// A learner's answer before grading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmittedAnswer {
    Choice(AnswerOptionId),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: ResponseId,
    pub attempt_id: AttemptId,
    pub question_id: QuestionId,
    pub answer_id: Option<AnswerOptionId>,
    pub answer_text: Option<String>,
    pub is_correct: bool,
    pub points_earned: u32,
    /// Short answers wait here until staff grade them.
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub score: u32,
    pub total_points: u32,
    pub percentage: f64,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
    pub responses: Vec<QuizResponse>,
}

impl QuizAttempt {
    pub fn pending_review(&self) -> usize {
        self.responses.iter().filter(|r| r.needs_review).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResponse {
    pub question_id: QuestionId,
    pub answer_id: Option<AnswerOptionId>,
    pub answer_text: Option<String>,
    pub is_correct: bool,
    pub points_earned: u32,
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttempt {
    pub quiz_id: QuizId,
    pub user_id: UserId,
    pub score: u32,
    pub total_points: u32,
    pub percentage: f64,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
    pub responses: Vec<NewResponse>,
}
