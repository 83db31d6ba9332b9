//! Quizzes and the auto-grading routine.

pub mod domain;
pub mod grading;
pub mod repository;
pub mod router;
pub mod service;

pub use domain::{
    AnswerOption, NewAnswerOption, NewAttempt, NewQuestion, NewQuiz, NewResponse, Question,
    QuestionKind, Quiz, QuizAttempt, QuizResponse, SubmittedAnswer,
};
pub use grading::{grade, percentage, summarize, GradedQuiz, ScoreSummary};
pub use repository::QuizRepository;
pub use router::quiz_router;
pub use service::{QuizError, QuizService, MAX_QUESTIONS, MAX_QUESTION_POINTS};
