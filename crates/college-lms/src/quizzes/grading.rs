//! Scoring of a single submission against the stored answer keys.

use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{NewResponse, Question, Quiz, SubmittedAnswer};
use crate::ids::QuestionId;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub earned: u32,
    pub total: u32,
    pub percentage: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GradedQuiz {
    pub responses: Vec<NewResponse>,
    pub summary: ScoreSummary,
}

/// earned / total * 100, clamped to 0..=100 and rounded to two decimals.
pub fn percentage(earned: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = (f64::from(earned) / f64::from(total) * 100.0).clamp(0.0, 100.0);
    (raw * 100.0).round() / 100.0
}

pub fn summarize(earned: u32, total: u32, passing_score: u8) -> ScoreSummary {
    let percentage = percentage(earned, total);
    ScoreSummary {
        earned,
        total,
        percentage,
        passed: percentage >= f64::from(passing_score),
    }
}

/// Grades every answered question. Unanswered questions still count toward
/// the total. Short answers earn nothing until staff review them.
pub fn grade(quiz: &Quiz, answers: &BTreeMap<QuestionId, SubmittedAnswer>) -> GradedQuiz {
    let mut responses = Vec::with_capacity(answers.len());
    let mut earned: u32 = 0;

    for question in &quiz.questions {
        let Some(answer) = answers.get(&question.id) else {
            continue;
        };
        let response = grade_question(question, answer);
        earned = earned.saturating_add(response.points_earned);
        responses.push(response);
    }

    GradedQuiz {
        responses,
        summary: summarize(earned, quiz.total_points(), quiz.passing_score),
    }
}

fn grade_question(question: &Question, answer: &SubmittedAnswer) -> NewResponse {
    if !question.kind.is_auto_graded() {
        return NewResponse {
            question_id: question.id,
            answer_id: None,
            answer_text: Some(answer_text(answer)),
            is_correct: false,
            points_earned: 0,
            needs_review: true,
        };
    }
    match answer {
        SubmittedAnswer::Choice(option_id) => {
            let is_correct = question
                .options
                .iter()
                .any(|option| option.id == *option_id && option.is_correct);
            NewResponse {
                question_id: question.id,
                answer_id: Some(*option_id),
                answer_text: None,
                is_correct,
                points_earned: if is_correct { question.points } else { 0 },
                needs_review: false,
            }
        }
        SubmittedAnswer::Text(text) => NewResponse {
            question_id: question.id,
            answer_id: None,
            answer_text: Some(text.clone()),
            is_correct: false,
            points_earned: 0,
            needs_review: false,
        },
    }
}

fn answer_text(answer: &SubmittedAnswer) -> String {
    match answer {
        SubmittedAnswer::Text(text) => text.trim().to_string(),
        SubmittedAnswer::Choice(option) => option.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AnswerOptionId, CourseId, QuizId};
    use crate::quizzes::domain::{AnswerOption, QuestionKind};

    fn option(id: i64, question: i64, is_correct: bool) -> AnswerOption {
        AnswerOption {
            id: AnswerOptionId(id),
            question_id: QuestionId(question),
            text: format!("option {id}"),
            is_correct,
        }
    }

    fn question(id: i64, kind: QuestionKind, points: u32, options: Vec<AnswerOption>) -> Question {
        Question {
            id: QuestionId(id),
            quiz_id: QuizId(1),
            kind,
            prompt: format!("question {id}"),
            points,
            position: id as u32,
            options,
        }
    }

    fn quiz(passing_score: u8, questions: Vec<Question>) -> Quiz {
        Quiz {
            id: QuizId(1),
            course_id: CourseId(1),
            title: "Safety basics".to_string(),
            passing_score,
            max_attempts: None,
            questions,
        }
    }

    #[test]
    fn short_answer_pending_review_halves_the_score() {
        let quiz = quiz(
            70,
            vec![
                question(
                    1,
                    QuestionKind::MultipleChoice,
                    5,
                    vec![option(10, 1, false), option(11, 1, true), option(12, 1, false)],
                ),
                question(2, QuestionKind::ShortAnswer, 5, Vec::new()),
            ],
        );
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId(1), SubmittedAnswer::Choice(AnswerOptionId(11)));
        answers.insert(
            QuestionId(2),
            SubmittedAnswer::Text("  Lock out, tag out  ".to_string()),
        );

        let graded = grade(&quiz, &answers);

        assert_eq!(graded.summary.earned, 5);
        assert_eq!(graded.summary.total, 10);
        assert_eq!(graded.summary.percentage, 50.0);
        assert!(!graded.summary.passed);

        let short = &graded.responses[1];
        assert!(short.needs_review);
        assert_eq!(short.points_earned, 0);
        assert_eq!(short.answer_text.as_deref(), Some("Lock out, tag out"));
    }

    #[test]
    fn true_false_is_auto_graded() {
        let quiz = quiz(
            50,
            vec![question(
                1,
                QuestionKind::TrueFalse,
                4,
                vec![option(1, 1, true), option(2, 1, false)],
            )],
        );
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId(1), SubmittedAnswer::Choice(AnswerOptionId(1)));

        let graded = grade(&quiz, &answers);
        assert!(graded.responses[0].is_correct);
        assert_eq!(graded.summary.percentage, 100.0);
        assert!(graded.summary.passed);
    }

    #[test]
    fn options_from_other_questions_earn_nothing() {
        let quiz = quiz(
            50,
            vec![
                question(1, QuestionKind::TrueFalse, 2, vec![option(1, 1, false), option(2, 1, true)]),
                question(2, QuestionKind::TrueFalse, 2, vec![option(3, 2, true), option(4, 2, false)]),
            ],
        );
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId(1), SubmittedAnswer::Choice(AnswerOptionId(3)));

        let graded = grade(&quiz, &answers);
        assert_eq!(graded.responses.len(), 1);
        assert!(!graded.responses[0].is_correct);
        assert_eq!(graded.summary.earned, 0);
        assert_eq!(graded.summary.total, 4, "unanswered questions still count");
    }

    #[test]
    fn huge_point_values_saturate_instead_of_overflowing() {
        let quiz = quiz(
            50,
            vec![
                question(1, QuestionKind::TrueFalse, 3_000_000_000, vec![option(1, 1, true), option(2, 1, false)]),
                question(2, QuestionKind::TrueFalse, 3_000_000_000, vec![option(3, 2, true), option(4, 2, false)]),
            ],
        );
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId(1), SubmittedAnswer::Choice(AnswerOptionId(1)));
        answers.insert(QuestionId(2), SubmittedAnswer::Choice(AnswerOptionId(3)));

        let graded = grade(&quiz, &answers);
        assert_eq!(graded.summary.total, u32::MAX);
        assert_eq!(graded.summary.earned, u32::MAX);
        assert!(graded.summary.passed);
    }

    #[test]
    fn percentage_rounds_and_handles_empty_quizzes() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(12, 10), 100.0);
    }

    #[test]
    fn passing_is_inclusive_of_the_threshold() {
        assert!(summarize(7, 10, 70).passed);
        assert!(!summarize(69, 100, 70).passed);
        assert!(summarize(0, 10, 0).passed);
    }
}
