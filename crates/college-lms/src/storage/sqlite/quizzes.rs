use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::{decode_count, decode_label, decode_time, encode_time, SqliteStore};
use crate::ids::{AnswerOptionId, AttemptId, CourseId, QuestionId, QuizId, ResponseId, UserId};
use crate::quizzes::{
    AnswerOption, NewAttempt, NewQuiz, Question, QuestionKind, Quiz, QuizAttempt, QuizRepository,
    QuizResponse,
};
use crate::storage::RepositoryError;

const ATTEMPT_COLUMNS: &str =
    "id, quiz_id, user_id, score, total_points, percentage, passed, submitted_at";
const RESPONSE_COLUMNS: &str = "id, attempt_id, question_id, answer_id, answer_text, is_correct, \
     points_earned, needs_review";

fn response_from_row(row: &SqliteRow) -> Result<QuizResponse, RepositoryError> {
    Ok(QuizResponse {
        id: ResponseId(row.try_get("id")?),
        attempt_id: AttemptId(row.try_get("attempt_id")?),
        question_id: QuestionId(row.try_get("question_id")?),
        answer_id: row.try_get::<Option<i64>, _>("answer_id")?.map(AnswerOptionId),
        answer_text: row.try_get("answer_text")?,
        is_correct: row.try_get("is_correct")?,
        points_earned: decode_count(row.try_get("points_earned")?)?,
        needs_review: row.try_get("needs_review")?,
    })
}

fn attempt_from_row(
    row: &SqliteRow,
    responses: Vec<QuizResponse>,
) -> Result<QuizAttempt, RepositoryError> {
    Ok(QuizAttempt {
        id: AttemptId(row.try_get("id")?),
        quiz_id: QuizId(row.try_get("quiz_id")?),
        user_id: UserId(row.try_get("user_id")?),
        score: decode_count(row.try_get("score")?)?,
        total_points: decode_count(row.try_get("total_points")?)?,
        percentage: row.try_get("percentage")?,
        passed: row.try_get("passed")?,
        submitted_at: decode_time(row.try_get::<&str, _>("submitted_at")?)?,
        responses,
    })
}

async fn load_quiz(
    conn: &mut SqliteConnection,
    id: QuizId,
) -> Result<Option<Quiz>, RepositoryError> {
    let Some(row) = sqlx::query(
        "SELECT id, course_id, title, passing_score, max_attempts FROM quizzes WHERE id = ?",
    )
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };

    let mut options: BTreeMap<QuestionId, Vec<AnswerOption>> = BTreeMap::new();
    let option_rows = sqlx::query(
        "SELECT o.id, o.question_id, o.text, o.is_correct FROM answer_options o \
         JOIN questions q ON q.id = o.question_id WHERE q.quiz_id = ? ORDER BY o.id",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?;
    for option_row in &option_rows {
        let question_id = QuestionId(option_row.try_get("question_id")?);
        options.entry(question_id).or_default().push(AnswerOption {
            id: AnswerOptionId(option_row.try_get("id")?),
            question_id,
            text: option_row.try_get("text")?,
            is_correct: option_row.try_get("is_correct")?,
        });
    }

    let question_rows = sqlx::query(
        "SELECT id, kind, prompt, points, position FROM questions \
         WHERE quiz_id = ? ORDER BY position, id",
    )
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?;
    let mut questions = Vec::with_capacity(question_rows.len());
    for question_row in &question_rows {
        let question_id = QuestionId(question_row.try_get("id")?);
        questions.push(Question {
            id: question_id,
            quiz_id: id,
            kind: decode_label(
                question_row.try_get::<&str, _>("kind")?,
                QuestionKind::from_label,
            )?,
            prompt: question_row.try_get("prompt")?,
            points: decode_count(question_row.try_get("points")?)?,
            position: decode_count(question_row.try_get("position")?)?,
            options: options.remove(&question_id).unwrap_or_default(),
        });
    }

    let passing_score = decode_count(row.try_get("passing_score")?)?;
    Ok(Some(Quiz {
        id,
        course_id: CourseId(row.try_get("course_id")?),
        title: row.try_get("title")?,
        passing_score: passing_score.min(100) as u8,
        max_attempts: row
            .try_get::<Option<i64>, _>("max_attempts")?
            .map(decode_count)
            .transpose()?,
        questions,
    }))
}

async fn load_attempt(
    conn: &mut SqliteConnection,
    id: AttemptId,
) -> Result<Option<QuizAttempt>, RepositoryError> {
    let Some(row) = sqlx::query(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE id = ?"
    ))
    .bind(id.0)
    .fetch_optional(&mut *conn)
    .await?
    else {
        return Ok(None);
    };
    let responses = sqlx::query(&format!(
        "SELECT {RESPONSE_COLUMNS} FROM quiz_responses WHERE attempt_id = ? ORDER BY id"
    ))
    .bind(id.0)
    .fetch_all(&mut *conn)
    .await?
    .iter()
    .map(response_from_row)
    .collect::<Result<Vec<_>, _>>()?;
    attempt_from_row(&row, responses).map(Some)
}

#[async_trait]
impl QuizRepository for SqliteStore {
    async fn insert_quiz(&self, quiz: NewQuiz) -> Result<Quiz, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let quiz_id = sqlx::query(
            "INSERT INTO quizzes (course_id, title, passing_score, max_attempts) VALUES (?, ?, ?, ?)",
        )
        .bind(quiz.course_id.0)
        .bind(&quiz.title)
        .bind(i64::from(quiz.passing_score))
        .bind(quiz.max_attempts.map(i64::from))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for (index, question) in quiz.questions.iter().enumerate() {
            let question_id = sqlx::query(
                "INSERT INTO questions (quiz_id, kind, prompt, points, position) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(quiz_id)
            .bind(question.kind.label())
            .bind(&question.prompt)
            .bind(i64::from(question.points))
            .bind(index as i64 + 1)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            for option in &question.options {
                sqlx::query(
                    "INSERT INTO answer_options (question_id, text, is_correct) VALUES (?, ?, ?)",
                )
                .bind(question_id)
                .bind(&option.text)
                .bind(option.is_correct)
                .execute(&mut *tx)
                .await?;
            }
        }

        let stored = load_quiz(&mut tx, QuizId(quiz_id))
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn quiz(&self, id: QuizId) -> Result<Option<Quiz>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_quiz(&mut conn, id).await
    }

    async fn insert_attempt(
        &self,
        attempt: NewAttempt,
        max_attempts: Option<u32>,
    ) -> Result<QuizAttempt, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        // The count and the insert are one statement, so concurrent submissions
        // cannot both slip under the limit.
        let result = sqlx::query(
            "INSERT INTO quiz_attempts (quiz_id, user_id, score, total_points, percentage, passed, submitted_at) \
             SELECT ?, ?, ?, ?, ?, ?, ? \
             WHERE ? IS NULL OR (SELECT COUNT(*) FROM quiz_attempts WHERE quiz_id = ? AND user_id = ?) < ?",
        )
        .bind(attempt.quiz_id.0)
        .bind(attempt.user_id.0)
        .bind(i64::from(attempt.score))
        .bind(i64::from(attempt.total_points))
        .bind(attempt.percentage)
        .bind(attempt.passed)
        .bind(encode_time(attempt.submitted_at))
        .bind(max_attempts.map(i64::from))
        .bind(attempt.quiz_id.0)
        .bind(attempt.user_id.0)
        .bind(max_attempts.map(i64::from))
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::LimitReached(max_attempts.unwrap_or_default()));
        }
        let attempt_id = AttemptId(result.last_insert_rowid());

        for response in &attempt.responses {
            sqlx::query(
                "INSERT INTO quiz_responses (attempt_id, question_id, answer_id, answer_text, \
                 is_correct, points_earned, needs_review) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(attempt_id.0)
            .bind(response.question_id.0)
            .bind(response.answer_id.map(|option| option.0))
            .bind(response.answer_text.as_deref())
            .bind(response.is_correct)
            .bind(i64::from(response.points_earned))
            .bind(response.needs_review)
            .execute(&mut *tx)
            .await?;
        }

        let stored = load_attempt(&mut tx, attempt_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn attempt(&self, id: AttemptId) -> Result<Option<QuizAttempt>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_attempt(&mut conn, id).await
    }

    async fn response(&self, id: ResponseId) -> Result<Option<QuizResponse>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {RESPONSE_COLUMNS} FROM quiz_responses WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(response_from_row).transpose()
    }

    async fn update_attempt(&self, attempt: &QuizAttempt) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE quiz_attempts SET score = ?, percentage = ?, passed = ? WHERE id = ?",
        )
        .bind(i64::from(attempt.score))
        .bind(attempt.percentage)
        .bind(attempt.passed)
        .bind(attempt.id.0)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        for response in &attempt.responses {
            sqlx::query(
                "UPDATE quiz_responses SET is_correct = ?, points_earned = ?, needs_review = ? \
                 WHERE id = ? AND attempt_id = ?",
            )
            .bind(response.is_correct)
            .bind(i64::from(response.points_earned))
            .bind(response.needs_review)
            .bind(response.id.0)
            .bind(attempt.id.0)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
