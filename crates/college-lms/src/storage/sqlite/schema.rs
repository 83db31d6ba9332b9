//! Relational schema, applied idempotently by [`super::SqliteStore::migrate`].
//!
//! Money is stored as decimal TEXT and timestamps as RFC 3339 TEXT in UTC so
//! that lexical order matches chronological order.

pub const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL,
    email_verified_at TEXT,
    verification_token TEXT UNIQUE,
    created_at TEXT NOT NULL
)"#;

pub const CREATE_COURSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL DEFAULT '',
    price TEXT NOT NULL,
    currency TEXT NOT NULL,
    published INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
)"#;

pub const CREATE_LESSONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS lessons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL REFERENCES courses(id),
    title TEXT NOT NULL,
    position INTEGER NOT NULL
)"#;

pub const CREATE_ENROLLMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS enrollments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    course_id INTEGER NOT NULL REFERENCES courses(id),
    status TEXT NOT NULL,
    progress_percentage INTEGER NOT NULL DEFAULT 0,
    amount_paid TEXT NOT NULL,
    enrolled_at TEXT NOT NULL,
    completed_at TEXT,
    UNIQUE (user_id, course_id)
)"#;

pub const CREATE_LESSON_COMPLETIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS lesson_completions (
    enrollment_id INTEGER NOT NULL REFERENCES enrollments(id),
    lesson_id INTEGER NOT NULL REFERENCES lessons(id),
    completed_at TEXT NOT NULL,
    PRIMARY KEY (enrollment_id, lesson_id)
)"#;

pub const CREATE_PAYMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id INTEGER NOT NULL,
    course_id INTEGER NOT NULL REFERENCES courses(id),
    amount TEXT NOT NULL,
    currency TEXT NOT NULL,
    method TEXT NOT NULL,
    status TEXT NOT NULL,
    transaction_reference TEXT NOT NULL,
    created_at TEXT NOT NULL,
    verified_at TEXT,
    verified_by INTEGER,
    note TEXT
)"#;

pub const CREATE_QUIZZES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS quizzes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL REFERENCES courses(id),
    title TEXT NOT NULL,
    passing_score INTEGER NOT NULL,
    max_attempts INTEGER
)"#;

pub const CREATE_QUESTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id INTEGER NOT NULL REFERENCES quizzes(id),
    kind TEXT NOT NULL,
    prompt TEXT NOT NULL,
    points INTEGER NOT NULL,
    position INTEGER NOT NULL
)"#;

pub const CREATE_ANSWER_OPTIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS answer_options (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    question_id INTEGER NOT NULL REFERENCES questions(id),
    text TEXT NOT NULL,
    is_correct INTEGER NOT NULL DEFAULT 0
)"#;

pub const CREATE_QUIZ_ATTEMPTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS quiz_attempts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    quiz_id INTEGER NOT NULL REFERENCES quizzes(id),
    user_id INTEGER NOT NULL,
    score INTEGER NOT NULL,
    total_points INTEGER NOT NULL,
    percentage REAL NOT NULL,
    passed INTEGER NOT NULL,
    submitted_at TEXT NOT NULL
)"#;

pub const CREATE_QUIZ_RESPONSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS quiz_responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id INTEGER NOT NULL REFERENCES quiz_attempts(id),
    question_id INTEGER NOT NULL REFERENCES questions(id),
    answer_id INTEGER,
    answer_text TEXT,
    is_correct INTEGER NOT NULL,
    points_earned INTEGER NOT NULL,
    needs_review INTEGER NOT NULL
)"#;

pub const CREATE_ASSIGNMENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS assignments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    course_id INTEGER NOT NULL REFERENCES courses(id),
    title TEXT NOT NULL,
    max_points INTEGER NOT NULL,
    due_at TEXT
)"#;

pub const CREATE_SUBMISSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    assignment_id INTEGER NOT NULL REFERENCES assignments(id),
    user_id INTEGER NOT NULL,
    content TEXT NOT NULL,
    submitted_at TEXT NOT NULL,
    late INTEGER NOT NULL,
    status TEXT NOT NULL,
    score INTEGER,
    feedback TEXT,
    UNIQUE (assignment_id, user_id)
)"#;

pub const CREATE_CERTIFICATES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS certificates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    enrollment_id INTEGER NOT NULL UNIQUE REFERENCES enrollments(id),
    user_id INTEGER NOT NULL,
    course_id INTEGER NOT NULL,
    certificate_number TEXT UNIQUE,
    verification_code TEXT NOT NULL UNIQUE,
    issued_at TEXT NOT NULL,
    verified INTEGER NOT NULL DEFAULT 1,
    revoked_at TEXT,
    revocation_reason TEXT
)"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_lessons_course ON lessons(course_id, position)",
    "CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_payments_student_course ON payments(student_id, course_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_one_pending ON payments(student_id, course_id) \
     WHERE status = 'pending'",
    "CREATE INDEX IF NOT EXISTS idx_attempts_quiz_user ON quiz_attempts(quiz_id, user_id)",
];

/// Creation order respects foreign keys.
pub const TABLES: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_COURSES_TABLE,
    CREATE_LESSONS_TABLE,
    CREATE_ENROLLMENTS_TABLE,
    CREATE_LESSON_COMPLETIONS_TABLE,
    CREATE_PAYMENTS_TABLE,
    CREATE_QUIZZES_TABLE,
    CREATE_QUESTIONS_TABLE,
    CREATE_ANSWER_OPTIONS_TABLE,
    CREATE_QUIZ_ATTEMPTS_TABLE,
    CREATE_QUIZ_RESPONSES_TABLE,
    CREATE_ASSIGNMENTS_TABLE,
    CREATE_SUBMISSIONS_TABLE,
    CREATE_CERTIFICATES_TABLE,
];
