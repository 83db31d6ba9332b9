use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use college_lms::accounts::{AccountError, AccountService, Registration};
use college_lms::assignments::{AssignmentDraft, AssignmentError, AssignmentService, SubmissionStatus};
use college_lms::catalog::{CatalogError, CatalogService, CourseDraft, LessonDraft};
use college_lms::certificates::{CertificateError, CertificateService};
use college_lms::enrollments::{
    EnrollmentError, EnrollmentRepository, EnrollmentService, EnrollmentStatus,
};
use college_lms::ids::{QuestionId, UserId};
use college_lms::notifications::{EmailTemplate, MemoryOutbox};
use college_lms::quizzes::{
    NewAnswerOption, NewQuestion, NewQuiz, QuestionKind, Quiz, QuizError, QuizService,
    MAX_QUESTION_POINTS,
};
use college_lms::storage::MemoryStore;
use rust_decimal_macros::dec;

struct Campus {
    store: Arc<MemoryStore>,
    outbox: Arc<MemoryOutbox>,
    catalog: CatalogService<MemoryStore>,
    enrollments: EnrollmentService<MemoryStore, MemoryOutbox>,
    certificates: CertificateService<MemoryStore, MemoryOutbox>,
    quizzes: QuizService<MemoryStore>,
    assignments: AssignmentService<MemoryStore>,
}

fn campus() -> Campus {
    let store = Arc::new(MemoryStore::new());
    let outbox = Arc::new(MemoryOutbox::default());
    Campus {
        catalog: CatalogService::new(store.clone(), "GHS"),
        enrollments: EnrollmentService::new(store.clone(), outbox.clone()),
        certificates: CertificateService::new(store.clone(), outbox.clone()),
        quizzes: QuizService::new(store.clone()),
        assignments: AssignmentService::new(store.clone()),
        store,
        outbox,
    }
}

fn draft(slug: &str, price: rust_decimal::Decimal) -> CourseDraft {
    CourseDraft {
        title: format!("Course {slug}"),
        slug: slug.to_string(),
        description: "Hands-on trade training".to_string(),
        price,
        currency: None,
        published: true,
    }
}

fn lesson(title: &str) -> LessonDraft {
    LessonDraft {
        title: title.to_string(),
        position: None,
    }
}

fn option(text: &str, is_correct: bool) -> NewAnswerOption {
    NewAnswerOption {
        text: text.to_string(),
        is_correct,
    }
}

const LEARNER: UserId = UserId(21);

#[tokio::test]
async fn completing_every_lesson_issues_a_verifiable_certificate() {
    let campus = campus();
    let course = campus
        .catalog
        .create_course(draft("workplace-safety", dec!(0)))
        .await
        .expect("course created");
    assert_eq!(course.currency, "GHS");
    let first = campus.catalog.add_lesson(course.id, lesson("Hazards")).await.expect("lesson");
    let second = campus.catalog.add_lesson(course.id, lesson("PPE")).await.expect("lesson");
    let third = campus.catalog.add_lesson(course.id, lesson("Reporting")).await.expect("lesson");
    assert_eq!((first.position, second.position, third.position), (1, 2, 3));

    let enrollment = campus
        .enrollments
        .enroll_free(LEARNER, course.id)
        .await
        .expect("free enrollment");
    assert_eq!(enrollment.status, EnrollmentStatus::Enrolled);

    let progress = campus.enrollments.complete_lesson(LEARNER, first.id).await.expect("progress");
    assert_eq!(progress.enrollment.progress_percentage, 33);
    assert_eq!(progress.enrollment.status, EnrollmentStatus::InProgress);

    let repeat = campus.enrollments.complete_lesson(LEARNER, first.id).await.expect("progress");
    assert!(!repeat.newly_recorded);
    assert_eq!(repeat.enrollment.progress_percentage, 33);

    campus.enrollments.complete_lesson(LEARNER, second.id).await.expect("progress");
    let finished = campus.enrollments.complete_lesson(LEARNER, third.id).await.expect("progress");
    assert_eq!(finished.enrollment.status, EnrollmentStatus::Completed);
    assert!(finished.enrollment.completed_at.is_some());
    let certificate = finished.certificate.expect("certificate issued on completion");
    assert!(certificate.certificate_number.starts_with("CERT-"));

    let reissued = campus.certificates.issue(enrollment.id).await.expect("idempotent issue");
    assert_eq!(reissued.id, certificate.id);

    let lookup = campus
        .certificates
        .verify(&certificate.verification_code.to_lowercase())
        .await
        .expect("verifies");
    assert_eq!(lookup.id, certificate.id);
    let again = campus.certificates.verify(&certificate.verification_code).await.expect("verifies");
    assert_eq!(again, lookup);

    campus
        .certificates
        .revoke(certificate.id, "issued in error")
        .await
        .expect("revoked");
    assert!(matches!(
        campus.certificates.verify(&certificate.verification_code).await,
        Err(CertificateError::NotFound)
    ));
    assert!(matches!(
        campus.certificates.revoke(certificate.id, "again").await,
        Err(CertificateError::AlreadyRevoked)
    ));

    let templates: Vec<EmailTemplate> = campus.outbox.templates();
    assert_eq!(
        templates,
        vec![EmailTemplate::EnrollmentConfirm, EmailTemplate::CertificateIssued]
    );
}

#[tokio::test]
async fn paid_courses_cannot_be_joined_directly_and_dropped_learners_stop_progressing() {
    let campus = campus();
    let paid = campus
        .catalog
        .create_course(draft("welding-1", dec!(1200.50)))
        .await
        .expect("course created");
    assert!(matches!(
        campus.enrollments.enroll_free(LEARNER, paid.id).await,
        Err(EnrollmentError::PaymentRequired)
    ));
    assert!(campus
        .store
        .enrollment_for(LEARNER, paid.id)
        .await
        .expect("lookup")
        .is_none());

    let free = campus
        .catalog
        .create_course(draft("orientation", dec!(0)))
        .await
        .expect("course created");
    let intro = campus.catalog.add_lesson(free.id, lesson("Welcome")).await.expect("lesson");
    campus.enrollments.enroll_free(LEARNER, free.id).await.expect("enrolled");
    assert!(matches!(
        campus.enrollments.enroll_free(LEARNER, free.id).await,
        Err(EnrollmentError::AlreadyEnrolled)
    ));

    let dropped = campus.enrollments.drop_course(LEARNER, free.id).await.expect("dropped");
    assert_eq!(dropped.status, EnrollmentStatus::Dropped);
    assert!(matches!(
        campus.enrollments.complete_lesson(LEARNER, intro.id).await,
        Err(EnrollmentError::NotEnrolled)
    ));

    let rejoined = campus.enrollments.enroll_free(LEARNER, free.id).await.expect("rejoined");
    assert_eq!(rejoined.id, dropped.id, "the (user, course) row is reused");
}

#[tokio::test]
async fn progress_written_from_a_stale_read_cannot_revive_a_drop() {
    let campus = campus();
    let course = campus
        .catalog
        .create_course(draft("first-aid", dec!(0)))
        .await
        .expect("course created");
    campus.catalog.add_lesson(course.id, lesson("Recovery position")).await.expect("lesson");
    campus.enrollments.enroll_free(LEARNER, course.id).await.expect("enrolled");

    let mut stale = campus
        .store
        .enrollment_for(LEARNER, course.id)
        .await
        .expect("lookup")
        .expect("enrollment");
    campus.enrollments.drop_course(LEARNER, course.id).await.expect("dropped");

    stale.apply_progress(100, Utc::now());
    assert!(matches!(
        campus.store.update_enrollment(&stale, EnrollmentStatus::Enrolled).await,
        Err(college_lms::storage::RepositoryError::InvalidTransition { .. })
    ));
    let stored = campus
        .store
        .enrollment_for(LEARNER, course.id)
        .await
        .expect("lookup")
        .expect("enrollment");
    assert_eq!(stored.status, EnrollmentStatus::Dropped);
    assert_eq!(stored.progress_percentage, 0);
}

#[tokio::test]
async fn duplicate_slugs_are_rejected() {
    let campus = campus();
    campus.catalog.create_course(draft("masonry", dec!(10))).await.expect("created");
    assert!(matches!(
        campus.catalog.create_course(draft("Masonry", dec!(10))).await,
        Err(CatalogError::SlugTaken)
    ));
}

async fn safety_quiz(campus: &Campus, max_attempts: Option<u32>) -> Quiz {
    let course = campus
        .catalog
        .create_course(draft("lockout-tagout", dec!(0)))
        .await
        .expect("course created");
    campus.enrollments.enroll_free(LEARNER, course.id).await.expect("enrolled");
    campus
        .quizzes
        .create_quiz(NewQuiz {
            course_id: course.id,
            title: "Lockout/tagout check".to_string(),
            passing_score: 70,
            max_attempts,
            questions: vec![
                NewQuestion {
                    kind: QuestionKind::MultipleChoice,
                    prompt: "Who applies the lock?".to_string(),
                    points: 5,
                    options: vec![
                        option("The supervisor", false),
                        option("Each authorized worker", true),
                        option("Nobody", false),
                    ],
                },
                NewQuestion {
                    kind: QuestionKind::ShortAnswer,
                    prompt: "Describe the verification step.".to_string(),
                    points: 5,
                    options: Vec::new(),
                },
            ],
        })
        .await
        .expect("quiz created")
}

fn correct_answers(quiz: &Quiz) -> BTreeMap<QuestionId, String> {
    let choice = &quiz.questions[0];
    let correct = choice
        .options
        .iter()
        .find(|option| option.is_correct)
        .expect("correct option");
    let mut answers = BTreeMap::new();
    answers.insert(choice.id, correct.id.to_string());
    answers.insert(quiz.questions[1].id, "Try the start button".to_string());
    answers
}

#[tokio::test]
async fn short_answer_awaiting_review_leaves_the_attempt_at_half() {
    let campus = campus();
    let quiz = safety_quiz(&campus, None).await;

    let mut garbage = correct_answers(&quiz);
    garbage.insert(quiz.questions[0].id, "not-an-option".to_string());
    assert!(matches!(
        campus.quizzes.submit(LEARNER, quiz.id, garbage).await,
        Err(QuizError::InvalidAnswer(_))
    ));

    let attempt = campus
        .quizzes
        .submit(LEARNER, quiz.id, correct_answers(&quiz))
        .await
        .expect("submitted");

    assert_eq!(attempt.score, 5);
    assert_eq!(attempt.total_points, 10);
    assert_eq!(attempt.percentage, 50.0);
    assert!(!attempt.passed);
    assert_eq!(attempt.pending_review(), 1);

    let short = attempt
        .responses
        .iter()
        .find(|response| response.needs_review)
        .expect("short answer response");
    assert!(matches!(
        campus.quizzes.grade_response(short.id, 6).await,
        Err(QuizError::PointsExceedMaximum(5))
    ));
    let choice = attempt
        .responses
        .iter()
        .find(|response| !response.needs_review)
        .expect("choice response");
    assert!(matches!(
        campus.quizzes.grade_response(choice.id, 5).await,
        Err(QuizError::NotReviewable)
    ));

    let regraded = campus.quizzes.grade_response(short.id, 4).await.expect("graded");
    assert_eq!(regraded.score, 9);
    assert_eq!(regraded.percentage, 90.0);
    assert!(regraded.passed);
    assert_eq!(regraded.pending_review(), 0);
}

#[tokio::test]
async fn attempt_limit_and_enrollment_are_enforced() {
    let campus = campus();
    let quiz = safety_quiz(&campus, Some(1)).await;

    assert!(matches!(
        campus.quizzes.submit(UserId(404), quiz.id, BTreeMap::new()).await,
        Err(QuizError::NotEnrolled)
    ));

    let empty = campus
        .quizzes
        .submit(LEARNER, quiz.id, BTreeMap::new())
        .await
        .expect("unanswered quiz still records an attempt");
    assert_eq!(empty.percentage, 0.0);
    assert_eq!(empty.total_points, 10);

    assert!(matches!(
        campus.quizzes.submit(LEARNER, quiz.id, correct_answers(&quiz)).await,
        Err(QuizError::AttemptsExhausted(1))
    ));
}

#[tokio::test]
async fn malformed_quizzes_are_rejected() {
    let campus = campus();
    let course = campus
        .catalog
        .create_course(draft("first-aid", dec!(0)))
        .await
        .expect("course created");
    let result = campus
        .quizzes
        .create_quiz(NewQuiz {
            course_id: course.id,
            title: "True or false".to_string(),
            passing_score: 60,
            max_attempts: None,
            questions: vec![NewQuestion {
                kind: QuestionKind::TrueFalse,
                prompt: "CPR ratio is 30:2".to_string(),
                points: 1,
                options: vec![option("True", true), option("False", true)],
            }],
        })
        .await;
    assert!(matches!(result, Err(QuizError::Invalid(_))));
}

#[tokio::test]
async fn oversized_point_values_are_rejected_before_any_submission() {
    let campus = campus();
    let course = campus
        .catalog
        .create_course(draft("rigging", dec!(0)))
        .await
        .expect("course created");
    campus.enrollments.enroll_free(LEARNER, course.id).await.expect("enrolled");
    let heavy = |points: u32| NewQuestion {
        kind: QuestionKind::TrueFalse,
        prompt: "Slings are inspected before each lift".to_string(),
        points,
        options: vec![option("True", true), option("False", false)],
    };

    let result = campus
        .quizzes
        .create_quiz(NewQuiz {
            course_id: course.id,
            title: "Rigging basics".to_string(),
            passing_score: 50,
            max_attempts: None,
            questions: vec![heavy(3_000_000_000), heavy(3_000_000_000)],
        })
        .await;
    assert!(matches!(result, Err(QuizError::Invalid(_))));

    let quiz = campus
        .quizzes
        .create_quiz(NewQuiz {
            course_id: course.id,
            title: "Rigging basics".to_string(),
            passing_score: 50,
            max_attempts: None,
            questions: vec![heavy(MAX_QUESTION_POINTS), heavy(MAX_QUESTION_POINTS)],
        })
        .await
        .expect("points at the cap are accepted");
    let attempt = campus
        .quizzes
        .submit(LEARNER, quiz.id, BTreeMap::new())
        .await
        .expect("grading stays in range");
    assert_eq!(attempt.total_points, 2 * MAX_QUESTION_POINTS);
}

#[tokio::test]
async fn assignments_flag_late_work_and_cap_scores() {
    let campus = campus();
    let course = campus
        .catalog
        .create_course(draft("plumbing-basics", dec!(0)))
        .await
        .expect("course created");
    campus.enrollments.enroll_free(LEARNER, course.id).await.expect("enrolled");
    let overdue = campus
        .assignments
        .create_assignment(
            course.id,
            AssignmentDraft {
                title: "Pipe sizing worksheet".to_string(),
                max_points: 20,
                due_at: Some(Utc::now() - Duration::days(1)),
            },
        )
        .await
        .expect("assignment created");

    assert!(matches!(
        campus.assignments.submit(LEARNER, overdue.id, "   ").await,
        Err(AssignmentError::Invalid(_))
    ));
    let submission = campus
        .assignments
        .submit(LEARNER, overdue.id, "22mm for the main run")
        .await
        .expect("submitted");
    assert!(submission.late);
    assert!(matches!(
        campus.assignments.submit(LEARNER, overdue.id, "second try").await,
        Err(AssignmentError::AlreadySubmitted)
    ));

    assert!(matches!(
        campus.assignments.grade(submission.id, 21, None).await,
        Err(AssignmentError::ScoreExceedsMaximum(20))
    ));
    let graded = campus
        .assignments
        .grade(submission.id, 17, Some("Check the fall gradient".to_string()))
        .await
        .expect("graded");
    assert_eq!(graded.status, SubmissionStatus::Graded);
    assert_eq!(graded.score, Some(17));
}

#[tokio::test]
async fn registration_normalizes_email_and_verifies_once() {
    let outbox = Arc::new(MemoryOutbox::default());
    let accounts = AccountService::new(Arc::new(MemoryStore::new()), outbox.clone());

    let user = accounts
        .register(Registration {
            name: "Ama Owusu".to_string(),
            email: "  Ama.Owusu@Example.org ".to_string(),
        })
        .await
        .expect("registered");
    assert_eq!(user.email, "ama.owusu@example.org");
    assert!(!user.is_verified());

    assert!(matches!(
        accounts
            .register(Registration {
                name: "Duplicate".to_string(),
                email: "AMA.OWUSU@example.org".to_string(),
            })
            .await,
        Err(AccountError::EmailTaken)
    ));

    let sent = outbox.sent();
    assert_eq!(sent[0].template, EmailTemplate::Welcome);
    let token = sent[1].context.get("token").cloned().expect("token mailed");

    let verified = accounts.verify_email(&token).await.expect("verified");
    assert!(verified.is_verified());
    assert!(matches!(
        accounts.verify_email(&token).await,
        Err(AccountError::UnknownToken)
    ));
}
