use clap::Args;
use college_lms::accounts::{AccountService, Registration, Role};
use college_lms::catalog::{CatalogService, CourseDraft, LessonDraft};
use college_lms::certificates::CertificateService;
use college_lms::enrollments::EnrollmentService;
use college_lms::error::AppError;
use college_lms::ids::{CourseId, UserId};
use college_lms::notifications::MemoryOutbox;
use college_lms::payments::{CheckoutRequest, PaymentMethod, PaymentService, VerificationDecision};
use college_lms::quizzes::{NewAnswerOption, NewQuestion, NewQuiz, QuestionKind, QuizService};
use college_lms::storage::MemoryStore;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Tuition charged for the demo course
    #[arg(long, default_value = "450.00")]
    pub(crate) price: Decimal,
    /// Number of lessons the student works through
    #[arg(long, default_value_t = 3)]
    pub(crate) lessons: u32,
    /// Skip the quiz portion of the walkthrough
    #[arg(long)]
    pub(crate) skip_quiz: bool,
}

struct Campus {
    accounts: AccountService<MemoryStore, MemoryOutbox>,
    catalog: CatalogService<MemoryStore>,
    enrollments: EnrollmentService<MemoryStore, MemoryOutbox>,
    payments: PaymentService<MemoryStore, MemoryOutbox>,
    quizzes: QuizService<MemoryStore>,
    certificates: CertificateService<MemoryStore, MemoryOutbox>,
    outbox: Arc<MemoryOutbox>,
}

impl Campus {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let outbox = Arc::new(MemoryOutbox::default());
        Self {
            accounts: AccountService::new(store.clone(), outbox.clone()),
            catalog: CatalogService::new(store.clone(), "USD"),
            enrollments: EnrollmentService::new(store.clone(), outbox.clone()),
            payments: PaymentService::new(store.clone(), outbox.clone()),
            quizzes: QuizService::new(store.clone()),
            certificates: CertificateService::new(store, outbox.clone()),
            outbox,
        }
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("College LMS demo (in-memory store, mail captured locally)");
    let campus = Campus::new();
    if let Err(step) = walkthrough(&campus, &args).await {
        println!("  Demo stopped: {step}");
    }

    let sent = campus.outbox.sent();
    if sent.is_empty() {
        println!("\nE-mail outbox: empty");
    } else {
        println!("\nE-mail outbox:");
        for note in sent {
            println!(
                "  - template={} -> user {} {:?}",
                note.template.name(),
                note.recipient,
                note.context
            );
        }
    }
    Ok(())
}

async fn walkthrough(campus: &Campus, args: &DemoArgs) -> Result<(), String> {
    let admin = campus
        .accounts
        .create_user(
            Registration {
                name: "Registrar".to_string(),
                email: "registrar@college.local".to_string(),
            },
            Role::Admin,
        )
        .await
        .map_err(|err| format!("admin account rejected: {err}"))?;
    let student = campus
        .accounts
        .register(Registration {
            name: "Amina Okafor".to_string(),
            email: "Amina.Okafor@Example.org".to_string(),
        })
        .await
        .map_err(|err| format!("registration rejected: {err}"))?;
    println!("- Registered {} <{}> (id {})", student.name, student.email, student.id);
    if let Some(token) = student.verification_token.as_deref() {
        let verified = campus
            .accounts
            .verify_email(token)
            .await
            .map_err(|err| format!("e-mail verification failed: {err}"))?;
        println!("  E-mail verified: {}", verified.is_verified());
    }

    let course_id = publish_course(campus, args).await?;
    let course = campus
        .catalog
        .course_detail(course_id)
        .await
        .map_err(|err| format!("course lookup failed: {err}"))?;
    println!(
        "- Published '{}' at {} {} with {} lessons",
        course.course.title,
        course.course.price,
        course.course.currency,
        course.lessons.len()
    );

    let payment = campus
        .payments
        .checkout(
            student.id,
            course_id,
            CheckoutRequest {
                method: PaymentMethod::MobileMoney,
                transaction_reference: "MM-20931-DEMO".to_string(),
            },
        )
        .await
        .map_err(|err| format!("checkout rejected: {err}"))?;
    println!(
        "- Checkout recorded payment {} ({} {}) -> {}",
        payment.id,
        payment.amount,
        payment.currency,
        payment.status.label()
    );

    let outcome = campus
        .payments
        .verify(
            payment.id,
            VerificationDecision::Approve,
            admin.id,
            Some("Matched against mobile money statement".to_string()),
        )
        .await
        .map_err(|err| format!("verification failed: {err}"))?;
    println!(
        "  Admin approval -> {} | enrollment created: {} | mail sent: {}",
        outcome.settlement.payment.status.label(),
        outcome.settlement.enrollment_created,
        outcome.notifications_sent
    );
    if let Err(err) = campus
        .payments
        .verify(payment.id, VerificationDecision::Approve, admin.id, None)
        .await
    {
        println!("  Second approval refused: {err}");
    }

    if !args.skip_quiz {
        take_quiz(campus, course_id, student.id).await?;
    }

    println!("- Working through lessons");
    let mut certificate = None;
    for lesson in &course.lessons {
        let progress = campus
            .enrollments
            .complete_lesson(student.id, lesson.id)
            .await
            .map_err(|err| format!("lesson completion failed: {err}"))?;
        println!(
            "  {}. {} -> {}% ({})",
            lesson.position,
            lesson.title,
            progress.enrollment.progress_percentage,
            progress.enrollment.status.label()
        );
        certificate = progress.certificate.or(certificate);
    }

    let Some(certificate) = certificate else {
        println!("  No certificate issued");
        return Ok(());
    };
    println!(
        "- Certificate {} issued, verification code {}",
        certificate.certificate_number, certificate.verification_code
    );
    let lookup = campus
        .certificates
        .verify(&certificate.verification_code)
        .await
        .map_err(|err| format!("certificate lookup failed: {err}"))?;
    println!("  Public lookup finds certificate {}", lookup.certificate_number);
    campus
        .certificates
        .revoke(certificate.id, "Issued during a demo run")
        .await
        .map_err(|err| format!("revocation failed: {err}"))?;
    match campus
        .certificates
        .verify(&certificate.verification_code)
        .await
    {
        Ok(_) => println!("  Revoked certificate still resolves"),
        Err(err) => println!("  After revocation: {err}"),
    }

    Ok(())
}

async fn publish_course(campus: &Campus, args: &DemoArgs) -> Result<CourseId, String> {
    let course = campus
        .catalog
        .create_course(CourseDraft {
            title: "Certificate in Practical Bookkeeping".to_string(),
            slug: "practical-bookkeeping".to_string(),
            description: "Ledgers, reconciliation and month-end close.".to_string(),
            price: args.price,
            currency: None,
            published: true,
        })
        .await
        .map_err(|err| format!("course rejected: {err}"))?;
    for position in 1..=args.lessons.max(1) {
        campus
            .catalog
            .add_lesson(
                course.id,
                LessonDraft {
                    title: format!("Module {position}"),
                    position: Some(position),
                },
            )
            .await
            .map_err(|err| format!("lesson rejected: {err}"))?;
    }
    Ok(course.id)
}

async fn take_quiz(campus: &Campus, course_id: CourseId, student: UserId) -> Result<(), String> {
    let quiz = campus
        .quizzes
        .create_quiz(NewQuiz {
            course_id,
            title: "Module 1 check".to_string(),
            passing_score: 70,
            max_attempts: Some(2),
            questions: vec![
                NewQuestion {
                    kind: QuestionKind::MultipleChoice,
                    prompt: "Which statement lists assets and liabilities?".to_string(),
                    points: 5,
                    options: vec![
                        NewAnswerOption {
                            text: "Balance sheet".to_string(),
                            is_correct: true,
                        },
                        NewAnswerOption {
                            text: "Cash flow statement".to_string(),
                            is_correct: false,
                        },
                    ],
                },
                NewQuestion {
                    kind: QuestionKind::ShortAnswer,
                    prompt: "Explain why a trial balance can balance yet contain errors."
                        .to_string(),
                    points: 5,
                    options: Vec::new(),
                },
            ],
        })
        .await
        .map_err(|err| format!("quiz rejected: {err}"))?;

    let mut answers = BTreeMap::new();
    for question in &quiz.questions {
        let answer = match question.kind {
            QuestionKind::ShortAnswer => {
                "Offsetting errors and omissions leave debits equal to credits.".to_string()
            }
            QuestionKind::MultipleChoice | QuestionKind::TrueFalse => question
                .options
                .first()
                .map(|option| option.id.to_string())
                .unwrap_or_default(),
        };
        answers.insert(question.id, answer);
    }

    let attempt = campus
        .quizzes
        .submit(student, quiz.id, answers)
        .await
        .map_err(|err| format!("quiz submission rejected: {err}"))?;
    println!(
        "- Quiz '{}': {}/{} points = {:.2}% (passed: {}, {} awaiting review)",
        quiz.title,
        attempt.score,
        attempt.total_points,
        attempt.percentage,
        attempt.passed,
        attempt.pending_review()
    );

    if let Some(response) = attempt.responses.iter().find(|r| r.needs_review) {
        let regraded = campus
            .quizzes
            .grade_response(response.id, 4)
            .await
            .map_err(|err| format!("manual grading failed: {err}"))?;
        println!(
            "  Instructor review -> {}/{} points = {:.2}% (passed: {})",
            regraded.score, regraded.total_points, regraded.percentage, regraded.passed
        );
    }
    Ok(())
}
