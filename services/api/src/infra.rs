use axum::{Extension, Router};
use college_lms::accounts::{account_router, AccountService};
use college_lms::assignments::{assignment_router, AssignmentService};
use college_lms::catalog::{catalog_router, CatalogService};
use college_lms::certificates::{certificate_router, CertificateService};
use college_lms::config::{LmsConfig, StorageConfig};
use college_lms::enrollments::{enrollment_router, EnrollmentService};
use college_lms::notifications::NotificationDispatcher;
use college_lms::payments::{payment_router, PaymentService};
use college_lms::quizzes::{quiz_router, QuizService};
use college_lms::storage::{LmsStore, RepositoryError, SqliteStore};
use college_lms::web::{csrf_router, CsrfRegistry};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds every workflow service over one store and merges their routers.
pub(crate) fn lms_routes<S, N>(store: Arc<S>, mailer: Arc<N>, lms: &LmsConfig) -> Router
where
    S: LmsStore,
    N: NotificationDispatcher + 'static,
{
    let accounts = Arc::new(AccountService::new(store.clone(), mailer.clone()));
    let catalog = Arc::new(CatalogService::new(
        store.clone(),
        lms.default_currency.clone(),
    ));
    let enrollments = Arc::new(EnrollmentService::new(store.clone(), mailer.clone()));
    let payments = Arc::new(PaymentService::new(store.clone(), mailer.clone()));
    let quizzes = Arc::new(QuizService::new(store.clone()));
    let assignments = Arc::new(AssignmentService::new(store.clone()));
    let certificates = Arc::new(CertificateService::new(store, mailer));

    Router::new()
        .merge(csrf_router())
        .merge(account_router(accounts))
        .merge(catalog_router(catalog))
        .merge(enrollment_router(enrollments))
        .merge(payment_router(payments))
        .merge(quiz_router(quizzes))
        .merge(assignment_router(assignments))
        .merge(certificate_router(certificates))
        .layer(Extension(CsrfRegistry::default()))
}

/// Opens the configured SQLite database and makes sure the schema exists.
pub(crate) async fn open_sqlite(
    storage: &StorageConfig,
) -> Result<Option<SqliteStore>, RepositoryError> {
    let Some(url) = storage.database_url.as_deref() else {
        return Ok(None);
    };
    let store = SqliteStore::connect(url).await?;
    store.migrate().await?;
    info!(database = %redact_url(url), "sqlite store connected");
    Ok(Some(store))
}

fn redact_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
