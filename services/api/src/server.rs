use crate::cli::{MigrateArgs, ServeArgs};
use crate::infra::{lms_routes, open_sqlite, AppState};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use college_lms::config::{AppConfig, ConfigError};
use college_lms::error::AppError;
use college_lms::notifications::LogMailer;
use college_lms::storage::MemoryStore;
use college_lms::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(url) = args.database_url.take() {
        config.storage.database_url = Some(url);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let mailer = Arc::new(LogMailer::new(config.lms.mail_from.clone()));
    let routes = match open_sqlite(&config.storage).await? {
        Some(store) => lms_routes(Arc::new(store), mailer, &config.lms),
        None => {
            warn!("DATABASE_URL not set; records are kept in memory and lost on shutdown");
            lms_routes(Arc::new(MemoryStore::new()), mailer, &config.lms)
        }
    };

    let app = with_operational_routes(routes)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "college lms ready");

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) async fn migrate(mut args: MigrateArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(url) = args.database_url.take() {
        config.storage.database_url = Some(url);
    }

    telemetry::init(&config.telemetry)?;

    if open_sqlite(&config.storage).await?.is_none() {
        return Err(ConfigError::MissingDatabaseUrl.into());
    }
    info!("schema migration finished");
    Ok(())
}
