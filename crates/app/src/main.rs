mod contact;
mod pipeline;
mod problem;
mod router;
mod security;
mod telemetry;
#[cfg(test)]
mod testing;

use std::{net::SocketAddr, sync::Arc};

use axum::http::HeaderValue;
use tracing::{info, warn};

use contact_relay_core::{SubmissionNotifier, SubmissionStore};
use contact_relay_mailer::{LogNotifier, SmtpNotifier, SmtpSettings, TlsMode, DEFAULT_TIMEOUT};
use contact_relay_storage::Database;
use contact_relay_util::{AppConfig, SmtpConfig, SmtpSecurity};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.ensure_schema().await?;
    info!(stage = "storage", "database ready");
    let store: Arc<dyn SubmissionStore> = Arc::new(database.submissions());

    let notifier: Arc<dyn SubmissionNotifier> = match &config.smtp {
        Some(smtp) => {
            info!(stage = "notify", host = %smtp.host, port = smtp.port, "smtp notifications enabled");
            Arc::new(SmtpNotifier::new(smtp_settings(smtp))?)
        }
        None => {
            warn!(
                stage = "notify",
                "SMTP_HOST not set, submissions are stored but no email is sent"
            );
            Arc::new(LogNotifier)
        }
    };

    let cors_origins = config
        .cors_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    let pipeline = pipeline::SubmissionPipeline::new(store, notifier);
    let state = router::AppState::new(metrics, pipeline, cors_origins);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}

fn smtp_settings(config: &SmtpConfig) -> SmtpSettings {
    let tls = match config.security {
        SmtpSecurity::Tls => TlsMode::Implicit,
        SmtpSecurity::StartTls => TlsMode::StartTls,
        SmtpSecurity::None => TlsMode::None,
    };

    SmtpSettings {
        host: config.host.clone(),
        port: config.port,
        tls,
        username: config.username.clone(),
        password: config.password.clone(),
        from: config.from.clone(),
        recipient: config.recipient.clone(),
        subject_prefix: config.subject.clone(),
        timeout: DEFAULT_TIMEOUT,
    }
}
