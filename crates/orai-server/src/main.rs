use anyhow::Result;
use chrono::Utc;
use orai_alert::{AlertEvaluator, DigestProcessor};
use orai_notify::{SendThrottle, SmtpMailer};
use orai_server::api;
use orai_server::config::ServerConfig;
use orai_server::scheduler::AlertScheduler;
use orai_server::state::AppState;
use orai_storage::AlertStore;
use orai_weather::MeteoLtClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    orai_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("orai=info".parse()?))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/server.toml".to_string());
    let config = ServerConfig::load(&config_path)?;

    tracing::info!(
        http_port = config.http_port,
        db = %config.db_url,
        "orai-server starting"
    );

    let store = Arc::new(AlertStore::new(&config.db_url).await?);
    let weather = Arc::new(MeteoLtClient::new(
        &config.weather.base_url,
        config.weather.timeout_secs,
    ));
    let smtp = config.smtp.clone().with_env_overrides();
    let mailer = Arc::new(SmtpMailer::new(&smtp)?);
    let throttle = Arc::new(SendThrottle::new(Duration::from_millis(
        config.scheduler.send_delay_ms,
    )));

    let evaluator = Arc::new(AlertEvaluator::new(
        store.clone(),
        weather,
        mailer.clone(),
        throttle.clone(),
    ));
    let digest = Arc::new(DigestProcessor::new(store.clone(), mailer, throttle));

    let scheduler = Arc::new(AlertScheduler::new(
        evaluator,
        digest.clone(),
        config.scheduler.eval_interval_secs,
        config.scheduler.digest_tick_secs,
    ));
    let eval_handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_evaluator().await }
    });
    let digest_handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.run_digest().await }
    });

    let state = AppState {
        store,
        digest,
        start_time: Utc::now(),
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let app = api::build_router(state);
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    eval_handle.abort();
    digest_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}
