use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use store_uptime::api::{self, ApiState};
use store_uptime::config;
use store_uptime::estimation::BatchCoordinator;
use store_uptime::report::ReportRunner;
use store_uptime::source::ingest;
use store_uptime::state::AppState;
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_default()?;
    init_tracing(&config.logging.level);
    tracing::info!(
        config_path = %config::config_path().display(),
        app = %config.app.name,
        "store-uptime starting"
    );

    let default_timezone = config.default_timezone()?;
    let (observations, summary) = ingest::load_observations(config.store_status_path())?;
    if observations.is_empty() {
        tracing::warn!(
            rows_read = summary.rows_read,
            "No usable observations loaded; reports will contain zeros"
        );
    }
    let reference = Arc::new(ingest::load_reference_data(
        config.business_hours_path(),
        config.timezones_path(),
        default_timezone,
    )?);

    let coordinator = BatchCoordinator::new(
        Arc::new(observations),
        reference.clone(),
        reference,
        config.batch_settings(),
    );
    let runner = Arc::new(ReportRunner::new(coordinator, config.output_dir()));
    tracing::info!(
        output_dir = %runner.output_dir().display(),
        batch_size = config.batch_settings().batch_size,
        "Report runner ready"
    );

    let app = api::router(ApiState {
        reports: Arc::new(RwLock::new(AppState::new())),
        runner,
    });
    let port = config.server_port();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use store_uptime::config;

    #[test]
    fn default_config_is_valid_toml() -> Result<(), Box<dyn std::error::Error>> {
        let config = config::load_default()?;
        config.default_timezone()?;
        Ok(())
    }
}
