use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = rollcalld::Config::from_env();
    tracing::info!(
        db = %config.db_path.display(),
        tolerance = config.tolerance,
        min_samples = config.min_samples,
        mode = ?config.accuracy_mode,
        "rollcalld starting"
    );

    // Fail fast if the database or gallery index cannot be loaded.
    let service = rollcalld::AttendanceService::open(&config)?;
    tracing::info!(
        identities = service.enrolled_identities().len(),
        "rollcalld ready"
    );

    // Transport layers (IPC/HTTP) attach to the service here; the daemon
    // itself only owns its lifetime.
    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
