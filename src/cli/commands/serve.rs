use crate::app;
use crate::config::AppConfig;

pub async fn handle(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Bespin API in {:?} mode", config.environment);
    app::serve(&config).await
}
