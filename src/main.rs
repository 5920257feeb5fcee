use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use tdx_feedback::{
    config::ConfigLoader,
    handlers::{FeedbackServer, FeedbackServerTrait},
    providers::StructuredLogger,
    services::{FeedbackStore, InMemoryFeedbackStore, TicketCreator},
};

#[tokio::main]
async fn main() -> Result<()> {
    let loader = ConfigLoader::from_env();
    let config = loader.load()?;

    StructuredLogger::init(&config.logger.level, Some(config.logger.clone()))?;

    info!("Starting TDX feedback service");

    for warning in config.validate() {
        StructuredLogger::log_warning(&warning, None, None);
    }

    let ticket_creator = Arc::new(TicketCreator::from_config(config.tdx.clone(), &config.webclient)?);
    let store: Arc<dyn FeedbackStore> = Arc::new(InMemoryFeedbackStore::new());

    let server = FeedbackServer::new(
        config.server.clone(),
        config.feedback.clone(),
        store,
        ticket_creator,
    );

    StructuredLogger::log_info(
        "TDX feedback service configured",
        None,
        Some(serde_json::json!({
            "environment": loader.environment(),
            "listen_address": format!("{}:{}", config.server.listen_host, config.server.listen_port),
            "feedback_path": config.server.feedback_path,
            "ticket_creation": config.tdx.enable_ticket_creation,
            "tdx_base_url": config.tdx.base_url
        })),
    );

    if let Err(e) = server.start().await {
        StructuredLogger::log_error(&format!("Feedback server error: {}", e), None);
    }

    server.shutdown().await?;
    StructuredLogger::log_info("TDX feedback service stopped", None, None);

    Ok(())
}
