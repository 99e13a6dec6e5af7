use std::sync::Arc;

use tracing::info;
use underwriting_orchestrator::{
    api::start_server, config::GeminiConfig, conversation::ConversationOrchestrator,
    extraction::ExtractionOrchestrator, gemini::GeminiClient,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = GeminiConfig::from_env();
    if !config.has_credential() {
        eprintln!("⚠️  GEMINI_API_KEY not set in .env");
        eprintln!("📌 See .env.example for setup instructions");
    }

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Loan Underwriting Orchestrator - API Server");
    info!("📍 Port: {}", api_port);

    // Both orchestrators share one pooled client
    let client = Arc::new(GeminiClient::new(config.clone()));
    let extraction = Arc::new(ExtractionOrchestrator::new(
        client.clone(),
        config.extraction_model.clone(),
    ));
    let conversation = Arc::new(ConversationOrchestrator::new(client, config.chat_model));

    info!("✅ Orchestrators initialized");
    info!("📡 Starting API server...");

    start_server(extraction, conversation, api_port).await?;

    Ok(())
}
