use std::sync::Arc;
use takatrack::{
    api::{start_server, ApiState},
    config::AppConfig,
    llm::ModelGateway,
    random::ThreadRandom,
    store::{InMemoryStore, PostgresStore, Store},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    info!("TakaTrack API server");
    info!(port = config.port, model = %config.llm.model, "Configuration loaded");

    if config.llm.api_key.is_empty() {
        warn!("LLM_API_KEY not set; advice will use fallback answers");
    }

    let store: Arc<dyn Store> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            info!("Connected to PostgreSQL");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store (data is lost on restart)");
            Arc::new(InMemoryStore::new())
        }
    };

    let gateway = Arc::new(ModelGateway::from_config(&config.llm)?);
    let state = ApiState::new(
        store,
        gateway,
        Arc::new(ThreadRandom),
        config.super_admin_email.clone(),
    );

    start_server(state, config.port).await?;

    Ok(())
}
