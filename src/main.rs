use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_proxy::cache::RedisCache;
use weather_proxy::config::Config;
use weather_proxy::routes::{create_router, AppState};
use weather_proxy::upstream::{UpstreamClient, DEFAULT_BASE_URL};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();
    if config.api_key.is_none() {
        tracing::warn!("API_KEY not set; /weather will answer 500 until it is configured");
    }

    // Cache store and upstream client
    let cache = Arc::new(RedisCache::new(&config.redis_url)?);
    let upstream = Arc::new(UpstreamClient::new(DEFAULT_BASE_URL));

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        cache,
        upstream,
    };

    let app = create_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("Server starting on http://0.0.0.0:8080");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
