use rusty_library_lending::{
    config::PricingServiceConfig,
    pricing_service::{PricingState, create_router},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rusty_library_lending=debug,pricing_service=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = PricingServiceConfig::from_env()?;

    let state = Arc::new(PricingState {
        random_failure_percent: config.random_failure_percent,
    });
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        "Pricing service listening on {} (random failure: {}%)",
        addr,
        config.random_failure_percent
    );

    axum::serve(listener, app).await?;

    Ok(())
}
