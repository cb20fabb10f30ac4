use rusty_library_lending::{
    adapters::{
        http::HttpPricingGateway, in_memory::InMemoryStockLedger, postgres::PostgresStockLedger,
    },
    api::{
        handlers::{AppState, InstanceInfo},
        router::create_router,
    },
    application::{book::ServiceDependencies, pricing::PriceLookup},
    config::{AppConfig, LedgerBackend},
    ports::StockLedger,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "rusty_library_lending=debug,tower_http=debug,axum=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Initialize stock ledger
    let stock_ledger: Arc<dyn StockLedger> = match config.ledger_backend {
        LedgerBackend::Postgres => {
            tracing::info!("Database URL: {}", config.database_url);

            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(&config.database_url)
                .await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            Arc::new(PostgresStockLedger::new(pool).with_lock_timeout(config.lock_timeout))
        }
        LedgerBackend::Memory => {
            tracing::warn!("Using in-memory stock ledger; data is lost on restart");
            Arc::new(InMemoryStockLedger::with_lock_timeout(config.lock_timeout))
        }
    };

    // Initialize pricing client
    let pricing_gateway = Arc::new(HttpPricingGateway::new(
        config.pricing.base_url.clone(),
        config.pricing.connect_timeout,
        config.pricing.read_timeout,
    )?);
    let price_lookup = Arc::new(PriceLookup::new(
        pricing_gateway,
        config.pricing.retry.clone(),
        config.pricing.breaker.clone(),
    ));

    // Create service dependencies
    let service_deps = ServiceDependencies {
        stock_ledger,
        price_lookup,
    };

    // Create application state
    let app_state = Arc::new(AppState {
        service_deps,
        instance: InstanceInfo {
            hostname: config.hostname.clone(),
            port: config.port,
        },
    });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
