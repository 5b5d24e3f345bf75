//! Gallery Checkout - order, payment and back-office service

use anyhow::Result;
use gallery_checkout::{
    api::{self, AppState},
    config::AppConfig,
    event_sink::{EventSink, NatsEventSink, NoopEventSink},
    payment::StripeGateway,
    repository::PgStore,
    service::CheckoutService,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let pool = PgPoolOptions::new().max_connections(config.database_max_connections).connect(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool, &config.currency));
    store.migrate().await?;

    let events: Arc<dyn EventSink> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsEventSink::new(client)),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, events disabled"); Arc::new(NoopEventSink) }
        },
        None => Arc::new(NoopEventSink),
    };
    let gateway = Arc::new(StripeGateway::new(config.gateway.clone())?);
    let service = CheckoutService::new(store.clone(), store.clone(), store, gateway, events, config.checkout_settings());

    let state = AppState {
        service: Arc::new(service),
        admin_token: config.admin_token.as_str().into(),
        cancel_page_url: config.cancel_page_url().into(),
        stale_order_after: config.stale_order_after,
    };
    let app = api::router(state);

    tracing::info!("Gallery checkout listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
