use std::net::SocketAddr;
use std::sync::Arc;

use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grocery_delivery_backend::{
    config::Config,
    db,
    delivery::StoreClock,
    middleware::rate_limit::{create_global_governor, log_request},
    routes,
    services::{
        DbSettingsStore, NominatimGeocoder, OrderAlert, OrderFeed, SettingsHandle, TracingAlerter,
    },
    AppState,
};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grocery_delivery_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Invalid configuration");
    tracing::info!(
        store = %config.store_location.label(),
        timezone = %config.store_timezone,
        "Starting server at {}",
        config.server_addr()
    );

    let db = db::connect(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Migrations complete");

    let settings = SettingsHandle::load(Arc::new(DbSettingsStore::new(db.clone())))
        .await
        .expect("Failed to load delivery settings");

    let geocoder = NominatimGeocoder::new(
        &config.geocoder_base_url,
        &config.geocoder_region,
        &config.geocoder_user_agent,
        config.geocoder_timeout_secs,
    )
    .expect("Failed to build geocoding client");

    // Every new order rings the operator alert until acknowledged
    let feed = OrderFeed::new(64);
    let alert = OrderAlert::new(
        Arc::new(TracingAlerter),
        config.order_alert_interval,
        config.order_alert_duration,
    );
    let alert_on_arrival = alert.clone();
    let _alert_subscription = feed.on_order_arrived(move |arrived| alert_on_arrival.start(&arrived));

    let state = AppState {
        db,
        config: config.clone(),
        settings,
        geocoder: Arc::new(geocoder),
        clock: Arc::new(StoreClock::new(config.store_timezone)),
        feed,
        alert,
    };

    let app = routes::create_router(state)
        .layer(axum::middleware::from_fn(log_request))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(create_global_governor());

    let addr: SocketAddr = config.server_addr().parse().expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Failed to start server");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
