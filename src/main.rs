use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use autobook::config::AppConfig;
use autobook::db;
use autobook::handlers;
use autobook::services::captcha::TurnstileVerifier;
use autobook::services::messaging::TwilioSmsProvider;
use autobook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.captcha_secret.is_empty() {
        tracing::warn!("CAPTCHA_SECRET not set, public bookings are unverified");
    }
    let captcha = TurnstileVerifier::new(config.captcha_secret.clone());
    let messaging = TwilioSmsProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    );

    let (events_tx, _) = broadcast::channel(256);

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        messaging: Box::new(messaging),
        captcha: Box::new(captcha),
        events_tx,
    });

    // The public RPC routes are called from an embeddable widget on
    // arbitrary customer sites, hence the permissive CORS on this group.
    let public_routes = Router::new()
        .route("/public.availability", post(handlers::public::availability))
        .route("/public.createBooking", post(handlers::public::create_booking))
        .route("/public.getShopInfo", post(handlers::public::get_shop_info))
        .layer(CorsLayer::permissive());

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .merge(public_routes)
        .route("/rpc/booking.create", post(handlers::rpc::booking_create))
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route(
            "/api/admin/bookings/:id/cancel",
            post(handlers::admin::cancel_booking),
        )
        .route(
            "/api/admin/bookings/:id/confirm",
            post(handlers::admin::confirm_booking),
        )
        .route("/api/admin/shops", post(handlers::admin::create_shop))
        .route(
            "/api/admin/shops/:id/settings",
            get(handlers::admin::get_shop_settings).post(handlers::admin::update_shop_settings),
        )
        .route(
            "/api/admin/shops/:id/services",
            get(handlers::admin::list_services).post(handlers::admin::create_service),
        )
        .route("/api/admin/events", get(handlers::admin::events_stream))
        .route(
            "/calendar/:booking_id",
            get(handlers::calendar::download_ics),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
