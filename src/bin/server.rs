//! Binary entry point for the document generation gateway.

use std::net::SocketAddr;

use ortho_gateway::{config::Settings, http, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env().expect("failed to load settings");

    if settings.enable_auth_bypass {
        tracing::warn!("auth bypass is enabled — do not run this in production");
    }

    let state = AppState::new(settings)
        .await
        .expect("failed to initialize application state");

    let app = http::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 8080));
    tracing::info!(%addr, "starting ortho-doc-gateway");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app)
        .await
        .expect("server error");
}
