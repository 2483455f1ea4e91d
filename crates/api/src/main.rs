use std::env;

use anyhow::Result;
use codecolors_api::build_app;
use codecolors_api::diagnostics::{diagnostics_client, spawn_service_report, DiagnosticsConfig};
use codecolors_observability::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("codecolors_api");

    let locales_dir =
        env::var("CODECOLORS_LOCALES_DIR").unwrap_or_else(|_| "locales".to_string());
    let bind = env::var("CODECOLORS_BIND").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let app = build_app(&locales_dir).await?;

    if let Some(config) = DiagnosticsConfig::from_env() {
        spawn_service_report(diagnostics_client()?, config);
    }

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(bind = %bind, locales_dir = %locales_dir, "code colors fulfillment started");

    axum::serve(listener, app).await?;
    Ok(())
}
