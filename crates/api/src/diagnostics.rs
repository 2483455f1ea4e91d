use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use tokio::task::JoinHandle;
use url::Url;

pub const SERVICE_NAME: &str = "gcf-code-colors";

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    pub endpoint: Url,
    pub service: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
struct ServiceContext<'a> {
    service: &'a str,
    version: &'a str,
    started_at_utc: String,
}

impl DiagnosticsConfig {
    /// `None` when `CODECOLORS_DIAGNOSTICS_URL` is unset or not an http(s) URL.
    pub fn from_env() -> Option<Self> {
        let raw = env::var("CODECOLORS_DIAGNOSTICS_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())?;
        let version = env::var("CODECOLORS_SERVICE_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        match Self::new(&raw, version) {
            Ok(config) => Some(config),
            Err(error) => {
                tracing::warn!(error = %error, "diagnostics reporting disabled");
                None
            }
        }
    }

    pub fn new(endpoint: &str, version: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("invalid diagnostics url")?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            anyhow::bail!("diagnostics url must be http or https");
        }
        Ok(Self {
            endpoint,
            service: SERVICE_NAME.to_string(),
            version: version.into(),
        })
    }
}

pub fn diagnostics_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(3))
        .timeout(Duration::from_secs(5))
        .build()
        .context("failed to build diagnostics HTTP client")
}

pub async fn report_service_context(client: &Client, config: &DiagnosticsConfig) -> Result<()> {
    let body = ServiceContext {
        service: &config.service,
        version: &config.version,
        started_at_utc: chrono::Utc::now().to_rfc3339(),
    };
    client
        .post(config.endpoint.clone())
        .json(&body)
        .send()
        .await
        .context("diagnostics endpoint unreachable")?
        .error_for_status()
        .context("diagnostics endpoint rejected report")?;
    Ok(())
}

/// Fire-and-forget; a failed report is logged and never reaches request handling.
pub fn spawn_service_report(client: Client, config: DiagnosticsConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        match report_service_context(&client, &config).await {
            Ok(()) => tracing::info!(
                service = %config.service,
                version = %config.version,
                "service context reported"
            ),
            Err(error) => tracing::warn!(error = %format!("{error:#}"), "service context report failed"),
        }
    })
}
