use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    handled_total: AtomicU64,
    unhandled_total: AtomicU64,
    fail_closed_total: AtomicU64,
    locale_default_total: AtomicU64,
    terminal_total: AtomicU64,
    errors_total: AtomicU64,
    latency_samples: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub handled_total: u64,
    pub unhandled_total: u64,
    pub fail_closed_total: u64,
    pub locale_default_total: u64,
    pub terminal_total: u64,
    pub errors_total: u64,
    pub latency_samples: u64,
    pub avg_latency_micros: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self, intent: &'static str, terminal: bool) {
        self.handled_total.fetch_add(1, Ordering::Relaxed);
        if terminal {
            self.terminal_total.fetch_add(1, Ordering::Relaxed);
        }
        metrics::counter!("codecolors_intents_handled_total", "intent" => intent).increment(1);
    }

    pub fn inc_unhandled(&self) {
        self.unhandled_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("codecolors_intents_unhandled_total").increment(1);
    }

    pub fn inc_fail_closed(&self, intent: &'static str) {
        self.fail_closed_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("codecolors_fail_closed_total", "intent" => intent).increment(1);
    }

    pub fn inc_locale_default(&self) {
        self.locale_default_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_error(&self) {
        self.errors_total.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("codecolors_route_errors_total").increment(1);
    }

    /// Called once per routed event, failed ones included.
    pub fn observe_latency(&self, duration: Duration) {
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
        self.total_latency_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            handled_total: self.handled_total.load(Ordering::Relaxed),
            unhandled_total: self.unhandled_total.load(Ordering::Relaxed),
            fail_closed_total: self.fail_closed_total.load(Ordering::Relaxed),
            locale_default_total: self.locale_default_total.load(Ordering::Relaxed),
            terminal_total: self.terminal_total.load(Ordering::Relaxed),
            errors_total: self.errors_total.load(Ordering::Relaxed),
            latency_samples: samples,
            avg_latency_micros: if samples == 0 {
                0.0
            } else {
                latency as f64 / samples as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,codecolors_api=info,codecolors_fulfillment=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
