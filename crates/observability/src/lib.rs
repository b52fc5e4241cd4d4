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
    digit_requests_total: AtomicU64,
    utterance_requests_total: AtomicU64,
    menu_repeats_total: AtomicU64,
    unknown_intents_total: AtomicU64,
    rejected_total: AtomicU64,
    total_latency_micros: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub digit_requests_total: u64,
    pub utterance_requests_total: u64,
    pub menu_repeats_total: u64,
    pub unknown_intents_total: u64,
    pub rejected_total: u64,
    pub avg_latency_micros: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_digit_request(&self) {
        self.digit_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_utterance_request(&self) {
        self.utterance_requests_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_menu_repeat(&self) {
        self.menu_repeats_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_unknown_intent(&self) {
        self.unknown_intents_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejected(&self) {
        self.rejected_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_micros.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            digit_requests_total: self.digit_requests_total.load(Ordering::Relaxed),
            utterance_requests_total: self.utterance_requests_total.load(Ordering::Relaxed),
            menu_repeats_total: self.menu_repeats_total.load(Ordering::Relaxed),
            unknown_intents_total: self.unknown_intents_total.load(Ordering::Relaxed),
            rejected_total: self.rejected_total.load(Ordering::Relaxed),
            avg_latency_micros: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,ivr_api=info,ivr_dispatch=info",
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
