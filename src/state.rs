use std::sync::Arc;

use chrono::Duration;

use crate::config::Config;
use crate::engine::matcher::DEFAULT_RADIUS_KM;
use crate::observability::metrics::Metrics;
use crate::store::memory::MemoryStore;
use crate::store::DonationStore;

/// Tunables the request handlers need.
#[derive(Debug, Clone)]
pub struct Settings {
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    pub donation_ttl: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_radius_km: DEFAULT_RADIUS_KM,
            max_radius_km: 500.0,
            donation_ttl: Duration::hours(12),
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            default_radius_km: config.default_radius_km,
            max_radius_km: config.max_radius_km,
            donation_ttl: Duration::hours(config.donation_ttl_hours),
        }
    }
}

pub struct AppState {
    pub store: Arc<dyn DonationStore>,
    pub settings: Settings,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(store: Arc<dyn DonationStore>, settings: Settings) -> Self {
        Self {
            store,
            settings,
            metrics: Metrics::new(),
        }
    }

    pub fn in_memory(event_buffer_size: usize) -> Self {
        Self::new(
            Arc::new(MemoryStore::new(event_buffer_size)),
            Settings::default(),
        )
    }
}
