use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub default_radius_km: f64,
    pub max_radius_km: f64,
    pub donation_ttl_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            default_radius_km: parse_or_default("DEFAULT_RADIUS_KM", 15.0)?,
            max_radius_km: parse_or_default("MAX_RADIUS_KM", 500.0)?,
            donation_ttl_hours: parse_or_default("DONATION_TTL_HOURS", 12)?,
        };

        if config.event_buffer_size == 0 {
            return Err(AppError::Internal(
                "EVENT_BUFFER_SIZE must be > 0".to_string(),
            ));
        }
        if !(config.default_radius_km > 0.0 && config.default_radius_km <= config.max_radius_km) {
            return Err(AppError::Internal(
                "DEFAULT_RADIUS_KM must be within (0, MAX_RADIUS_KM]".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
