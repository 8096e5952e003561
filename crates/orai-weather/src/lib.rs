//! Weather lookup boundary.
//!
//! The evaluator only needs one question answered: "what is the temperature
//! at this place right now?" Upstream errors, timeouts and empty forecasts
//! all degrade to `None` so a flaky weather API can never abort an
//! evaluation pass.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Resolves the current temperature for a place code.
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    /// The forecast temperature closest to now, in °C, or `None` when the
    /// place is unknown or the upstream is unavailable. Never errors.
    async fn current_temperature(&self, place_code: &str) -> Option<f64>;
}

/// meteo.lt API client (`/v1/places/{code}/forecasts/long-term`).
pub struct MeteoLtClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(rename = "forecastTimestamps", default)]
    forecast_timestamps: Vec<ForecastTimestamp>,
}

#[derive(Debug, Deserialize)]
struct ForecastTimestamp {
    #[serde(rename = "forecastTimeUtc")]
    forecast_time_utc: String,
    #[serde(rename = "airTemperature")]
    air_temperature: f64,
}

impl MeteoLtClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, place_code: &str) -> Result<ForecastResponse, reqwest::Error> {
        let url = format!("{}/{}/forecasts/long-term", self.base_url, place_code);
        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<ForecastResponse>()
            .await
    }
}

/// Pick the timestamp closest to `now` from the forecast series.
/// meteo.lt renders forecast times as naive UTC (`"2026-08-25 12:00:00"`).
fn closest_temperature(timestamps: &[ForecastTimestamp], now: DateTime<Utc>) -> Option<f64> {
    timestamps
        .iter()
        .filter_map(|ts| {
            let parsed =
                NaiveDateTime::parse_from_str(&ts.forecast_time_utc, "%Y-%m-%d %H:%M:%S").ok()?;
            let distance = (parsed.and_utc() - now).num_seconds().abs();
            Some((distance, ts.air_temperature))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, temp)| temp)
}

#[async_trait]
impl WeatherLookup for MeteoLtClient {
    async fn current_temperature(&self, place_code: &str) -> Option<f64> {
        if place_code.trim().is_empty() {
            return None;
        }

        match self.fetch(place_code).await {
            Ok(response) => {
                let temp = closest_temperature(&response.forecast_timestamps, Utc::now());
                if temp.is_none() {
                    tracing::warn!(place_code, "Forecast response contained no timestamps");
                }
                temp
            }
            Err(e) => {
                tracing::warn!(place_code, error = %e, "Weather lookup failed");
                None
            }
        }
    }
}
