//! FRED series observations client.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, Observation, SeriesSource};
use super::throttle::RequestThrottle;
use super::transport::{HttpTransport, TransportSettings};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_FRED_BASE_URL: &str = "https://api.stlouisfed.org/";
pub const FRED_API_KEY_ENV: &str = "FRED_API_KEY";

/// FRED's placeholder for a period with no value.
const MISSING_VALUE: &str = ".";

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    date: String,
    value: String,
}

pub struct FredClient {
    transport: HttpTransport,
    base_url: String,
    api_key: String,
}

impl FredClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: &TransportSettings,
        circuit_breaker: Arc<CircuitBreaker>,
        throttle: Arc<RequestThrottle>,
    ) -> Result<Self, DataError> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            transport: HttpTransport::new(settings, circuit_breaker, throttle)?,
            base_url,
            api_key: api_key.into(),
        })
    }
}

impl SeriesSource for FredClient {
    fn name(&self) -> &str {
        "fred"
    }

    fn fetch_series(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Observation>, DataError> {
        let url = format!("{}fred/series/observations", self.base_url);
        let params = [
            ("series_id", code.to_string()),
            ("api_key", self.api_key.clone()),
            ("file_type", "json".to_string()),
            ("observation_start", start.format("%Y-%m-%d").to_string()),
            ("observation_end", end.format("%Y-%m-%d").to_string()),
        ];
        let context = format!("fred series {code}");
        let resp: ObservationsResponse = self.transport.get_json(&url, &params, &context)?;
        parse_observations(code, resp.observations)
    }
}

fn parse_observations(
    code: &str,
    raw: Vec<RawObservation>,
) -> Result<Vec<Observation>, DataError> {
    raw.into_iter()
        .map(|obs| {
            let date = NaiveDate::parse_from_str(&obs.date, "%Y-%m-%d").map_err(|e| {
                DataError::ResponseFormatChanged(format!(
                    "{code}: bad observation date {:?}: {e}",
                    obs.date
                ))
            })?;
            Ok(Observation {
                date,
                value: parse_value(&obs.value),
            })
        })
        .collect()
}

/// `"."` and anything non-numeric become missing.
fn parse_value(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw == MISSING_VALUE {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Resolve the FRED API key: environment first, then the key file.
pub fn load_api_key(key_file: Option<&Path>) -> Result<String, DataError> {
    if let Ok(key) = std::env::var(FRED_API_KEY_ENV) {
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }
    read_key_file(key_file)
}

fn read_key_file(key_file: Option<&Path>) -> Result<String, DataError> {
    let path = key_file.ok_or_else(|| {
        DataError::MissingCredentials(format!(
            "set {FRED_API_KEY_ENV} or fred.api_key_file"
        ))
    })?;
    let key = std::fs::read_to_string(path).map_err(|e| {
        DataError::MissingCredentials(format!("cannot read {}: {e}", path.display()))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(DataError::MissingCredentials(format!(
            "{} is empty",
            path.display()
        )));
    }
    Ok(key.to_string())
}
