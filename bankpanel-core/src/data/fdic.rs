//! FDIC BankFind API client.
//!
//! Responses wrap each row as `{"data": {...}}` inside a top-level `data`
//! array, with the total match count under `totals.count`.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{DataError, Endpoint, FdicSource, QueryPage, RawRecord};
use super::query::Query;
use super::throttle::RequestThrottle;
use super::transport::{HttpTransport, TransportSettings};
use serde::Deserialize;
use std::sync::Arc;

pub const DEFAULT_FDIC_BASE_URL: &str = "https://banks.data.fdic.gov/api/";

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Vec<Envelope>,
    totals: Option<Totals>,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: RawRecord,
}

#[derive(Debug, Deserialize)]
struct Totals {
    count: Option<u64>,
}

pub struct FdicClient {
    transport: HttpTransport,
    base_url: String,
}

impl FdicClient {
    pub fn new(
        base_url: impl Into<String>,
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
        })
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    fn into_page(resp: ApiResponse) -> QueryPage {
        QueryPage {
            records: resp.data.into_iter().map(|e| e.data).collect(),
            total: resp.totals.and_then(|t| t.count),
        }
    }
}

impl FdicSource for FdicClient {
    fn name(&self) -> &str {
        "fdic_bankfind"
    }

    fn query(&self, endpoint: Endpoint, query: &Query) -> Result<QueryPage, DataError> {
        let context = match &query.filter {
            Some(filter) => format!("{} [{filter}]", endpoint.path()),
            None => endpoint.path().to_string(),
        };
        let resp: ApiResponse =
            self.transport
                .get_json(&self.endpoint_url(endpoint), &query.to_params(), &context)?;
        Ok(Self::into_page(resp))
    }

    fn is_available(&self) -> bool {
        self.transport.is_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client(base: &str) -> FdicClient {
        FdicClient::new(
            base,
            &TransportSettings::default(),
            Arc::new(CircuitBreaker::new(Duration::from_secs(60), 3)),
            Arc::new(RequestThrottle::unlimited()),
        )
        .unwrap()
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let c = client("https://example.test/api");
        assert_eq!(
            c.endpoint_url(Endpoint::Financials),
            "https://example.test/api/financials"
        );
        let c = client(DEFAULT_FDIC_BASE_URL);
        assert_eq!(
            c.endpoint_url(Endpoint::Institutions),
            "https://banks.data.fdic.gov/api/institutions"
        );
    }

    #[test]
    fn unwraps_nested_data_envelopes() {
        let body = r#"{
            "meta": {"total": 2},
            "data": [
                {"data": {"NAMEHCR": "Acme Holding", "ZIP": "10001"}, "score": 0},
                {"data": {"NAMEHCR": "Beta Bank", "ZIP": "20002"}, "score": 0}
            ],
            "totals": {"count": 2}
        }"#;
        let resp: ApiResponse = serde_json::from_str(body).unwrap();
        let page = FdicClient::into_page(resp);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[1]["NAMEHCR"], "Beta Bank");
        assert_eq!(page.total, Some(2));
    }

    #[test]
    fn missing_data_array_is_empty_page() {
        let resp: ApiResponse = serde_json::from_str(r#"{"totals": {"count": 0}}"#).unwrap();
        let page = FdicClient::into_page(resp);
        assert!(page.records.is_empty());
        assert_eq!(page.total, Some(0));
    }
}
