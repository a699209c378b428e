//! reqwest-backed adapters for the engine's provider traits.
//!
//! Adapters own transport details only: request building, timeouts, HTTP
//! error mapping and JSON decoding into engine types.

pub mod nominatim;
pub mod osrm;
pub mod overpass;

pub use nominatim::NominatimGeocoder;
pub use osrm::OsrmRouter;
pub use overpass::OverpassPoiProvider;

use geopin::GeopinError;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

/// Outbound identity shared by all adapters.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("geopin-server/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(10),
        }
    }
}

impl HttpSettings {
    pub(crate) fn client(&self) -> Result<Client, GeopinError> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| GeopinError::InvalidConfig(format!("Failed to create HTTP client: {}", e)))
    }
}

/// Parse and normalise a provider base URL.
pub(crate) fn base_url(provider: &str, raw: &str) -> Result<Url, GeopinError> {
    let url = Url::parse(raw).map_err(|e| {
        GeopinError::InvalidConfig(format!("Invalid {} URL '{}': {}", provider, raw, e))
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(GeopinError::InvalidConfig(format!(
            "{} URL must use http or https: {}",
            provider, raw
        )));
    }
    Ok(url)
}

pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> GeopinError {
    if error.is_timeout() {
        GeopinError::provider(provider, format!("timed out: {}", error))
    } else {
        GeopinError::provider(provider, error)
    }
}

pub(crate) fn status_error(provider: &str, status: StatusCode, body: &[u8]) -> GeopinError {
    let preview = body_preview(body);
    if preview.is_empty() {
        GeopinError::provider(provider, format!("status {}", status.as_u16()))
    } else {
        GeopinError::provider(provider, format!("status {}: {}", status.as_u16(), preview))
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

/// Send `request`, map non-2xx statuses, and decode the JSON body.
pub(crate) async fn fetch_json<T: serde::de::DeserializeOwned>(
    provider: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, GeopinError> {
    let response = request
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(provider, e))?;
    if !status.is_success() {
        return Err(status_error(provider, status, &body));
    }

    serde_json::from_slice(&body)
        .map_err(|e| GeopinError::provider(provider, format!("invalid JSON payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_preview() {
        let err = status_error("overpass", StatusCode::TOO_MANY_REQUESTS, b"  rate\n limited  ");
        assert_eq!(err.to_string(), "Provider 'overpass' failed: status 429: rate limited");

        let long = "x".repeat(500);
        let err = status_error("osrm", StatusCode::BAD_GATEWAY, long.as_bytes());
        assert!(err.to_string().ends_with("..."));

        let err = status_error("osrm", StatusCode::BAD_GATEWAY, b"");
        assert_eq!(err.to_string(), "Provider 'osrm' failed: status 502");
    }

    #[test]
    fn test_base_url_validation() {
        assert!(base_url("osrm", "https://router.project-osrm.org").is_ok());
        assert!(base_url("osrm", "ftp://router.example.com").is_err());
        assert!(base_url("osrm", "not a url").is_err());
    }
}
