//! Error taxonomy for weather lookups.
//!
//! Only [`WeatherError::CityNotFound`] is a client-facing "not found"; every
//! other variant is reported to API callers as a server error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("City not found: {0}")]
    CityNotFound(String),

    #[error("Request to {provider} timed out")]
    Timeout { provider: &'static str },

    #[error("Failed to reach {provider}: {source}")]
    Network {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} request failed with status {status}: {body}")]
    Upstream {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Failed to parse {provider} response: {source}")]
    Parse {
        provider: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected {provider} response: {reason}")]
    InvalidResponse {
        provider: &'static str,
        reason: String,
    },
}

impl WeatherError {
    /// Classify a transport error, separating timeouts from other failures.
    ///
    /// The request URL is stripped because its query string carries the API key.
    pub fn from_transport(provider: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            WeatherError::Timeout { provider }
        } else {
            WeatherError::Network { provider, source: source.without_url() }
        }
    }

    pub fn upstream(provider: &'static str, status: reqwest::StatusCode, body: &str) -> Self {
        WeatherError::Upstream {
            provider,
            status: status.as_u16(),
            body: truncate_body(body),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WeatherError::CityNotFound(_))
    }
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}
