use crate::{
    Config, DailyForecast, WeatherData, WeatherError,
    config::{DEFAULT_FORECAST_DAYS, DEFAULT_REQUEST_TIMEOUT_SECS},
    model::Units,
    provider::{openweather::OpenWeatherProvider, weatherapi::WeatherApiProvider},
};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::{fmt::Debug, time::Duration};

pub mod openweather;
pub mod weatherapi;

const USER_AGENT: &str = concat!("weather-dashboard/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenWeather,
    WeatherApi,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "openweather",
            ProviderId::WeatherApi => "weatherapi",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenWeather, ProviderId::WeatherApi]
    }

    /// Environment variable that carries this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderId::OpenWeather => "OPENWEATHER_API_KEY",
            ProviderId::WeatherApi => "WEATHERAPI_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.trim().to_lowercase();

        match lower.as_str() {
            "openweather" => Ok(ProviderId::OpenWeather),
            "weatherapi" => Ok(ProviderId::WeatherApi),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openweather, weatherapi."
            )),
        }
    }
}

impl std::str::FromStr for ProviderId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::try_from(s)
    }
}

/// Everything a provider client needs to talk to its upstream API.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub api_key: String,
    pub base_url: Option<String>,
    pub units: Units,
    pub language: String,
    pub forecast_days: usize,
    pub timeout: Duration,
}

impl ProviderSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            units: Units::default(),
            language: "en".to_string(),
            forecast_days: DEFAULT_FORECAST_DAYS,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    /// Forecast horizon in days; at least one day is always requested.
    pub fn with_forecast_days(mut self, days: usize) -> Self {
        self.forecast_days = days.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL without a trailing slash, falling back to `default`.
    pub(crate) fn base_url_or(&self, default: &str) -> String {
        self.base_url.as_deref().unwrap_or(default).trim_end_matches('/').to_string()
    }

    pub(crate) fn http_client(&self) -> anyhow::Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")
    }
}

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    fn id(&self) -> ProviderId;

    /// Current conditions plus the daily forecast for `city`.
    async fn current_weather(&self, city: &str) -> Result<WeatherData, WeatherError>;

    /// Daily forecast only.
    async fn daily_forecast(&self, city: &str) -> Result<DailyForecast, WeatherError>;
}

/// Send `request` and return the status with the full body text.
pub(crate) async fn send(
    provider: &'static str,
    request: RequestBuilder,
) -> Result<(StatusCode, String), WeatherError> {
    let res = request
        .send()
        .await
        .map_err(|e| WeatherError::from_transport(provider, e))?;

    let status = res.status();
    let body = res.text().await.map_err(|e| WeatherError::from_transport(provider, e))?;

    tracing::debug!(provider, %status, bytes = body.len(), "upstream response");
    Ok((status, body))
}

pub(crate) fn parse<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    body: &str,
) -> Result<T, WeatherError> {
    serde_json::from_str(body).map_err(|source| WeatherError::Parse { provider, source })
}

pub(crate) fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let provider_cfg = config.provider_config(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `weather-dashboard configure {id}` or set {}.",
            id.api_key_env()
        )
    })?;

    let mut settings = ProviderSettings::new(provider_cfg.api_key.clone())
        .with_units(config.weather.units)
        .with_forecast_days(config.weather.forecast_days)
        .with_timeout(config.request_timeout());
    settings.language = config.weather.language.clone();
    settings.base_url = provider_cfg.base_url.clone();

    let boxed: Box<dyn WeatherProvider> = match id {
        ProviderId::OpenWeather => Box::new(OpenWeatherProvider::new(settings)?),
        ProviderId::WeatherApi => Box::new(WeatherApiProvider::new(settings)?),
    };

    Ok(boxed)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_is_case_insensitive() {
        assert_eq!(ProviderId::try_from(" OpenWeather ").unwrap(), ProviderId::OpenWeather);
        assert_eq!("WeatherAPI".parse::<ProviderId>().unwrap(), ProviderId::WeatherApi);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(ProviderId::OpenWeather, &cfg).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No API key configured for provider"));
        assert!(msg.contains("OPENWEATHER_API_KEY"));
    }

    #[test]
    fn default_provider_from_config_errors_when_not_set() {
        let cfg = Config::default();
        let err = default_provider_from_config(&cfg).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No default provider configured"));
        assert!(msg.contains("Hint: run `weather-dashboard configure"));
    }

    #[test]
    fn default_provider_from_config_works_when_set_and_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::WeatherApi, "KEY".to_string());

        let provider = default_provider_from_config(&cfg).expect("provider should build");
        assert_eq!(provider.id(), ProviderId::WeatherApi);
    }

    #[test]
    fn forecast_horizon_is_at_least_one_day() {
        assert_eq!(ProviderSettings::new("KEY").with_forecast_days(0).forecast_days, 1);
        assert_eq!(ProviderSettings::new("KEY").with_forecast_days(3).forecast_days, 3);
    }

    #[test]
    fn unix_to_utc_converts_seconds() {
        assert_eq!(unix_to_utc(1772366400).unwrap().timestamp(), 1772366400);
    }

    #[test]
    fn base_url_override_drops_trailing_slash() {
        let settings = ProviderSettings::new("KEY").with_base_url("http://127.0.0.1:9000/");
        assert_eq!(settings.base_url_or("https://example.com"), "http://127.0.0.1:9000");

        let settings = ProviderSettings::new("KEY");
        assert_eq!(settings.base_url_or("https://example.com"), "https://example.com");
    }
}
