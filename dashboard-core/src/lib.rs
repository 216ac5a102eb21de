//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers
//! - Shared domain models (weather data, daily forecasts)
//! - The error taxonomy surfaced by the HTTP API
//!
//! It is used by `dashboard-server`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod forecast;
pub mod model;
pub mod provider;

pub use config::{Config, ProviderConfig, ServerConfig, WeatherConfig};
pub use error::WeatherError;
pub use model::{CurrentConditions, DailyForecast, ForecastDay, Location, Units, WeatherData};
pub use provider::{ProviderId, ProviderSettings, WeatherProvider};
