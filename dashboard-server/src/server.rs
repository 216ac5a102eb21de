//! HTTP surface: routes, handlers and the mapping from lookup failures to
//! status codes.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use dashboard_core::{DailyForecast, WeatherData, WeatherError, WeatherProvider};
use serde_json::json;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub provider: Arc<dyn WeatherProvider>,
}

impl AppState {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }
}

/// Error returned by handlers; rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Internal(String),
}

impl ApiError {
    fn lookup_failed(city: &str, provider: &str, err: WeatherError) -> Self {
        if err.is_not_found() {
            tracing::info!(city, provider, "city not found");
            ApiError::NotFound("City not found")
        } else {
            tracing::error!(city, provider, error = %err, "weather lookup failed");
            ApiError::Internal(err.to_string())
        }
    }
}

impl ApiError {
    /// A city segment that doesn't decode to UTF-8 names no city.
    fn bad_path(rejection: PathRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected city path");
        ApiError::NotFound("Not Found")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail.to_string()),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Internal server error: {msg}"))
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/weather/{city}", get(current_weather))
        .route("/api/weather/monthly/{city}", get(monthly_forecast))
        .fallback(fallback)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let local = listener.local_addr().context("Failed to read bound address")?;
    tracing::info!(addr = %local, provider = %state.provider.id(), "weather dashboard listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated with an error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

async fn health() -> &'static str {
    "ok"
}

async fn fallback() -> ApiError {
    ApiError::NotFound("Not Found")
}

/// GET /api/weather/{city}
async fn current_weather(
    State(state): State<AppState>,
    city: Result<Path<String>, PathRejection>,
) -> Result<Json<WeatherData>, ApiError> {
    let Path(city) = city.map_err(ApiError::bad_path)?;
    let city = normalize_city(&city)?;
    let provider = state.provider.id();

    let data = state
        .provider
        .current_weather(city)
        .await
        .map_err(|e| ApiError::lookup_failed(city, provider.as_str(), e))?;

    tracing::info!(city, %provider, days = data.forecast.len(), "served current weather");
    Ok(Json(data))
}

/// GET /api/weather/monthly/{city}
async fn monthly_forecast(
    State(state): State<AppState>,
    city: Result<Path<String>, PathRejection>,
) -> Result<Json<DailyForecast>, ApiError> {
    let Path(city) = city.map_err(ApiError::bad_path)?;
    let city = normalize_city(&city)?;
    let provider = state.provider.id();

    let forecast = state
        .provider
        .daily_forecast(city)
        .await
        .map_err(|e| ApiError::lookup_failed(city, provider.as_str(), e))?;

    tracing::info!(city, %provider, days = forecast.cnt, "served daily forecast");
    Ok(Json(forecast))
}

fn normalize_city(raw: &str) -> Result<&str, ApiError> {
    let city = raw.trim();
    if city.is_empty() {
        return Err(ApiError::NotFound("Not Found"));
    }
    Ok(city)
}
