use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::WeatherError,
    model::{CurrentConditions, DailyForecast, ForecastDay, Location, Units, WeatherData},
    provider::{ProviderId, ProviderSettings, parse, send, unix_to_utc},
};

use super::WeatherProvider;

const NAME: &str = "weatherapi";
const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com";

/// WeatherAPI.com error code for "No matching location found."
const NO_MATCHING_LOCATION: u32 = 1006;

const KELVIN_OFFSET: f64 = 273.15;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    settings: ProviderSettings,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(settings: ProviderSettings) -> anyhow::Result<Self> {
        let http = settings.http_client()?;
        let base_url = settings.base_url_or(DEFAULT_BASE_URL);
        Ok(Self { settings, base_url, http })
    }

    /// `forecast.json` carries location, current conditions and the daily
    /// forecast in one response.
    async fn fetch(&self, city: &str) -> Result<WaForecastResponse, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::CityNotFound(city.to_string()));
        }

        let url = format!("{}/v1/forecast.json", self.base_url);
        let days = self.settings.forecast_days.to_string();

        let request = self.http.get(url).query(&[
            ("key", self.settings.api_key.as_str()),
            ("q", city),
            ("days", days.as_str()),
            ("aqi", "no"),
            ("alerts", "no"),
            ("lang", self.settings.language.as_str()),
        ]);

        let (status, body) = send(NAME, request).await?;

        if !status.is_success() {
            let no_location = serde_json::from_str::<WaErrorResponse>(&body)
                .is_ok_and(|err| err.error.code == NO_MATCHING_LOCATION);
            if no_location {
                return Err(WeatherError::CityNotFound(city.to_string()));
            }
            return Err(WeatherError::upstream(NAME, status, &body));
        }

        parse(NAME, &body)
    }

    fn temperature(&self, celsius: f64, fahrenheit: f64) -> f64 {
        match self.settings.units {
            Units::Metric => celsius,
            Units::Imperial => fahrenheit,
            Units::Standard => celsius + KELVIN_OFFSET,
        }
    }

    fn wind_speed(&self, kph: f64, mph: f64) -> f64 {
        match self.settings.units {
            Units::Imperial => mph,
            Units::Metric | Units::Standard => kph / 3.6,
        }
    }

    fn forecast_days(&self, forecast: WaForecast) -> Vec<ForecastDay> {
        forecast
            .forecastday
            .into_iter()
            .take(self.settings.forecast_days)
            .map(|fd| ForecastDay {
                date: fd.date,
                temp: self.temperature(fd.day.avgtemp_c, fd.day.avgtemp_f),
                temp_min: self.temperature(fd.day.mintemp_c, fd.day.mintemp_f),
                temp_max: self.temperature(fd.day.maxtemp_c, fd.day.maxtemp_f),
                humidity: clamp_pct(fd.day.avghumidity),
                wind_speed: self.wind_speed(fd.day.maxwind_kph, fd.day.maxwind_mph),
                condition: fd.day.condition.text,
                precipitation_mm: fd.day.totalprecip_mm,
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct WaErrorBody {
    code: u32,
}

#[derive(Debug, Deserialize)]
struct WaErrorResponse {
    error: WaErrorBody,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    country: String,
    lat: f64,
    lon: f64,
    localtime_epoch: Option<i64>,
}

impl WaLocation {
    fn to_location(&self) -> Location {
        Location {
            name: self.name.clone(),
            country: self.country.clone(),
            lat: self.lat,
            lon: self.lon,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    temp_f: f64,
    feelslike_c: f64,
    feelslike_f: f64,
    humidity: u8,
    wind_kph: f64,
    wind_mph: f64,
    pressure_mb: f64,
    condition: WaCondition,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaDay {
    maxtemp_c: f64,
    maxtemp_f: f64,
    mintemp_c: f64,
    mintemp_f: f64,
    avgtemp_c: f64,
    avgtemp_f: f64,
    maxwind_kph: f64,
    maxwind_mph: f64,
    #[serde(default)]
    totalprecip_mm: f64,
    avghumidity: f64,
    condition: WaCondition,
}

#[derive(Debug, Deserialize)]
struct WaForecastDay {
    date: NaiveDate,
    day: WaDay,
}

#[derive(Debug, Deserialize)]
struct WaForecast {
    forecastday: Vec<WaForecastDay>,
}

#[derive(Debug, Deserialize)]
struct WaForecastResponse {
    location: WaLocation,
    current: WaCurrent,
    forecast: WaForecast,
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::WeatherApi
    }

    async fn current_weather(&self, city: &str) -> Result<WeatherData, WeatherError> {
        let parsed = self.fetch(city).await?;

        let ts = parsed.current.last_updated_epoch.or(parsed.location.localtime_epoch);
        let observed_at = ts.and_then(unix_to_utc).unwrap_or_else(Utc::now);

        let current = CurrentConditions {
            temp: self.temperature(parsed.current.temp_c, parsed.current.temp_f),
            feels_like: self.temperature(parsed.current.feelslike_c, parsed.current.feelslike_f),
            humidity: parsed.current.humidity,
            wind_speed: self.wind_speed(parsed.current.wind_kph, parsed.current.wind_mph),
            pressure: parsed.current.pressure_mb.round() as u32,
            condition: parsed.current.condition.text,
            observed_at,
        };

        Ok(WeatherData {
            current,
            location: parsed.location.to_location(),
            forecast: self.forecast_days(parsed.forecast),
            provider: NAME.to_string(),
        })
    }

    async fn daily_forecast(&self, city: &str) -> Result<DailyForecast, WeatherError> {
        let parsed = self.fetch(city).await?;
        let location = parsed.location.to_location();
        Ok(DailyForecast::new(location, self.forecast_days(parsed.forecast)))
    }
}

fn clamp_pct(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
