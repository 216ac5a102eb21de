use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Unit system used for temperatures and wind speeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Celsius, meters per second.
    #[default]
    Metric,
    /// Fahrenheit, miles per hour.
    Imperial,
    /// Kelvin, meters per second.
    Standard,
}

impl Units {
    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
            Units::Standard => "K",
        }
    }

    pub fn wind_speed_symbol(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric | Units::Standard => "m/s",
        }
    }
}

/// Resolved place the weather belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

/// Instantaneous reading for a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub pressure: u32,
    pub condition: String,
    pub observed_at: DateTime<Utc>,
}

/// One forecast day, local to the city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition: String,
    pub precipitation_mm: f64,
}

/// Body returned by `GET /api/weather/{city}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherData {
    pub current: CurrentConditions,
    pub forecast: Vec<ForecastDay>,
    pub location: Location,
    pub provider: String,
}

/// Body returned by `GET /api/weather/monthly/{city}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub location: Location,
    pub cnt: usize,
    pub list: Vec<ForecastDay>,
}

impl DailyForecast {
    pub fn new(location: Location, list: Vec<ForecastDay>) -> Self {
        Self { location, cnt: list.len(), list }
    }
}
