use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::WeatherError,
    forecast::{Reading, aggregate_daily},
    model::{CurrentConditions, DailyForecast, ForecastDay, Location, WeatherData},
    provider::{ProviderId, ProviderSettings, parse, send, unix_to_utc},
};

use super::WeatherProvider;

const NAME: &str = "openweather";
const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    settings: ProviderSettings,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(settings: ProviderSettings) -> anyhow::Result<Self> {
        let http = settings.http_client()?;
        let base_url = settings.base_url_or(DEFAULT_BASE_URL);
        Ok(Self { settings, base_url, http })
    }

    /// Resolve `city` to coordinates through the direct geocoding endpoint.
    async fn locate(&self, city: &str) -> Result<Location, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::CityNotFound(city.to_string()));
        }

        let url = format!("{}/geo/1.0/direct", self.base_url);
        let request = self.http.get(url).query(&[
            ("q", city),
            ("limit", "1"),
            ("appid", self.settings.api_key.as_str()),
        ]);

        let (status, body) = send(NAME, request).await?;
        if !status.is_success() {
            return Err(WeatherError::upstream(NAME, status, &body));
        }

        let places: Vec<OwGeoPlace> = parse(NAME, &body)?;
        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::CityNotFound(city.to_string()))?;

        tracing::debug!(city, name = %place.name, lat = place.lat, lon = place.lon, "geocoded");

        Ok(Location {
            name: place.name,
            country: place.country,
            lat: place.lat,
            lon: place.lon,
        })
    }

    async fn fetch_data<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        location: &Location,
    ) -> Result<T, WeatherError> {
        let url = format!("{}/data/2.5/{endpoint}", self.base_url);
        let lat = location.lat.to_string();
        let lon = location.lon.to_string();

        let request = self.http.get(url).query(&[
            ("lat", lat.as_str()),
            ("lon", lon.as_str()),
            ("appid", self.settings.api_key.as_str()),
            ("units", self.settings.units.as_str()),
            ("lang", self.settings.language.as_str()),
        ]);

        let (status, body) = send(NAME, request).await?;
        if !status.is_success() {
            return Err(WeatherError::upstream(NAME, status, &body));
        }

        parse(NAME, &body)
    }

    async fn fetch_current(&self, location: &Location) -> Result<CurrentConditions, WeatherError> {
        let parsed: OwCurrentResponse = self.fetch_data("weather", location).await?;
        Ok(parsed.into_conditions())
    }

    async fn fetch_forecast(&self, location: &Location) -> Result<Vec<ForecastDay>, WeatherError> {
        let parsed: OwForecastResponse = self.fetch_data("forecast", location).await?;
        Ok(parsed.into_days(self.settings.forecast_days))
    }
}

#[derive(Debug, Deserialize)]
struct OwGeoPlace {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    #[serde(default)]
    temp_min: Option<f64>,
    #[serde(default)]
    temp_max: Option<f64>,
    #[serde(default)]
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwPrecipitation {
    #[serde(rename = "3h", default)]
    three_hours: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

impl OwCurrentResponse {
    fn into_conditions(self) -> CurrentConditions {
        CurrentConditions {
            temp: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            pressure: self.main.pressure,
            condition: describe(&self.weather),
            observed_at: unix_to_utc(self.dt).unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwCity {
    #[serde(default)]
    timezone: i32,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
    #[serde(default)]
    rain: OwPrecipitation,
    #[serde(default)]
    snow: OwPrecipitation,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

impl OwForecastResponse {
    fn into_days(self, max_days: usize) -> Vec<ForecastDay> {
        let readings: Vec<Reading> = self
            .list
            .into_iter()
            .filter_map(|entry| {
                let at = unix_to_utc(entry.dt)?;
                Some(Reading {
                    at,
                    temp: entry.main.temp,
                    temp_min: entry.main.temp_min.unwrap_or(entry.main.temp),
                    temp_max: entry.main.temp_max.unwrap_or(entry.main.temp),
                    humidity: entry.main.humidity,
                    wind_speed: entry.wind.speed,
                    condition: describe(&entry.weather),
                    precipitation_mm: entry.rain.three_hours + entry.snow.three_hours,
                })
            })
            .collect();

        aggregate_daily(&readings, self.city.timezone, max_days)
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenWeather
    }

    async fn current_weather(&self, city: &str) -> Result<WeatherData, WeatherError> {
        let location = self.locate(city).await?;

        let (current, forecast) =
            tokio::try_join!(self.fetch_current(&location), self.fetch_forecast(&location))?;

        Ok(WeatherData {
            current,
            forecast,
            location,
            provider: NAME.to_string(),
        })
    }

    async fn daily_forecast(&self, city: &str) -> Result<DailyForecast, WeatherError> {
        let location = self.locate(city).await?;
        let days = self.fetch_forecast(&location).await?;
        Ok(DailyForecast::new(location, days))
    }
}

fn describe(weather: &[OwWeather]) -> String {
    weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_response_maps_to_conditions() {
        let parsed: OwCurrentResponse = serde_json::from_value(serde_json::json!({
            "dt": 1772366400,
            "main": { "temp": 8.4, "feels_like": 6.1, "pressure": 1009, "humidity": 87 },
            "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }],
            "wind": { "speed": 5.7, "deg": 240 },
            "name": "London"
        }))
        .unwrap();

        let current = parsed.into_conditions();

        assert_eq!(current.temp, 8.4);
        assert_eq!(current.humidity, 87);
        assert_eq!(current.wind_speed, 5.7);
        assert_eq!(current.pressure, 1009);
        assert_eq!(current.condition, "light rain");
        assert_eq!(current.observed_at.timestamp(), 1772366400);
    }

    #[test]
    fn missing_weather_description_is_unknown() {
        assert_eq!(describe(&[]), "Unknown");
    }

    #[test]
    fn forecast_response_sums_rain_and_snow() {
        let parsed: OwForecastResponse = serde_json::from_value(serde_json::json!({
            "city": { "name": "Oslo", "country": "NO", "timezone": 3600 },
            "list": [
                {
                    "dt": 1772323200,
                    "main": { "temp": -1.0, "feels_like": -4.0, "temp_min": -2.0, "temp_max": 0.0, "humidity": 90 },
                    "weather": [{ "description": "snow" }],
                    "wind": { "speed": 3.0 },
                    "rain": { "3h": 0.4 },
                    "snow": { "3h": 1.1 }
                },
                {
                    "dt": 1772334000,
                    "main": { "temp": 1.0, "feels_like": -1.0, "humidity": 85 },
                    "weather": [],
                    "wind": { "speed": 4.5 }
                }
            ]
        }))
        .unwrap();

        let days = parsed.into_days(5);

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].temp, -1.0);
        assert_eq!(days[0].temp_min, -2.0);
        assert_eq!(days[0].temp_max, 1.0);
        assert_eq!(days[0].wind_speed, 4.5);
        assert!((days[0].precipitation_mm - 1.5).abs() < 1e-9);
        assert_eq!(days[0].condition, "snow");
    }
}
