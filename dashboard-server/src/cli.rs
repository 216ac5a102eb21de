use std::{fmt::Write as _, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dashboard_core::{
    Config, ProviderId, Units, WeatherData, WeatherProvider,
    provider::{default_provider_from_config, provider_from_config},
};
use inquire::{Password, PasswordDisplayMode};

use crate::server::{self, AppState};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dashboard", version, about = "Weather dashboard API server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the weather HTTP API.
    Serve {
        /// Address to listen on, e.g. "127.0.0.1:8001". Defaults to `server.bind` from config.
        #[arg(long)]
        bind: Option<String>,

        /// Provider to query instead of the configured default.
        #[arg(long)]
        provider: Option<ProviderId>,
    },

    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: ProviderId,

        /// API key; prompted for when omitted.
        #[arg(long)]
        api_key: Option<String>,

        /// Make this provider the default.
        #[arg(long)]
        default: bool,
    },

    /// Show weather for a city.
    Show {
        /// City name in English.
        city: String,

        /// Provider to query instead of the configured default.
        #[arg(long)]
        provider: Option<ProviderId>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve { bind, provider } => {
                let config = Config::load()?;
                let provider = resolve_provider(&config, provider)?;
                let bind = bind.unwrap_or_else(|| config.server.bind.clone());

                server::serve(&bind, AppState::new(provider)).await
            }
            Command::Configure { provider, api_key, default } => {
                configure(provider, api_key, default)
            }
            Command::Show { city, provider } => {
                let config = Config::load()?;
                let provider = resolve_provider(&config, provider)?;

                let data = provider
                    .current_weather(&city)
                    .await
                    .with_context(|| format!("Failed to fetch weather for '{city}'"))?;

                print!("{}", render_weather(&data, config.weather.units));
                Ok(())
            }
        }
    }
}

fn resolve_provider(
    config: &Config,
    explicit: Option<ProviderId>,
) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let boxed = match explicit {
        Some(id) => provider_from_config(id, config)?,
        None => default_provider_from_config(config)?,
    };
    Ok(Arc::from(boxed))
}

fn configure(provider: ProviderId, api_key: Option<String>, make_default: bool) -> anyhow::Result<()> {
    // Read the file directly so environment overrides are not persisted.
    let path = Config::config_file_path()?;
    let mut config = Config::load_from(&path)?;

    let api_key = match api_key {
        Some(key) => key,
        None => {
            let prompt = format!("{provider} API key:");
            Password::new(&prompt)
                .with_display_mode(PasswordDisplayMode::Masked)
                .without_confirmation()
                .prompt()
                .context("Failed to read API key")?
        }
    };

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        anyhow::bail!("API key for '{provider}' must not be empty");
    }

    config.upsert_provider_api_key(provider, api_key);
    if make_default {
        config.set_default_provider(provider);
    }
    let path = config.save()?;

    println!("Saved {provider} credentials to {}", path.display());
    Ok(())
}

/// Human-readable rendering used by `show`.
fn render_weather(data: &WeatherData, units: Units) -> String {
    let t = units.temperature_symbol();
    let w = units.wind_speed_symbol();
    let mut out = String::new();

    let _ = writeln!(out, "{}, {} (via {})", data.location.name, data.location.country, data.provider);
    let _ = writeln!(
        out,
        "Now: {:.1}{t} (feels like {:.1}{t}), {}",
        data.current.temp, data.current.feels_like, data.current.condition
    );
    let _ = writeln!(
        out,
        "Humidity {}%, wind {:.1} {w}, pressure {} hPa",
        data.current.humidity, data.current.wind_speed, data.current.pressure
    );

    if !data.forecast.is_empty() {
        let _ = writeln!(out, "Forecast:");
        for day in &data.forecast {
            let _ = writeln!(
                out,
                "  {}  {:.1}{t} .. {:.1}{t}  {}  ({:.1} mm)",
                day.date, day.temp_min, day.temp_max, day.condition, day.precipitation_mm
            );
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use dashboard_core::{CurrentConditions, ForecastDay, Location};

    #[test]
    fn parses_serve_with_provider() {
        let cli = Cli::try_parse_from([
            "weather-dashboard",
            "serve",
            "--bind",
            "127.0.0.1:9000",
            "--provider",
            "weatherapi",
        ])
        .unwrap();

        match cli.command {
            Command::Serve { bind, provider } => {
                assert_eq!(bind.as_deref(), Some("127.0.0.1:9000"));
                assert_eq!(provider, Some(ProviderId::WeatherApi));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = Cli::try_parse_from(["weather-dashboard", "configure", "darksky"]).unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn render_includes_current_and_forecast() {
        let data = WeatherData {
            current: CurrentConditions {
                temp: 11.24,
                feels_like: 10.0,
                humidity: 76,
                wind_speed: 4.6,
                pressure: 1015,
                condition: "broken clouds".into(),
                observed_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            },
            forecast: vec![ForecastDay {
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                temp: 9.0,
                temp_min: 6.0,
                temp_max: 12.0,
                humidity: 80,
                wind_speed: 5.0,
                condition: "light rain".into(),
                precipitation_mm: 2.5,
            }],
            location: Location { name: "London".into(), country: "GB".into(), lat: 51.5, lon: -0.12 },
            provider: "openweather".into(),
        };

        let text = render_weather(&data, Units::Metric);

        assert!(text.starts_with("London, GB (via openweather)"));
        assert!(text.contains("Now: 11.2°C"));
        assert!(text.contains("wind 4.6 m/s"));
        assert!(text.contains("2026-03-02  6.0°C .. 12.0°C  light rain  (2.5 mm)"));
    }
}
