//! Groups timestamped forecast readings into local calendar days.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::model::ForecastDay;

/// A single point-in-time forecast sample, e.g. one 3-hour slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub at: DateTime<Utc>,
    pub temp: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub condition: String,
    pub precipitation_mm: f64,
}

/// Fold `readings` into at most `max_days` days, keyed by the date at
/// `utc_offset_secs` from UTC.
///
/// The first reading of a day supplies `temp`, `humidity` and `condition`;
/// min/max temperatures and wind are extremes over the day and precipitation
/// is summed. Days keep the order in which they first appear.
pub fn aggregate_daily(readings: &[Reading], utc_offset_secs: i32, max_days: usize) -> Vec<ForecastDay> {
    let offset = FixedOffset::east_opt(utc_offset_secs).unwrap_or_else(|| Utc.fix());

    let mut days: Vec<ForecastDay> = Vec::new();

    for reading in readings {
        let date: NaiveDate = reading.at.with_timezone(&offset).date_naive();

        if let Some(day) = days.iter_mut().find(|d| d.date == date) {
            day.temp_min = day.temp_min.min(reading.temp_min);
            day.temp_max = day.temp_max.max(reading.temp_max);
            day.wind_speed = day.wind_speed.max(reading.wind_speed);
            day.precipitation_mm += reading.precipitation_mm;
            continue;
        }

        if days.len() == max_days {
            break;
        }

        days.push(ForecastDay {
            date,
            temp: reading.temp,
            temp_min: reading.temp_min,
            temp_max: reading.temp_max,
            humidity: reading.humidity,
            wind_speed: reading.wind_speed,
            condition: reading.condition.clone(),
            precipitation_mm: reading.precipitation_mm,
        });
    }

    days
}
