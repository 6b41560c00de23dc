//! Unit-aware display formatting. Absent or non-finite input renders as
//! [`PLACEHOLDER`].

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::state::{TemperatureUnit, TimeFormat, WindSpeedUnit};

pub const PLACEHOLDER: &str = "--";

const KMH_TO_MPH: f64 = 0.621371;
const KMH_TO_MS: f64 = 0.277778;

/// Round half toward positive infinity, matching how the dashboard has always
/// displayed values (-2.5 shows as -2).
fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

pub fn format_temperature(celsius: Option<f64>, unit: TemperatureUnit) -> String {
    let Some(celsius) = finite(celsius) else {
        return PLACEHOLDER.to_string();
    };

    match unit {
        TemperatureUnit::Fahrenheit => {
            format!("{}°F", round_half_up(celsius * 9.0 / 5.0 + 32.0))
        }
        TemperatureUnit::Celsius => format!("{}°C", round_half_up(celsius)),
    }
}

pub fn format_wind_speed(kmh: Option<f64>, unit: WindSpeedUnit) -> String {
    let Some(kmh) = finite(kmh) else {
        return PLACEHOLDER.to_string();
    };

    match unit {
        WindSpeedUnit::Mph => format!("{} mph", round_half_up(kmh * KMH_TO_MPH)),
        WindSpeedUnit::Ms => format!("{} m/s", round_half_up(kmh * KMH_TO_MS)),
        WindSpeedUnit::Kmh => format!("{} km/h", round_half_up(kmh)),
    }
}

/// Parse the local wall-clock time of an API timestamp.
///
/// Forecast times come without an offset ("2026-10-18T07:31") and are already
/// local to the forecast site; offset-qualified times keep their own wall clock.
fn parse_wall_clock(time: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(time)
                .ok()
                .map(|dt| dt.naive_local())
        })
}

pub fn format_time(time: Option<&str>, format: TimeFormat) -> String {
    let Some(parsed) = time.map(str::trim).and_then(parse_wall_clock) else {
        return PLACEHOLDER.to_string();
    };

    match format {
        TimeFormat::TwelveHour => parsed.format("%-I:%M %p").to_string(),
        TimeFormat::TwentyFourHour => parsed.format("%H:%M").to_string(),
    }
}

/// "Just now", "5m ago", "3h ago", "2d ago", then a short date.
pub fn format_time_ago(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return String::new();
    };

    let elapsed = now - timestamp;
    if elapsed.num_minutes() < 1 {
        "Just now".to_string()
    } else if elapsed.num_minutes() < 60 {
        format!("{}m ago", elapsed.num_minutes())
    } else if elapsed.num_hours() < 24 {
        format!("{}h ago", elapsed.num_hours())
    } else if elapsed.num_days() < 7 {
        format!("{}d ago", elapsed.num_days())
    } else {
        timestamp.format("%b %-d").to_string()
    }
}

/// "40.7128°N, 74.0060°W"
pub fn format_coordinates(latitude: f64, longitude: f64, precision: usize) -> String {
    let lat_dir = if latitude >= 0.0 { 'N' } else { 'S' };
    let lon_dir = if longitude >= 0.0 { 'E' } else { 'W' };
    format!(
        "{:.prec$}°{}, {:.prec$}°{}",
        latitude.abs(),
        lat_dir,
        longitude.abs(),
        lon_dir,
        prec = precision
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_placeholder_for_missing_values() {
        assert_eq!(format_temperature(None, TemperatureUnit::Celsius), PLACEHOLDER);
        assert_eq!(format_wind_speed(None, WindSpeedUnit::Mph), PLACEHOLDER);
        assert_eq!(format_time(None, TimeFormat::TwelveHour), PLACEHOLDER);
        assert_eq!(
            format_temperature(Some(f64::NAN), TemperatureUnit::Fahrenheit),
            PLACEHOLDER
        );
    }

    #[test]
    fn test_temperature_units() {
        assert_eq!(format_temperature(Some(21.6), TemperatureUnit::Celsius), "22°C");
        assert_eq!(format_temperature(Some(0.0), TemperatureUnit::Fahrenheit), "32°F");
        assert_eq!(format_temperature(Some(-40.0), TemperatureUnit::Fahrenheit), "-40°F");
        assert_eq!(format_temperature(Some(-2.5), TemperatureUnit::Celsius), "-2°C");
    }

    #[test]
    fn test_wind_units() {
        assert_eq!(format_wind_speed(Some(18.0), WindSpeedUnit::Kmh), "18 km/h");
        assert_eq!(format_wind_speed(Some(18.0), WindSpeedUnit::Mph), "11 mph");
        assert_eq!(format_wind_speed(Some(18.0), WindSpeedUnit::Ms), "5 m/s");
    }

    #[test]
    fn test_time_formats() {
        assert_eq!(
            format_time(Some("2026-10-18T07:31"), TimeFormat::TwentyFourHour),
            "07:31"
        );
        assert_eq!(
            format_time(Some("2026-10-18T19:05"), TimeFormat::TwelveHour),
            "7:05 PM"
        );
        assert_eq!(
            format_time(Some("2026-10-18T00:15:00+02:00"), TimeFormat::TwentyFourHour),
            "00:15"
        );
        assert_eq!(format_time(Some("yesterday"), TimeFormat::TwelveHour), PLACEHOLDER);
    }

    #[test]
    fn test_time_ago() {
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        assert_eq!(format_time_ago(None, now), "");
        assert_eq!(format_time_ago(Some(now), now), "Just now");
        assert_eq!(
            format_time_ago(Some(now - chrono::Duration::minutes(5)), now),
            "5m ago"
        );
        assert_eq!(
            format_time_ago(Some(now - chrono::Duration::hours(3)), now),
            "3h ago"
        );
        assert_eq!(
            format_time_ago(Some(now - chrono::Duration::days(2)), now),
            "2d ago"
        );
        assert_eq!(
            format_time_ago(Some(now - chrono::Duration::days(30)), now),
            "Sep 18"
        );
    }

    #[test]
    fn test_coordinates() {
        assert_eq!(
            format_coordinates(40.7128, -74.006, 4),
            "40.7128°N, 74.0060°W"
        );
        assert_eq!(format_coordinates(-33.87, 151.21, 1), "33.9°S, 151.2°E");
    }
}
