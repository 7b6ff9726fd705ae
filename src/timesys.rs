//! Conversions between analysis timestamps (epoch seconds) and calendar
//! days/months.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

pub const SECS_PER_DAY: f64 = 86_400.0;

pub trait TimeSystem {
    fn to_datetime(&self, t: f64) -> Option<DateTime<Utc>>;

    fn from_datetime(&self, dt: DateTime<Utc>) -> f64;

    fn date_of(&self, t: f64) -> Option<NaiveDate> {
        self.to_datetime(t).map(|dt| dt.date_naive())
    }

    fn day_start(&self, date: NaiveDate) -> f64 {
        self.from_datetime(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    fn month_start(&self, year: i32, month: u32) -> f64 {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|d| self.day_start(d))
            .unwrap_or(f64::NAN)
    }
}

/// Seconds since 1970-01-01T00:00:00Z, no leap seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixUtc;

impl TimeSystem for UnixUtc {
    fn to_datetime(&self, t: f64) -> Option<DateTime<Utc>> {
        if !t.is_finite() {
            return None;
        }
        let secs = t.floor();
        let nanos = ((t - secs) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(secs as i64, nanos)
    }

    fn from_datetime(&self, dt: DateTime<Utc>) -> f64 {
        dt.timestamp() as f64 + dt.timestamp_subsec_nanos() as f64 * 1e-9
    }
}

/// Parse a time given as `YYYY-MM-DD HH:MM[:SS]`, `YYYY-MM-DD`,
/// `YYYY:DOY[:HH:MM[:SS]]` or plain epoch seconds.
pub fn parse_time(s: &str) -> Result<f64, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Ok(secs);
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(UnixUtc.from_datetime(dt.and_utc()));
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(UnixUtc.day_start(d));
    }

    parse_day_of_year(s).ok_or_else(|| {
        format!(
            "Invalid time: {}. Use YYYY-MM-DD HH:MM, YYYY:DOY or epoch seconds",
            s
        )
    })
}

fn parse_day_of_year(s: &str) -> Option<f64> {
    let mut parts = s.split(':');
    let year: i32 = parts.next()?.parse().ok()?;
    let doy: u32 = parts.next()?.parse().ok()?;
    let date = NaiveDate::from_yo_opt(year, doy)?;

    let mut secs = UnixUtc.day_start(date);
    for (scale, part) in [3600.0, 60.0, 1.0].into_iter().zip(parts.by_ref()) {
        secs += scale * part.parse::<f64>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(secs)
}

/// Format a timestamp for tables and logs.
pub fn format_time(t: f64) -> String {
    UnixUtc
        .to_datetime(t)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "--".to_string())
}

/// Month label such as `2013-04`.
pub fn month_label(year: i32, month: u32) -> String {
    format!("{:04}-{:02}", year, month)
}

pub fn year_month(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

/// Accepts either epoch seconds or any string understood by [`parse_time`].
pub fn deserialize_time<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimeRepr {
        Secs(f64),
        Text(String),
    }

    match TimeRepr::deserialize(deserializer)? {
        TimeRepr::Secs(secs) => Ok(secs),
        TimeRepr::Text(text) => parse_time(&text).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats_agree() {
        let a = parse_time("2013-04-11 00:00").unwrap();
        let b = parse_time("2013:101").unwrap();
        let c = parse_time("2013-04-11").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a, 1_365_638_400.0);
    }

    #[test]
    fn test_parse_day_of_year_with_clock() {
        let t = parse_time("2000:001:01:30:15").unwrap();
        assert_eq!(t, 946_684_800.0 + 5415.0);
        assert!(parse_time("2000:400").is_err());
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_calendar_helpers() {
        let ts = UnixUtc;
        let date = ts.date_of(1_365_638_400.0 + 3600.0).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2013, 4, 11).unwrap());
        assert_eq!(ts.month_start(1970, 2), 31.0 * SECS_PER_DAY);
    }

    #[test]
    fn test_fractional_seconds_round_trip() {
        let ts = UnixUtc;
        let dt = ts.to_datetime(100.25).unwrap();
        assert_eq!(ts.from_datetime(dt), 100.25);
        assert!(ts.to_datetime(f64::NAN).is_none());
    }
}
