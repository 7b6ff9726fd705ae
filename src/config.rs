use crate::error::{DataError, Result};
use crate::timesys::{self, TimeSystem};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Load resistance of the heater circuits, ohms.
pub const DEFAULT_LOAD_RESISTANCE: f64 = 40.0;

/// Start of the archive, used when no start time is given.
pub const DEFAULT_START_TIME: &str = "2000:001";

/// Temperature window an extremum must fall in to count as an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdRange {
    /// Legacy one-sided bound: ON events need `v < x`, OFF events `v > x`.
    Single(f64),
    /// Two-sided `[low, high)`.
    Interval { low: f64, high: f64 },
}

impl FromStr for ThresholdRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| format!("Invalid threshold: {}. Use 35 or 25:35", s))
        };

        match s.split_once([':', ',']) {
            Some((low, high)) => {
                let range = ThresholdRange::Interval {
                    low: parse(low)?,
                    high: parse(high)?,
                };
                range.check().map_err(|e| e.to_string())?;
                Ok(range)
            }
            None => Ok(ThresholdRange::Single(parse(s)?)),
        }
    }
}

impl ThresholdRange {
    fn check(&self) -> Result<()> {
        match *self {
            ThresholdRange::Single(x) if x.is_nan() => Err(DataError::InvalidOptions(
                "threshold must be a number".to_string(),
            )),
            ThresholdRange::Interval { low, high } if !(low < high) => {
                Err(DataError::InvalidOptions(format!(
                    "threshold interval [{}, {}) is empty",
                    low, high
                )))
            }
            _ => Ok(()),
        }
    }
}

/// How month-level means of daily values treat days without cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyDayPolicy {
    /// Leave NaN days out of the mean.
    #[default]
    Skip,
    /// Count NaN days as zero.
    Zero,
}

impl FromStr for EmptyDayPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "skip" => Ok(EmptyDayPolicy::Skip),
            "zero" => Ok(EmptyDayPolicy::Zero),
            _ => Err(format!("Invalid empty day policy: {}. Use skip or zero", s)),
        }
    }
}

/// Analysis horizon `[start, stop)` in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    #[serde(deserialize_with = "timesys::deserialize_time")]
    pub start: f64,
    #[serde(deserialize_with = "timesys::deserialize_time")]
    pub stop: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default)]
    pub on_range: Option<ThresholdRange>,
    #[serde(default)]
    pub off_range: Option<ThresholdRange>,
    /// Cycles longer than this many seconds are dropped.
    #[serde(default)]
    pub duration_limit: Option<f64>,
    pub analysis_window: AnalysisWindow,
    #[serde(default = "default_load_resistance")]
    pub load_resistance: f64,
    #[serde(default)]
    pub empty_day_policy: EmptyDayPolicy,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_load_resistance() -> f64 {
    DEFAULT_LOAD_RESISTANCE
}

impl AnalysisOptions {
    pub fn new(start: f64, stop: f64) -> Self {
        AnalysisOptions {
            on_range: None,
            off_range: None,
            duration_limit: None,
            analysis_window: AnalysisWindow { start, stop },
            load_resistance: DEFAULT_LOAD_RESISTANCE,
            empty_day_policy: EmptyDayPolicy::Skip,
            label: None,
        }
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let options: AnalysisOptions = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        let AnalysisWindow { start, stop } = self.analysis_window;
        if !(start.is_finite() && stop.is_finite()) {
            return Err(DataError::InvalidOptions(format!(
                "analysis window [{}, {}) must have finite bounds",
                start, stop
            )));
        }
        if !(start < stop) {
            return Err(DataError::InvalidOptions(format!(
                "analysis window start {} is not before stop {}",
                start, stop
            )));
        }
        if !(self.load_resistance > 0.0) {
            return Err(DataError::InvalidOptions(format!(
                "load resistance must be positive, got {}",
                self.load_resistance
            )));
        }
        if let Some(limit) = self.duration_limit {
            if !(limit > 0.0) {
                return Err(DataError::InvalidOptions(format!(
                    "duration limit must be positive, got {}",
                    limit
                )));
            }
        }
        for range in self.on_range.iter().chain(self.off_range.iter()) {
            range.check()?;
        }
        Ok(())
    }
}

/// Derive heater duty-cycle statistics from archived temperature telemetry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Directory holding the telemetry archive
    #[arg(help = "Directory holding the telemetry archive (CSV or Feather files)")]
    pub archive: PathBuf,

    /// Temperature MSID of the heater-controlled thermistor
    #[arg(long)]
    pub temperature: String,

    /// Bus voltage MSID used for energy estimates
    #[arg(long, default_value = "ELBV")]
    pub voltage: String,

    /// Cadence suffix of the voltage archive files; empty reads `<id>.csv`
    #[arg(long, default_value = "5min")]
    pub voltage_cadence: String,

    /// Read Feather files instead of CSV
    #[arg(long)]
    pub feather_input: bool,

    /// JSON file with analysis options; command line flags override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Start time (format: YYYY-MM-DD HH:MM or YYYY:DOY), defaults to 2000:001
    #[arg(long)]
    pub start_time: Option<String>,

    /// End time (format: YYYY-MM-DD HH:MM or YYYY:DOY), defaults to now
    #[arg(long)]
    pub end_time: Option<String>,

    /// Heater ON temperature range: upper bound (e.g. 35) or interval low:high
    #[arg(long)]
    pub on_range: Option<ThresholdRange>,

    /// Heater OFF temperature range: lower bound (e.g. 85) or interval low:high
    #[arg(long)]
    pub off_range: Option<ThresholdRange>,

    /// Drop cycles longer than this many seconds
    #[arg(long)]
    pub duration_limit: Option<f64>,

    /// Heater load resistance in ohms
    #[arg(long)]
    pub load_resistance: Option<f64>,

    /// How monthly means treat days without cycles (skip or zero)
    #[arg(long)]
    pub empty_day_policy: Option<EmptyDayPolicy>,

    /// Display name of the heater
    #[arg(long)]
    pub label: Option<String>,

    /// CSV output file prefix (e.g. /path/to/output/prefix)
    #[arg(long)]
    pub csv_output: Option<String>,

    /// Write the full report as JSON to this path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Export the raw samples nearest to each matched ON/OFF time
    #[arg(long)]
    pub mark_cycles: bool,

    /// Number of bins in the cycle duration histogram
    #[arg(long, default_value = "100")]
    pub histogram_bins: usize,
}

impl Args {
    /// Cadence suffix to fetch voltage with, `None` for the raw series.
    pub fn voltage_cadence_suffix(&self) -> Option<&str> {
        Some(self.voltage_cadence.trim()).filter(|c| !c.is_empty())
    }

    /// Merge command line flags over `base` (file options, if any).
    pub fn apply_to(&self, base: Option<AnalysisOptions>) -> anyhow::Result<AnalysisOptions> {
        let start = self
            .start_time
            .as_deref()
            .map(timesys::parse_time)
            .transpose()
            .map_err(anyhow::Error::msg)?;
        let stop = self
            .end_time
            .as_deref()
            .map(timesys::parse_time)
            .transpose()
            .map_err(anyhow::Error::msg)?;

        let mut options = match base {
            Some(options) => options,
            None => AnalysisOptions::new(
                timesys::parse_time(DEFAULT_START_TIME).map_err(anyhow::Error::msg)?,
                timesys::UnixUtc.from_datetime(chrono::Utc::now()),
            ),
        };

        if let Some(start) = start {
            options.analysis_window.start = start;
        }
        if let Some(stop) = stop {
            options.analysis_window.stop = stop;
        }

        if self.on_range.is_some() {
            options.on_range = self.on_range;
        }
        if self.off_range.is_some() {
            options.off_range = self.off_range;
        }
        if self.duration_limit.is_some() {
            options.duration_limit = self.duration_limit;
        }
        if let Some(r) = self.load_resistance {
            options.load_resistance = r;
        }
        if let Some(policy) = self.empty_day_policy {
            options.empty_day_policy = policy;
        }
        if self.label.is_some() {
            options.label = self.label.clone();
        }

        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_from_str() {
        assert_eq!("35".parse::<ThresholdRange>(), Ok(ThresholdRange::Single(35.0)));
        assert_eq!(
            "25:35".parse::<ThresholdRange>(),
            Ok(ThresholdRange::Interval { low: 25.0, high: 35.0 })
        );
        assert_eq!(
            "40, 60".parse::<ThresholdRange>(),
            Ok(ThresholdRange::Interval { low: 40.0, high: 60.0 })
        );
        assert!("60:40".parse::<ThresholdRange>().is_err());
        assert!("warm".parse::<ThresholdRange>().is_err());
    }

    #[test]
    fn test_options_from_json() {
        let options = AnalysisOptions::from_json(
            r#"{
                "on_range": [40, 60],
                "off_range": 70,
                "duration_limit": 3600,
                "analysis_window": { "start": "2013:101", "stop": "2013-07-19 00:00" },
                "empty_day_policy": "zero"
            }"#,
        )
        .unwrap();

        assert_eq!(
            options.on_range,
            Some(ThresholdRange::Interval { low: 40.0, high: 60.0 })
        );
        assert_eq!(options.off_range, Some(ThresholdRange::Single(70.0)));
        assert_eq!(options.duration_limit, Some(3600.0));
        assert_eq!(options.analysis_window.start, 1_365_638_400.0);
        assert_eq!(options.load_resistance, DEFAULT_LOAD_RESISTANCE);
        assert_eq!(options.empty_day_policy, EmptyDayPolicy::Zero);
    }

    #[test]
    fn test_validate_rejects_bad_options() {
        assert!(AnalysisOptions::new(10.0, 5.0).validate().is_err());

        let mut options = AnalysisOptions::new(0.0, 10.0);
        options.load_resistance = 0.0;
        assert!(options.validate().is_err());

        let mut options = AnalysisOptions::new(0.0, 10.0);
        options.duration_limit = Some(-1.0);
        assert!(options.validate().is_err());

        assert!(matches!(
            AnalysisOptions::new(0.0, f64::INFINITY).validate(),
            Err(DataError::InvalidOptions(_))
        ));
        assert!(AnalysisOptions::new(f64::NAN, 10.0).validate().is_err());
        assert!(AnalysisOptions::new(f64::NEG_INFINITY, 10.0).validate().is_err());

        let mut options = AnalysisOptions::new(0.0, 10.0);
        options.off_range = Some(ThresholdRange::Interval { low: 5.0, high: 5.0 });
        assert!(matches!(
            options.validate(),
            Err(DataError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_args_override_file_options() {
        let args = Args::parse_from([
            "heater-duty",
            "/archive",
            "--temperature",
            "PR3TV01T",
            "--start-time",
            "2013:101",
            "--end-time",
            "2013:200",
            "--off-range",
            "70:90",
            "--duration-limit",
            "3600",
        ]);
        let mut base = AnalysisOptions::new(0.0, 1.0);
        base.on_range = Some(ThresholdRange::Interval { low: 40.0, high: 60.0 });
        base.off_range = Some(ThresholdRange::Single(99.0));

        let options = args.apply_to(Some(base)).unwrap();
        assert_eq!(
            options.on_range,
            Some(ThresholdRange::Interval { low: 40.0, high: 60.0 })
        );
        assert_eq!(
            options.off_range,
            Some(ThresholdRange::Interval { low: 70.0, high: 90.0 })
        );
        assert_eq!(options.duration_limit, Some(3600.0));
        assert_eq!(options.analysis_window.start, 1_365_638_400.0);
        assert_eq!(args.voltage, "ELBV");
        assert_eq!(args.histogram_bins, 100);
        assert_eq!(args.voltage_cadence_suffix(), Some("5min"));
    }

    #[test]
    fn test_empty_voltage_cadence_selects_raw_series() {
        let args = Args::parse_from([
            "heater-duty",
            "/archive",
            "--temperature",
            "PR3TV01T",
            "--voltage-cadence",
            "",
        ]);
        assert_eq!(args.voltage_cadence_suffix(), None);
    }
}
