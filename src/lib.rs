pub mod calendar;
pub mod classify;
pub mod config;
pub mod cycles;
pub mod data_loading;
pub mod error;
pub mod extrema;
pub mod output;
pub mod power;
pub mod report;
pub mod search;
pub mod timesys;

pub use config::{AnalysisOptions, AnalysisWindow, EmptyDayPolicy, ThresholdRange};
pub use error::{DataError, Result};
pub use report::{analyze, StatsReport};

use serde::Serialize;

/// One telemetry reading. `time` is seconds since the Unix epoch (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub value: f64,
}

/// An ordered telemetry series. Timestamps are non-decreasing but may be
/// irregularly spaced and contain gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub id: String,
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Series {
    pub fn new(id: impl Into<String>, times: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        let id = id.into();
        if times.len() != values.len() {
            return Err(DataError::LengthMismatch {
                series: id,
                times: times.len(),
                values: values.len(),
            });
        }
        if let Some(index) = times.windows(2).position(|w| !(w[0] <= w[1])) {
            return Err(DataError::UnsortedSeries {
                series: id,
                index: index + 1,
            });
        }
        Ok(Series { id, times, values })
    }

    pub fn from_samples(
        id: impl Into<String>,
        samples: impl IntoIterator<Item = Sample>,
    ) -> Result<Self> {
        let (times, values) = samples.into_iter().map(|s| (s.time, s.value)).unzip();
        Series::new(id, times, values)
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn sample(&self, idx: usize) -> Option<Sample> {
        Some(Sample {
            time: *self.times.get(idx)?,
            value: *self.values.get(idx)?,
        })
    }
}

/// One complete ON->OFF heater activation with its energy estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cycle {
    pub on_time: f64,
    pub off_time: f64,
    /// Seconds.
    pub duration: f64,
    /// Bus voltage at `on_time`, volts.
    pub voltage: f64,
    /// Watt-hours.
    pub energy: f64,
}
