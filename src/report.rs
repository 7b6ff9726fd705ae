use crate::calendar::{self, CalendarAggregates, DayBucket, MonthBucket};
use crate::classify::{self, Event, EventKind};
use crate::config::{AnalysisOptions, AnalysisWindow};
use crate::cycles;
use crate::error::{DataError, Result};
use crate::extrema;
use crate::power;
use crate::search;
use crate::timesys::{TimeSystem, UnixUtc};
use crate::{Cycle, Series};
use log::{debug, info, warn};
use serde::{Serialize, Serializer};
use std::time::{Duration, Instant};

/// Inter-cycle statistics. Each entry belongs to the cycle starting at
/// `time[i]`; the last cycle has no successor and so no entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodSeries {
    pub time: Vec<f64>,
    /// Seconds to the next cycle start.
    pub period: Vec<f64>,
    /// `duration / period`, percent.
    pub duty_cycle: Vec<f64>,
}

impl PeriodSeries {
    fn from_cycles(cycles: &[Cycle]) -> Self {
        let period = calendar::cycle_periods(cycles);
        let time = cycles.iter().take(period.len()).map(|c| c.on_time).collect();
        let duty_cycle = cycles
            .iter()
            .zip(period.iter())
            .map(|(c, p)| c.duration / p * 100.0)
            .collect();
        PeriodSeries {
            time,
            period,
            duty_cycle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBin {
    pub low: f64,
    pub high: f64,
    pub count: usize,
}

/// Everything one analysis run produces, for plotting, export and logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub label: Option<String>,
    pub temperature_id: String,
    pub voltage_id: String,
    pub window: AnalysisWindow,
    /// Per-cycle values, on the `on_time` axis.
    pub cycles: Vec<Cycle>,
    pub periods: PeriodSeries,
    /// Per-day values, on the day-start axis.
    pub days: Vec<DayBucket>,
    /// Per-month values, on the month-start axis.
    pub months: Vec<MonthBucket>,
    /// Label of the month flagged incomplete, if any.
    pub incomplete_month: Option<String>,
    /// Non-fatal conditions met during the run.
    #[serde(serialize_with = "serialize_notices")]
    pub notices: Vec<DataError>,
}

fn serialize_notices<S: Serializer>(
    notices: &[DataError],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_seq(notices.iter().map(|n| n.to_string()))
}

impl StatsReport {
    fn new(
        temperature: &Series,
        voltage: &Series,
        options: &AnalysisOptions,
        cycles: Vec<Cycle>,
        calendar: CalendarAggregates,
        notices: Vec<DataError>,
    ) -> Self {
        let incomplete_month = calendar.incomplete_month().map(|m| m.label.clone());
        StatsReport {
            label: options.label.clone(),
            temperature_id: temperature.id.clone(),
            voltage_id: voltage.id.clone(),
            window: options.analysis_window,
            periods: PeriodSeries::from_cycles(&cycles),
            cycles,
            days: calendar.days,
            months: calendar.months,
            incomplete_month,
            notices,
        }
    }

    pub fn on_times(&self) -> Vec<f64> {
        self.cycles.iter().map(|c| c.on_time).collect()
    }

    pub fn off_times(&self) -> Vec<f64> {
        self.cycles.iter().map(|c| c.off_time).collect()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.cycles.iter().map(|c| c.duration).collect()
    }

    pub fn energies(&self) -> Vec<f64> {
        self.cycles.iter().map(|c| c.energy).collect()
    }

    pub fn total_on_time(&self) -> f64 {
        self.cycles.iter().map(|c| c.duration).sum()
    }

    pub fn total_energy(&self) -> f64 {
        self.cycles.iter().map(|c| c.energy).sum()
    }

    /// Months with the incomplete one left out, for trend lines.
    pub fn complete_months(&self) -> impl Iterator<Item = &MonthBucket> {
        self.months.iter().filter(|m| !m.incomplete)
    }

    /// Equal-width histogram of cycle durations.
    pub fn duration_histogram(&self, bins: usize) -> Vec<HistogramBin> {
        if bins == 0 || self.cycles.is_empty() {
            return Vec::new();
        }
        let (min, max) = self
            .cycles
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c.duration), hi.max(c.duration))
            });
        let width = if max > min { (max - min) / bins as f64 } else { 1.0 };

        let mut hist: Vec<HistogramBin> = (0..bins)
            .map(|i| HistogramBin {
                low: min + i as f64 * width,
                high: min + (i + 1) as f64 * width,
                count: 0,
            })
            .collect();
        for c in &self.cycles {
            let i = (((c.duration - min) / width) as usize).min(bins - 1);
            hist[i].count += 1;
        }
        hist
    }
}

/// The raw samples nearest each matched ON and OFF time, for checking
/// detections against the trace.
pub fn cycle_markers(temperature: &Series, cycles: &[Cycle]) -> Vec<Event> {
    let marker = |time: f64, kind: EventKind| -> Option<Event> {
        let index = search::closest(&temperature.times, time)?;
        let sample = temperature.sample(index)?;
        Some(Event {
            index,
            time: sample.time,
            value: sample.value,
            kind,
        })
    };

    cycles
        .iter()
        .flat_map(|c| [marker(c.on_time, EventKind::On), marker(c.off_time, EventKind::Off)])
        .flatten()
        .collect()
}

#[derive(Debug, Default)]
struct StageTimer {
    last: Option<Instant>,
    stages: Vec<(&'static str, Duration)>,
}

impl StageTimer {
    fn start() -> Self {
        StageTimer {
            last: Some(Instant::now()),
            stages: Vec::new(),
        }
    }

    fn lap(&mut self, stage: &'static str) {
        let now = Instant::now();
        if let Some(last) = self.last {
            self.stages.push((stage, now - last));
        }
        self.last = Some(now);
    }

    fn log(&self) {
        info!("Processing times:");
        for (stage, took) in &self.stages {
            info!("  {:>10.6}s - {}", took.as_secs_f64(), stage);
        }
    }
}

/// Run the full pipeline with UTC calendar buckets.
pub fn analyze(
    temperature: &Series,
    voltage: &Series,
    options: &AnalysisOptions,
) -> Result<StatsReport> {
    analyze_with(temperature, voltage, options, &UnixUtc)
}

/// Extract heater cycles from `temperature`, attach energies from
/// `voltage`, and aggregate them over the analysis window.
///
/// Fails fast on [`DataError::NoOffEvents`] and on missing voltage data.
/// Too few temperature samples or an empty final cycle set produce an empty
/// report carrying the condition in `notices`.
pub fn analyze_with<T: TimeSystem>(
    temperature: &Series,
    voltage: &Series,
    options: &AnalysisOptions,
    ts: &T,
) -> Result<StatsReport> {
    options.validate()?;
    let window = options.analysis_window;
    calendar::check_window(window, ts)?;
    let mut notices = Vec::new();
    let mut timer = StageTimer::start();

    if temperature.len() < 3 {
        let notice = DataError::InsufficientSamples {
            series: temperature.id.clone(),
            len: temperature.len(),
        };
        warn!("{}", notice);
        notices.push(notice);
        let calendar = calendar::aggregate(&[], window, options.empty_day_policy, ts);
        return Ok(StatsReport::new(
            temperature,
            voltage,
            options,
            Vec::new(),
            calendar,
            notices,
        ));
    }

    let ext = extrema::find_local_extrema(&temperature.values);
    let events =
        classify::classify_events(temperature, &ext, options.on_range, options.off_range)?;
    timer.lap("find heater on and off times");

    let matched = cycles::match_cycles(&events.on_times(), &events.off_times())?;
    timer.lap("find matching cycles");

    let filtered = matched.filter_by_duration(options.duration_limit);
    if matched.is_empty() {
        warn!("No ON event precedes an OFF event, no heater cycles matched");
    } else if filtered.is_empty() {
        warn!(
            "No complete heater cycles left ({} matched before duration filtering)",
            matched.len()
        );
        notices.push(DataError::EmptyCycleSet);
    }
    let cycles = power::estimate_energy(&filtered, voltage, options.load_resistance)?;
    timer.lap("compute durations and energy");

    let calendar = calendar::aggregate(&cycles, window, options.empty_day_policy, ts);
    timer.lap("calendar statistics");

    let report = StatsReport::new(temperature, voltage, options, cycles, calendar, notices);
    timer.lap("assemble report");
    timer.log();

    debug!(
        "Report: {} cycles, {} days, {} months",
        report.cycles.len(),
        report.days.len(),
        report.months.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdRange;

    fn example_temperature() -> Series {
        Series::new(
            "TEMP",
            vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0],
            vec![50.0, 40.0, 30.0, 95.0, 90.0, 80.0, 70.0, 35.0],
        )
        .unwrap()
    }

    fn flat_voltage(v: f64) -> Series {
        Series::new("ELBV", vec![0.0], vec![v]).unwrap()
    }

    fn options() -> AnalysisOptions {
        let mut options = AnalysisOptions::new(0.0, 86_400.0);
        options.on_range = Some(ThresholdRange::Single(35.0));
        options.off_range = Some(ThresholdRange::Single(85.0));
        options
    }

    #[test]
    fn test_single_cycle_report() {
        let report = analyze(&example_temperature(), &flat_voltage(20.0), &options()).unwrap();

        assert_eq!(report.on_times(), vec![20.0]);
        assert_eq!(report.off_times(), vec![30.0]);
        assert_eq!(report.durations(), vec![10.0]);
        // 20² / 40 = 10 W for 10 s
        assert!((report.energies()[0] - 100.0 / 3600.0).abs() < 1e-12);
        assert!(report.periods.period.is_empty());
        assert_eq!(report.days.len(), 1);
        assert_eq!(report.days[0].cycle_count, 1);
        assert_eq!(report.incomplete_month.as_deref(), Some("1970-01"));
        assert!(report.notices.is_empty());
    }

    #[test]
    fn test_short_series_gives_empty_report() {
        let temp = Series::new("TEMP", vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        let report = analyze(&temp, &flat_voltage(28.0), &options()).unwrap();
        assert!(report.cycles.is_empty());
        assert_eq!(report.days.len(), 1);
        assert!(report.days[0].mean_duration.is_nan());
        assert!(matches!(
            report.notices.as_slice(),
            [DataError::InsufficientSamples { len: 2, .. }]
        ));
    }

    #[test]
    fn test_duration_limit_empties_report() {
        let mut options = options();
        options.duration_limit = Some(5.0);
        let report = analyze(&example_temperature(), &Series::default(), &options).unwrap();
        assert!(report.cycles.is_empty());
        assert_eq!(report.notices, vec![DataError::EmptyCycleSet]);
        assert_eq!(report.days[0].on_time, 0.0);
    }

    #[test]
    fn test_unmatched_events_are_not_reported_as_filtered() {
        // the only ON comes after the last OFF
        let temp = Series::new(
            "TEMP",
            vec![0.0, 10.0, 20.0, 30.0, 40.0],
            vec![10.0, 90.0, 10.0, 20.0, 20.0],
        )
        .unwrap();
        let report = analyze(&temp, &flat_voltage(28.0), &options()).unwrap();
        assert!(report.cycles.is_empty());
        assert!(report.notices.is_empty());
        assert_eq!(report.days.len(), 1);
        assert_eq!(report.days[0].cycle_count, 0);
    }

    #[test]
    fn test_window_outside_calendar_is_rejected() {
        let mut open_ended = options();
        open_ended.analysis_window.stop = f64::INFINITY;
        assert!(matches!(
            analyze(&example_temperature(), &flat_voltage(28.0), &open_ended),
            Err(DataError::InvalidOptions(_))
        ));

        let mut far_future = options();
        far_future.analysis_window.stop = 8e12;
        assert!(matches!(
            analyze(&example_temperature(), &flat_voltage(28.0), &far_future),
            Err(DataError::InvalidOptions(_))
        ));
    }

    #[test]
    fn test_no_off_events_is_fatal() {
        let mut options = options();
        options.off_range = Some(ThresholdRange::Single(99.0));
        let err = analyze(&example_temperature(), &flat_voltage(28.0), &options);
        assert_eq!(err, Err(DataError::NoOffEvents));
    }

    #[test]
    fn test_missing_voltage_is_fatal_with_cycles() {
        let err = analyze(&example_temperature(), &Series::default(), &options());
        assert_eq!(err, Err(DataError::NoVoltageSamples));
    }

    #[test]
    fn test_period_series_and_histogram() {
        let cycles: Vec<Cycle> = [(0.0, 10.0), (100.0, 30.0), (200.0, 20.0)]
            .iter()
            .map(|&(on_time, duration)| Cycle {
                on_time,
                off_time: on_time + duration,
                duration,
                voltage: 28.0,
                energy: 0.0,
            })
            .collect();
        let periods = PeriodSeries::from_cycles(&cycles);
        assert_eq!(periods.time, vec![0.0, 100.0]);
        assert_eq!(periods.period, vec![100.0, 100.0]);
        assert_eq!(periods.duty_cycle, vec![10.0, 30.0]);

        let report = StatsReport::new(
            &example_temperature(),
            &flat_voltage(28.0),
            &options(),
            cycles,
            CalendarAggregates::default(),
            Vec::new(),
        );
        let hist = report.duration_histogram(2);
        assert_eq!(hist.len(), 2);
        assert_eq!(hist[0].count, 1);
        assert_eq!(hist[1].count, 2);
        assert_eq!(hist[1].high, 30.0);
        assert!(report.duration_histogram(0).is_empty());
    }

    #[test]
    fn test_markers_snap_to_nearest_samples() {
        let temp = example_temperature();
        let cycles = [Cycle {
            on_time: 21.0,
            off_time: 29.0,
            duration: 8.0,
            voltage: 28.0,
            energy: 0.0,
        }];
        let markers = cycle_markers(&temp, &cycles);
        assert_eq!(markers.len(), 2);
        assert_eq!((markers[0].index, markers[0].value), (2, 30.0));
        assert_eq!((markers[1].index, markers[1].kind), (3, EventKind::Off));
    }
}
