//! Daily and monthly duty-cycle aggregation.
//!
//! Every calendar day touched by the analysis window gets a bucket, even
//! when no cycle starts in it. Sums over an empty bucket are 0 and means are
//! NaN, so "no cycles" stays distinguishable from "zero-length cycles".

use crate::config::{AnalysisWindow, EmptyDayPolicy};
use crate::error::{DataError, Result};
use crate::timesys::{self, TimeSystem, SECS_PER_DAY};
use crate::Cycle;
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    /// Start of the day, epoch seconds.
    pub start: f64,
    pub cycle_count: usize,
    /// Summed heater on-time, seconds.
    pub on_time: f64,
    pub mean_duration: f64,
    /// Summed energy, W-hrs.
    pub energy: f64,
    pub mean_period: f64,
    /// Percentage of the day the heater was on.
    pub duty_cycle: f64,
}

/// Month-level means of the daily values, the way trend plots consume them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyMeans {
    pub cycles: f64,
    pub on_time: f64,
    pub mean_duration: f64,
    pub energy: f64,
    pub mean_period: f64,
    pub duty_cycle: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthBucket {
    pub year: i32,
    pub month: u32,
    pub label: String,
    /// Start of the month, epoch seconds.
    pub start: f64,
    /// Day buckets of this month inside the analysis window.
    pub day_count: usize,
    pub cycle_count: usize,
    pub on_time: f64,
    pub mean_duration: f64,
    pub energy: f64,
    pub mean_period: f64,
    pub duty_cycle: f64,
    pub daily_means: DailyMeans,
    /// Set on the final month of the window, whose statistics rest on a
    /// partial sample.
    pub incomplete: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalendarAggregates {
    pub days: Vec<DayBucket>,
    pub months: Vec<MonthBucket>,
}

impl CalendarAggregates {
    pub fn incomplete_month(&self) -> Option<&MonthBucket> {
        self.months.iter().find(|m| m.incomplete)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    count: usize,
    on_time: f64,
    energy: f64,
    period_sum: f64,
    period_count: usize,
}

impl Tally {
    fn add_cycle(&mut self, cycle: &Cycle) {
        self.count += 1;
        self.on_time += cycle.duration;
        self.energy += cycle.energy;
    }

    fn add_period(&mut self, period: f64) {
        self.period_sum += period;
        self.period_count += 1;
    }

    fn mean_duration(&self) -> f64 {
        mean_or_nan(self.on_time, self.count)
    }

    fn mean_period(&self) -> f64 {
        mean_or_nan(self.period_sum, self.period_count)
    }
}

fn mean_or_nan(sum: f64, count: usize) -> f64 {
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Mean of `values` under `policy`; NaN when nothing is left to average.
pub fn policy_mean(values: impl Iterator<Item = f64>, policy: EmptyDayPolicy) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| match policy {
        EmptyDayPolicy::Skip if v.is_nan() => (sum, count),
        EmptyDayPolicy::Zero if v.is_nan() => (sum, count + 1),
        _ => (sum + v, count + 1),
    });
    mean_or_nan(sum, count)
}

/// Gap from each cycle's start to the next one's; one fewer than cycles.
pub fn cycle_periods(cycles: &[Cycle]) -> Vec<f64> {
    cycles
        .windows(2)
        .map(|w| w[1].on_time - w[0].on_time)
        .collect()
}

/// Years a window bound may fall in.
const CALENDAR_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// Reject window bounds the calendar cannot place on a day.
pub fn check_window<T: TimeSystem>(window: AnalysisWindow, ts: &T) -> Result<()> {
    for bound in [window.start, window.stop] {
        match ts.date_of(bound) {
            Some(date) if CALENDAR_YEARS.contains(&date.year()) => {}
            _ => {
                return Err(DataError::InvalidOptions(format!(
                    "analysis window bound {} is outside years {}..={}",
                    bound,
                    CALENDAR_YEARS.start(),
                    CALENDAR_YEARS.end()
                )))
            }
        }
    }
    Ok(())
}

/// Every calendar day overlapping `[start, stop)`.
fn days_in_window<T: TimeSystem>(window: AnalysisWindow, ts: &T) -> Vec<NaiveDate> {
    let (Some(first), Some(mut last)) = (ts.date_of(window.start), ts.date_of(window.stop)) else {
        return Vec::new();
    };
    // a window ending exactly at midnight does not touch the next day
    if ts.day_start(last) >= window.stop {
        match last.pred_opt() {
            Some(prev) => last = prev,
            None => return Vec::new(),
        }
    }
    first.iter_days().take_while(|d| *d <= last).collect()
}

/// Bucket `cycles` by the day and month of their ON time. Cycles starting
/// outside the window are not counted anywhere.
pub fn aggregate<T: TimeSystem>(
    cycles: &[Cycle],
    window: AnalysisWindow,
    policy: EmptyDayPolicy,
    ts: &T,
) -> CalendarAggregates {
    let dates = days_in_window(window, ts);
    let Some(&first_date) = dates.first() else {
        return CalendarAggregates::default();
    };

    // month of each day, as an index into `month_keys`
    let mut month_keys: Vec<(i32, u32)> = Vec::new();
    let day_month: Vec<usize> = dates
        .iter()
        .map(|&d| {
            let key = timesys::year_month(d);
            if month_keys.last() != Some(&key) {
                month_keys.push(key);
            }
            month_keys.len() - 1
        })
        .collect();

    let mut day_tally = vec![Tally::default(); dates.len()];
    let mut month_tally = vec![Tally::default(); month_keys.len()];

    let day_of = |t: f64| -> Option<usize> {
        if !(window.start <= t && t < window.stop) {
            return None;
        }
        let date = ts.date_of(t)?;
        usize::try_from((date - first_date).num_days())
            .ok()
            .filter(|&i| i < dates.len())
    };

    let periods = cycle_periods(cycles);
    let mut outside = 0;
    for (i, cycle) in cycles.iter().enumerate() {
        let Some(day) = day_of(cycle.on_time) else {
            outside += 1;
            continue;
        };
        let month = day_month[day];
        day_tally[day].add_cycle(cycle);
        month_tally[month].add_cycle(cycle);
        if let Some(&period) = periods.get(i) {
            day_tally[day].add_period(period);
            month_tally[month].add_period(period);
        }
    }
    if outside > 0 {
        debug!("{} cycles start outside the analysis window", outside);
    }

    let days: Vec<DayBucket> = dates
        .iter()
        .zip(day_tally.iter())
        .map(|(&date, tally)| DayBucket {
            date,
            start: ts.day_start(date),
            cycle_count: tally.count,
            on_time: tally.on_time,
            mean_duration: tally.mean_duration(),
            energy: tally.energy,
            mean_period: tally.mean_period(),
            duty_cycle: tally.on_time / SECS_PER_DAY * 100.0,
        })
        .collect();

    let mut month_days: Vec<Vec<&DayBucket>> = vec![Vec::new(); month_keys.len()];
    for (day, &m) in days.iter().zip(day_month.iter()) {
        month_days[m].push(day);
    }

    let last_month = month_keys.len() - 1;
    let months = month_keys
        .iter()
        .zip(month_tally.iter())
        .zip(month_days.iter())
        .enumerate()
        .map(|(m, ((&(year, month), tally), in_month))| {
            let day_count = in_month.len();
            let mean_of =
                |f: fn(&DayBucket) -> f64| policy_mean(in_month.iter().map(|d| f(d)), policy);

            MonthBucket {
                year,
                month,
                label: timesys::month_label(year, month),
                start: ts.month_start(year, month),
                day_count,
                cycle_count: tally.count,
                on_time: tally.on_time,
                mean_duration: tally.mean_duration(),
                energy: tally.energy,
                mean_period: tally.mean_period(),
                duty_cycle: tally.on_time / (day_count as f64 * SECS_PER_DAY) * 100.0,
                daily_means: DailyMeans {
                    cycles: mean_of(|d| d.cycle_count as f64),
                    on_time: mean_of(|d| d.on_time),
                    mean_duration: mean_of(|d| d.mean_duration),
                    energy: mean_of(|d| d.energy),
                    mean_period: mean_of(|d| d.mean_period),
                    duty_cycle: mean_of(|d| d.duty_cycle),
                },
                incomplete: m == last_month,
            }
        })
        .collect();

    debug!(
        "Aggregated {} cycles into {} days and {} months",
        cycles.len() - outside,
        dates.len(),
        month_keys.len()
    );

    CalendarAggregates { days, months }
}
