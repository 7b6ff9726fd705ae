use heater_duty::timesys::{parse_time, SECS_PER_DAY};
use heater_duty::{analyze, AnalysisOptions, DataError, Series, ThresholdRange};

const PERIOD: f64 = 3600.0;
const HEAT: f64 = 600.0;
const STEP: f64 = 60.0;

/// Heater trace: 10 minutes heating from 40 to 90, 50 minutes cooling back,
/// sampled every minute for three days from 2013-01-31.
fn synthetic_trace() -> (Series, Series, AnalysisOptions) {
    let start = parse_time("2013-01-31 00:00").unwrap();
    let stop = start + 3.0 * SECS_PER_DAY;
    let n = ((stop - start) / STEP) as usize;

    let times: Vec<f64> = (0..n).map(|i| start + i as f64 * STEP).collect();
    let mut values: Vec<f64> = (0..n)
        .map(|i| {
            let phase = (i as f64 * STEP) % PERIOD;
            if phase <= HEAT {
                40.0 + 50.0 * phase / HEAT
            } else {
                90.0 - 50.0 * (phase - HEAT) / (PERIOD - HEAT)
            }
        })
        .collect();
    // sensor noise late in the 10th cycle: a spurious dip at 43 then a bump
    values[(10.0 * PERIOD / STEP) as usize + 58] += 3.0;

    let temperature = Series::new("PR3TV01T", times, values).unwrap();

    let volt_times: Vec<f64> = (0..(n / 5)).map(|i| start + i as f64 * 300.0).collect();
    let volt_values = vec![28.0; volt_times.len()];
    let voltage = Series::new("ELBV", volt_times, volt_values).unwrap();

    let mut options = AnalysisOptions::new(start, stop);
    options.on_range = Some(ThresholdRange::Interval { low: 35.0, high: 45.0 });
    options.off_range = Some(ThresholdRange::Single(85.0));
    options.duration_limit = Some(3600.0);
    options.label = Some("RCS-3 Valve".to_string());

    (temperature, voltage, options)
}

#[test]
fn test_documented_single_cycle() {
    let temperature = Series::new(
        "TEMP",
        vec![0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0],
        vec![50.0, 40.0, 30.0, 95.0, 90.0, 80.0, 70.0, 35.0],
    )
    .unwrap();
    let voltage = Series::new("ELBV", vec![0.0, 5.0], vec![28.0, 28.0]).unwrap();
    let mut options = AnalysisOptions::new(0.0, 100.0);
    options.on_range = Some(ThresholdRange::Single(35.0));
    options.off_range = Some(ThresholdRange::Single(85.0));

    let report = analyze(&temperature, &voltage, &options).unwrap();
    assert_eq!(report.cycles.len(), 1);
    let cycle = report.cycles[0];
    assert_eq!((cycle.on_time, cycle.off_time, cycle.duration), (20.0, 30.0, 10.0));
    // on_time is past every voltage sample: last sample is used
    assert_eq!(cycle.voltage, 28.0);
}

#[test]
fn test_synthetic_trace_cycles() {
    let (temperature, voltage, options) = synthetic_trace();
    let report = analyze(&temperature, &voltage, &options).unwrap();

    // the first ON sits on the first sample and cannot be detected
    assert_eq!(report.cycles.len(), 71);
    for (k, cycle) in report.cycles.iter().enumerate() {
        let expected_on = options.analysis_window.start + (k + 1) as f64 * PERIOD;
        assert_eq!(cycle.on_time, expected_on);
        assert!((cycle.duration - HEAT).abs() < 1e-9);
        assert!((cycle.energy - 28.0 * 28.0 / 40.0 * HEAT / 3600.0).abs() < 1e-9);
    }
    assert_eq!(report.periods.period.len(), 70);
    assert!(report.periods.period.iter().all(|&p| (p - PERIOD).abs() < 1e-9));
    assert!(report
        .periods
        .duty_cycle
        .iter()
        .all(|&dc| (dc - HEAT / PERIOD * 100.0).abs() < 1e-9));
    assert!(report.notices.is_empty());
}

#[test]
fn test_synthetic_trace_calendar() {
    let (temperature, voltage, options) = synthetic_trace();
    let report = analyze(&temperature, &voltage, &options).unwrap();

    let counts: Vec<usize> = report.days.iter().map(|d| d.cycle_count).collect();
    assert_eq!(counts, vec![23, 24, 24]);
    assert!((report.days[1].on_time - 24.0 * HEAT).abs() < 1e-6);
    assert!((report.days[1].duty_cycle - 24.0 * HEAT / SECS_PER_DAY * 100.0).abs() < 1e-9);
    assert!((report.days[2].mean_period - PERIOD).abs() < 1e-9);

    assert_eq!(report.months.len(), 2);
    assert_eq!(report.months[0].label, "2013-01");
    assert_eq!(report.months[0].cycle_count, 23);
    assert!(!report.months[0].incomplete);
    assert_eq!(report.months[1].cycle_count, 48);
    assert_eq!(report.months[1].daily_means.cycles, 24.0);
    assert!(report.months[1].incomplete);
    assert_eq!(report.incomplete_month.as_deref(), Some("2013-02"));
    assert_eq!(report.complete_months().count(), 1);

    for month in &report.months {
        let day_sum: f64 = report
            .days
            .iter()
            .filter(|d| d.date.format("%Y-%m").to_string() == month.label)
            .map(|d| d.on_time)
            .sum();
        assert!((day_sum - month.on_time).abs() < 1e-6);
    }
}

#[test]
fn test_duration_limit_removing_everything_is_not_an_error() {
    let (temperature, voltage, mut options) = synthetic_trace();
    options.duration_limit = Some(HEAT / 2.0);
    let report = analyze(&temperature, &voltage, &options).unwrap();

    assert!(report.cycles.is_empty());
    assert!(report.periods.period.is_empty());
    assert_eq!(report.notices, vec![DataError::EmptyCycleSet]);
    assert_eq!(report.days.len(), 3);
    assert!(report.days.iter().all(|d| d.cycle_count == 0 && d.mean_duration.is_nan()));
}

#[test]
fn test_off_range_above_trace_is_fatal() {
    let (temperature, voltage, mut options) = synthetic_trace();
    options.off_range = Some(ThresholdRange::Single(95.0));
    assert_eq!(
        analyze(&temperature, &voltage, &options),
        Err(DataError::NoOffEvents)
    );
}
