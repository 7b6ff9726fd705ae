use crate::classify::{Event, EventKind};
use crate::report::StatsReport;
use crate::timesys::format_time;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// `<dir>/<stem>_<series>_<table>.<ext>` from a prefix like `/out/heater.csv`.
fn table_path(base_path: &str, series_id: &str, table: &str) -> Result<PathBuf> {
    let path = Path::new(base_path);
    let dir = path.parent().unwrap_or(Path::new("."));

    // Create directory if it doesn't exist
    if !dir.as_os_str().is_empty() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("csv");

    let filename = format!("{}_{}_{}.{}", stem, series_id, table, ext);
    Ok(dir.join(filename))
}

/// Missing means (NaN) are written as empty cells.
fn cell(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

fn write_table(path: &Path, header: &[&str], rows: Vec<Vec<String>>) -> Result<()> {
    println!("Writing results to {}", path.display());
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the per-cycle, per-period, per-day and per-month tables plus the
/// duration histogram. Returns the files written.
pub fn write_report_csv(
    base_path: &str,
    report: &StatsReport,
    histogram_bins: usize,
) -> Result<Vec<PathBuf>> {
    let id = report.temperature_id.as_str();
    let mut written = Vec::new();

    let path = table_path(base_path, id, "cycles")?;
    write_table(
        &path,
        &["on_time", "off_time", "duration_s", "voltage_v", "energy_whr"],
        report
            .cycles
            .iter()
            .map(|c| {
                vec![
                    format_time(c.on_time),
                    format_time(c.off_time),
                    cell(c.duration),
                    cell(c.voltage),
                    cell(c.energy),
                ]
            })
            .collect(),
    )?;
    written.push(path);

    let path = table_path(base_path, id, "periods")?;
    let p = &report.periods;
    write_table(
        &path,
        &["on_time", "period_s", "duty_cycle_pct"],
        p.time
            .iter()
            .zip(p.period.iter())
            .zip(p.duty_cycle.iter())
            .map(|((&t, &period), &dc)| vec![format_time(t), cell(period), cell(dc)])
            .collect(),
    )?;
    written.push(path);

    let path = table_path(base_path, id, "days")?;
    write_table(
        &path,
        &[
            "date",
            "cycles",
            "on_time_s",
            "mean_duration_s",
            "energy_whr",
            "mean_period_s",
            "duty_cycle_pct",
        ],
        report
            .days
            .iter()
            .map(|d| {
                vec![
                    d.date.format("%Y-%m-%d").to_string(),
                    d.cycle_count.to_string(),
                    cell(d.on_time),
                    cell(d.mean_duration),
                    cell(d.energy),
                    cell(d.mean_period),
                    cell(d.duty_cycle),
                ]
            })
            .collect(),
    )?;
    written.push(path);

    let path = table_path(base_path, id, "months")?;
    write_table(
        &path,
        &[
            "month",
            "days",
            "cycles",
            "on_time_s",
            "mean_duration_s",
            "energy_whr",
            "mean_period_s",
            "duty_cycle_pct",
            "cycles_per_day",
            "on_time_per_day_s",
            "energy_per_day_whr",
            "incomplete",
        ],
        report
            .months
            .iter()
            .map(|m| {
                vec![
                    m.label.clone(),
                    m.day_count.to_string(),
                    m.cycle_count.to_string(),
                    cell(m.on_time),
                    cell(m.mean_duration),
                    cell(m.energy),
                    cell(m.mean_period),
                    cell(m.duty_cycle),
                    cell(m.daily_means.cycles),
                    cell(m.daily_means.on_time),
                    cell(m.daily_means.energy),
                    m.incomplete.to_string(),
                ]
            })
            .collect(),
    )?;
    written.push(path);

    let path = table_path(base_path, id, "duration_hist")?;
    write_table(
        &path,
        &["low_s", "high_s", "count"],
        report
            .duration_histogram(histogram_bins)
            .iter()
            .map(|b| vec![cell(b.low), cell(b.high), b.count.to_string()])
            .collect(),
    )?;
    written.push(path);

    Ok(written)
}

pub fn write_markers_csv(base_path: &str, series_id: &str, markers: &[Event]) -> Result<PathBuf> {
    let path = table_path(base_path, series_id, "markers")?;
    write_table(
        &path,
        &["time", "index", "value", "kind"],
        markers
            .iter()
            .map(|m| {
                vec![
                    format_time(m.time),
                    m.index.to_string(),
                    cell(m.value),
                    match m.kind {
                        EventKind::On => "on".to_string(),
                        EventKind::Off => "off".to_string(),
                    },
                ]
            })
            .collect(),
    )?;
    Ok(path)
}

pub fn write_report_json(path: &Path, report: &StatsReport) -> Result<()> {
    println!("Writing report to {}", path.display());
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(std::io::BufWriter::new(file), report)?;
    Ok(())
}

fn show(v: f64, scale: f64) -> String {
    if v.is_nan() {
        "   --".to_string()
    } else {
        format!("{:8.1}", v / scale)
    }
}

pub fn print_summary(report: &StatsReport) {
    let name = report.label.as_deref().unwrap_or(&report.temperature_id);
    println!("\n{} heater cycling per {}", name, report.temperature_id);
    println!(
        "  {} to {}",
        format_time(report.window.start),
        format_time(report.window.stop)
    );
    println!("  Cycles: {}", report.cycles.len());
    println!(
        "  Total on-time: {:.1} hrs, energy: {:.1} W-hrs",
        report.total_on_time() / 3600.0,
        report.total_energy()
    );
    for notice in &report.notices {
        println!("  Note: {}", notice);
    }

    println!("\nMonth      Cycles/day  On-time/day(h)  Duration(min)  Period(min)  Duty(%)");
    println!("-----------------------------------------------------------------------------");
    for m in &report.months {
        println!(
            "{}{}  {}        {}       {}     {}  {}",
            m.label,
            if m.incomplete { "*" } else { " " },
            show(m.daily_means.cycles, 1.0),
            show(m.daily_means.on_time, 3600.0),
            show(m.mean_duration, 60.0),
            show(m.mean_period, 60.0),
            show(m.duty_cycle, 1.0),
        );
    }
    if let Some(label) = &report.incomplete_month {
        println!("* {} is incomplete", label);
    }
}
