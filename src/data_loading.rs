use crate::timesys;
use crate::{Sample, Series};
use anyhow::{anyhow, Context, Result};
use arrow::array::{Array, Float64Array, StringArray};
use arrow::datatypes::DataType;
use arrow::ipc::reader::FileReaderBuilder;
use log::{debug, info};
use std::fs::File;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where telemetry series come from.
pub trait TelemetrySource {
    /// Samples of `id` inside `[start, stop)`, sorted by time. `cadence`
    /// selects a pre-averaged product (e.g. `5min`) where one exists.
    fn fetch(&self, id: &str, start: f64, stop: f64, cadence: Option<&str>) -> Result<Series>;
}

fn file_stem_for(id: &str, cadence: Option<&str>) -> String {
    match cadence {
        Some(c) => format!("{}_{}", id, c),
        None => id.to_string(),
    }
}

/// Find `<stem>.<ext>` anywhere below `root`, case-insensitively.
fn locate(root: &Path, stem: &str, ext: &str) -> Result<PathBuf> {
    let wanted = format!("{}.{}", stem, ext).to_lowercase();
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
        .map(|entry| entry.into_path())
        .ok_or_else(|| anyhow!("No {} file for '{}' under {}", ext, stem, root.display()))
}

fn finish_series(id: &str, mut samples: Vec<Sample>, start: f64, stop: f64) -> Result<Series> {
    let total = samples.len();
    samples.retain(|s| s.time >= start && s.time < stop);
    samples.sort_by(|a, b| a.time.total_cmp(&b.time));
    debug!(
        "Kept {} of {} samples of {} inside the window",
        samples.len(),
        total,
        id
    );
    Ok(Series::from_samples(id, samples)?)
}

fn parse_time_field(s: &str) -> Result<f64> {
    timesys::parse_time(s).map_err(|e| anyhow!(e))
}

/// Archive of `time,value` CSV files, one per series (`<id>.csv`, or
/// `<id>_<cadence>.csv` for averaged products).
#[derive(Debug, Clone)]
pub struct CsvArchive {
    pub root: PathBuf,
}

impl CsvArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        CsvArchive { root: root.into() }
    }
}

pub fn read_csv_file(path: &Path) -> Result<Vec<Sample>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true) // Handle variable number of fields
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut data = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let (Some(time), Some(value)) = (record.get(0), record.get(1)) else {
            return Err(anyhow!("{}: row {} has fewer than 2 fields", path.display(), line + 1));
        };
        if value.is_empty() {
            // dropouts are exported as empty cells
            continue;
        }
        let time = parse_time_field(time)
            .with_context(|| format!("{}: row {}", path.display(), line + 1))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("{}: row {} value '{}'", path.display(), line + 1, value))?;
        data.push(Sample { time, value });
    }

    Ok(data)
}

impl TelemetrySource for CsvArchive {
    fn fetch(&self, id: &str, start: f64, stop: f64, cadence: Option<&str>) -> Result<Series> {
        let path = locate(&self.root, &file_stem_for(id, cadence), "csv")?;
        info!("Loading file: {}", path.display());
        let samples = read_csv_file(&path)?;
        finish_series(id, samples, start, stop)
    }
}

/// Archive of Feather (Arrow IPC) files with a `time` column (Float64 epoch
/// seconds or Utf8 timestamps) and a Float64 `value` column.
#[derive(Debug, Clone)]
pub struct FeatherArchive {
    pub root: PathBuf,
}

impl FeatherArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FeatherArchive { root: root.into() }
    }
}

pub fn read_feather_file(path: &Path) -> Result<Vec<Sample>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = FileReaderBuilder::new().build(file)?;
    let mut data = Vec::new();

    for batch in reader {
        let batch = batch?;

        let time_col = batch
            .column_by_name("time")
            .ok_or_else(|| anyhow!("time column missing in {}", path.display()))?;
        let value_col = batch
            .column_by_name("value")
            .ok_or_else(|| anyhow!("value column missing in {}", path.display()))?
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| anyhow!("value column should be float64"))?;

        let times: Vec<Option<f64>> = match time_col.data_type() {
            DataType::Float64 => time_col
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(|| anyhow!("time column should be float64"))?
                .iter()
                .collect(),
            DataType::Utf8 => time_col
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| anyhow!("time column should be strings"))?
                .iter()
                .map(|s| s.map(parse_time_field).transpose())
                .collect::<Result<_>>()?,
            other => return Err(anyhow!("Unsupported time column type: {}", other)),
        };

        for (row, time) in times.into_iter().enumerate() {
            if let (Some(time), true) = (time, value_col.is_valid(row)) {
                data.push(Sample {
                    time,
                    value: value_col.value(row),
                });
            }
        }
    }

    Ok(data)
}

impl TelemetrySource for FeatherArchive {
    fn fetch(&self, id: &str, start: f64, stop: f64, cadence: Option<&str>) -> Result<Series> {
        let path = locate(&self.root, &file_stem_for(id, cadence), "feather")?;
        info!("Loading file: {}", path.display());
        let samples = read_feather_file(&path)?;
        finish_series(id, samples, start, stop)
    }
}
