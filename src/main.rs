use anyhow::Context;
use clap::Parser;
use heater_duty::config::{AnalysisOptions, Args};
use heater_duty::data_loading::{CsvArchive, FeatherArchive, TelemetrySource};
use heater_duty::{analyze, output, report, timesys};
use log::{debug, info, warn};

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init();

    let args = Args::parse();

    let file_options = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            Some(AnalysisOptions::from_json(&text)?)
        }
        None => None,
    };
    let options = args.apply_to(file_options)?;
    debug!("Analysis options: {:?}", options);

    let source: Box<dyn TelemetrySource> = if args.feather_input {
        Box::new(FeatherArchive::new(&args.archive))
    } else {
        Box::new(CsvArchive::new(&args.archive))
    };

    let window = options.analysis_window;
    info!(
        "Fetching {} and {} from {} to {}",
        args.temperature,
        args.voltage,
        timesys::format_time(window.start),
        timesys::format_time(window.stop)
    );
    let temperature = source.fetch(&args.temperature, window.start, window.stop, None)?;
    let voltage = source.fetch(
        &args.voltage,
        window.start,
        window.stop,
        args.voltage_cadence_suffix(),
    )?;
    println!(
        "Loaded {} temperature and {} voltage samples",
        temperature.len(),
        voltage.len()
    );

    let stats = analyze(&temperature, &voltage, &options)
        .with_context(|| format!("Heater analysis of {} failed", args.temperature))?;

    output::print_summary(&stats);

    if let Some(base_path) = &args.csv_output {
        output::write_report_csv(base_path, &stats, args.histogram_bins)?;
        if args.mark_cycles {
            let markers = report::cycle_markers(&temperature, &stats.cycles);
            output::write_markers_csv(base_path, &args.temperature, &markers)?;
        }
    } else if args.mark_cycles {
        warn!("--mark-cycles has no effect without --csv-output");
    }

    if let Some(path) = &args.json_output {
        output::write_report_json(path, &stats)?;
    }

    Ok(())
}
