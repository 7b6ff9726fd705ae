use crate::cycles::MatchedCycles;
use crate::error::{DataError, Result};
use crate::search;
use crate::{Cycle, Series};
use log::{debug, trace};

const SECS_PER_HOUR: f64 = 3600.0;

/// Index of the voltage sample used for a cycle starting at `on_time`: the
/// first sample at or after it, or the last sample if the series ends first.
pub fn voltage_index(voltage: &Series, on_time: f64) -> Option<usize> {
    if voltage.is_empty() {
        return None;
    }
    Some(search::first_at_or_after(&voltage.times, on_time).unwrap_or(voltage.len() - 1))
}

/// Energy dissipated in a resistive load, W-hrs.
pub fn resistive_energy(volts: f64, resistance: f64, duration_secs: f64) -> f64 {
    volts * volts / resistance * duration_secs / SECS_PER_HOUR
}

/// Attach the bus voltage at cycle start and the resulting energy
/// (`V²/R × hours`) to every cycle.
pub fn estimate_energy(
    cycles: &MatchedCycles,
    voltage: &Series,
    resistance: f64,
) -> Result<Vec<Cycle>> {
    if cycles.is_empty() {
        return Ok(Vec::new());
    }
    if voltage.is_empty() {
        return Err(DataError::NoVoltageSamples);
    }

    let last_sample = voltage.times[voltage.len() - 1];
    let clamped = cycles.on.iter().filter(|&&t| t > last_sample).count();

    let result: Vec<Cycle> = cycles
        .on
        .iter()
        .zip(cycles.off.iter())
        .map(|(&on_time, &off_time)| {
            let idx = voltage_index(voltage, on_time).unwrap_or(voltage.len() - 1);
            let volts = voltage.values[idx];
            let duration = off_time - on_time;
            let energy = resistive_energy(volts, resistance, duration);
            trace!("Cycle at {}: {:.2} V, {:.4} W-hrs", on_time, volts, energy);
            Cycle {
                on_time,
                off_time,
                duration,
                voltage: volts,
                energy,
            }
        })
        .collect();

    if clamped > 0 {
        debug!(
            "{} cycles start after the last voltage sample, using its value",
            clamped
        );
    }
    Ok(result)
}
