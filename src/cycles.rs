use crate::error::{DataError, Result};
use crate::search;
use log::{debug, trace};

/// Paired ON/OFF times, one entry per complete heater cycle.
///
/// `on[i] < off[i]` for every `i`, and both sequences are strictly
/// increasing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedCycles {
    pub on: Vec<f64>,
    pub off: Vec<f64>,
}

impl MatchedCycles {
    pub fn len(&self) -> usize {
        self.on.len()
    }

    pub fn is_empty(&self) -> bool {
        self.on.is_empty()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.on
            .iter()
            .zip(self.off.iter())
            .map(|(on, off)| off - on)
            .collect()
    }

    /// Drop every cycle lasting longer than `limit` seconds. `None` keeps
    /// everything.
    pub fn filter_by_duration(&self, limit: Option<f64>) -> MatchedCycles {
        let Some(limit) = limit else {
            return self.clone();
        };

        let (on, off): (Vec<f64>, Vec<f64>) = self
            .on
            .iter()
            .zip(self.off.iter())
            .filter(|(on, off)| *off - *on <= limit)
            .map(|(&on, &off)| (on, off))
            .unzip();

        debug!(
            "Duration limit {}s removed {} of {} cycles",
            limit,
            self.len() - on.len(),
            self.len()
        );
        MatchedCycles { on, off }
    }
}

/// Pair ON events with OFF events.
///
/// 1. ON events at or after the last OFF belong to an unfinished cycle and
///    are dropped.
/// 2. Every ON picks the first OFF strictly after it; the picked OFFs are
///    collapsed to distinct values, so spurious intermediate minima cannot
///    produce duplicate cycles.
/// 3. Every surviving OFF picks the last ON at or before it.
///
/// Both inputs must be sorted ascending.
pub fn match_cycles(on_times: &[f64], off_times: &[f64]) -> Result<MatchedCycles> {
    let Some(&last_off) = off_times.last() else {
        return Err(DataError::NoOffEvents);
    };

    let on_times: Vec<f64> = on_times.iter().copied().filter(|&t| t < last_off).collect();
    if on_times.is_empty() {
        debug!("No ON events before the last OFF at {}", last_off);
        return Ok(MatchedCycles::default());
    }

    let mut off: Vec<f64> = on_times
        .iter()
        .filter_map(|&t| search::first_after(off_times, t))
        .map(|i| off_times[i])
        .collect();
    off.dedup();

    let on: Vec<f64> = off
        .iter()
        .map(|&t| {
            // every kept OFF follows some ON, so the fallback is never taken
            // for sorted input
            let i = search::last_at_or_before(&on_times, t).unwrap_or(0);
            on_times[i]
        })
        .collect();

    // Repeated timestamps can still yield zero-length or repeated pairs.
    let mut matched = MatchedCycles::default();
    for (on, off) in on.into_iter().zip(off) {
        let after_prev = matched.on.last().map_or(true, |&prev| on > prev);
        if on < off && after_prev {
            trace!("Cycle {} -> {} ({}s)", on, off, off - on);
            matched.on.push(on);
            matched.off.push(off);
        } else {
            debug!("Dropping degenerate cycle {} -> {}", on, off);
        }
    }

    debug!(
        "Matched {} cycles from {} ON / {} OFF events",
        matched.len(),
        on_times.len(),
        off_times.len()
    );
    Ok(matched)
}
