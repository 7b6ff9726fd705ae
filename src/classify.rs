use crate::config::ThresholdRange;
use crate::error::{DataError, Result};
use crate::extrema::Extrema;
use crate::Series;
use log::debug;
use serde::Serialize;

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize)]
pub enum EventKind {
    On,
    Off,
}

impl ThresholdRange {
    /// Whether `value` qualifies for an event of `kind`.
    pub fn admits(&self, kind: EventKind, value: f64) -> bool {
        match (*self, kind) {
            (ThresholdRange::Single(bound), EventKind::On) => value < bound,
            (ThresholdRange::Single(bound), EventKind::Off) => value > bound,
            (ThresholdRange::Interval { low, high }, _) => low <= value && value < high,
        }
    }
}

/// A classified extremum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Event {
    pub index: usize,
    pub time: f64,
    pub value: f64,
    pub kind: EventKind,
}

/// Per-sample ON/OFF masks plus the events they select, in time order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Events {
    pub is_on: Vec<bool>,
    pub is_off: Vec<bool>,
    pub on: Vec<Event>,
    pub off: Vec<Event>,
}

impl Events {
    pub fn on_times(&self) -> Vec<f64> {
        self.on.iter().map(|e| e.time).collect()
    }

    pub fn off_times(&self) -> Vec<f64> {
        self.off.iter().map(|e| e.time).collect()
    }
}

/// Local minima become ON candidates, local maxima OFF candidates, each kept
/// only if its value passes the matching range (or unconditionally when no
/// range is given). Fails with [`DataError::NoOffEvents`] if no OFF survives.
pub fn classify_events(
    series: &Series,
    extrema: &Extrema,
    on_range: Option<ThresholdRange>,
    off_range: Option<ThresholdRange>,
) -> Result<Events> {
    let admits = |range: Option<ThresholdRange>, kind: EventKind, value: f64| {
        range.map_or(true, |r| r.admits(kind, value))
    };

    let mut events = Events {
        is_on: vec![false; extrema.is_min.len()],
        is_off: vec![false; extrema.is_max.len()],
        ..Default::default()
    };

    for index in extrema.min_indices() {
        let value = series.values[index];
        if admits(on_range, EventKind::On, value) {
            events.is_on[index] = true;
            events.on.push(Event {
                index,
                time: series.times[index],
                value,
                kind: EventKind::On,
            });
        }
    }

    for index in extrema.max_indices() {
        let value = series.values[index];
        if admits(off_range, EventKind::Off, value) {
            events.is_off[index] = true;
            events.off.push(Event {
                index,
                time: series.times[index],
                value,
                kind: EventKind::Off,
            });
        }
    }

    debug!(
        "Classified {} ON and {} OFF events from {} minima / {} maxima",
        events.on.len(),
        events.off.len(),
        extrema.min_indices().count(),
        extrema.max_indices().count()
    );

    if events.off.is_empty() {
        return Err(DataError::NoOffEvents);
    }
    Ok(events)
}
