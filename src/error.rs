use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataError>;

/// Failures and degraded conditions raised while turning raw telemetry into
/// heater cycles.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    /// No OFF-classified extremum survived classification or trailing-cycle
    /// truncation, so there is nothing to anchor cycle matching on.
    #[error("no heater OFF events found in temperature data")]
    NoOffEvents,

    /// A series was too short to contain an interior extremum.
    #[error("series '{series}' has {len} samples, at least 3 are needed")]
    InsufficientSamples { series: String, len: usize },

    /// Duration filtering removed every matched cycle.
    #[error("no heater cycles left after duration filtering")]
    EmptyCycleSet,

    #[error("series '{series}' is not sorted by time at sample {index}")]
    UnsortedSeries { series: String, index: usize },

    #[error("series '{series}' has {times} timestamps but {values} values")]
    LengthMismatch {
        series: String,
        times: usize,
        values: usize,
    },

    /// Cycles need a voltage sample but the voltage series is empty.
    #[error("voltage series is empty, cannot estimate energy")]
    NoVoltageSamples,

    #[error("invalid analysis options: {0}")]
    InvalidOptions(String),
}
