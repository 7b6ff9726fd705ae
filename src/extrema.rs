use log::{debug, warn};

/// Local extremum flags, one entry per sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extrema {
    pub is_min: Vec<bool>,
    pub is_max: Vec<bool>,
}

impl Extrema {
    pub fn min_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.is_min.iter().enumerate().filter(|(_, m)| **m).map(|(i, _)| i)
    }

    pub fn max_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.is_max.iter().enumerate().filter(|(_, m)| **m).map(|(i, _)| i)
    }

    pub fn is_empty(&self) -> bool {
        self.is_min.is_empty()
    }
}

/// Find local minima and maxima from the sign pattern of successive non-zero
/// first differences.
///
/// Flat runs are collapsed: a minimum lands on the last sample of a flat
/// bottom (where the rise starts), a maximum on the first sample of a flat
/// top (where the rise ends). The first and last samples are never flagged.
/// Fewer than 3 samples yields empty masks.
pub fn find_local_extrema(values: &[f64]) -> Extrema {
    if values.len() < 3 {
        warn!("Only {} samples, skipping extremum detection", values.len());
        return Extrema::default();
    }

    // (index of the difference, difference) for every non-flat step
    let steps: Vec<(usize, f64)> = values
        .windows(2)
        .enumerate()
        .map(|(i, w)| (i, w[1] - w[0]))
        .filter(|&(_, d)| d != 0.0)
        .collect();

    let mut is_min = vec![false; values.len()];
    let mut is_max = vec![false; values.len()];

    for pair in steps.windows(2) {
        let (i_prev, d_prev) = pair[0];
        let (i_next, d_next) = pair[1];
        if d_prev < 0.0 && d_next > 0.0 {
            is_min[i_next] = true;
        } else if d_prev > 0.0 && d_next < 0.0 {
            is_max[i_prev + 1] = true;
        }
    }

    debug!(
        "Found {} local minima and {} local maxima in {} samples",
        is_min.iter().filter(|&&m| m).count(),
        is_max.iter().filter(|&&m| m).count(),
        values.len()
    );

    Extrema { is_min, is_max }
}
