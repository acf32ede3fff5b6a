//! Input time series for one flight parameter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SegmentBoundary;

/// Structural problems with a caller-supplied series.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("Length mismatch: {time} time samples vs {value} values")]
    LengthMismatch { time: usize, value: usize },

    #[error("Time goes backwards at index {index}: {previous} -> {current}")]
    NonMonotonicTime {
        index: usize,
        previous: f64,
        current: f64,
    },
}

/// Parallel `time` / `value` sequences of one channel.
///
/// Time is non-decreasing and both vectors always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    time: Vec<f64>,
    value: Vec<f64>,
}

impl TimeSeries {
    pub fn new(time: Vec<f64>, value: Vec<f64>) -> Result<Self, SeriesError> {
        if time.len() != value.len() {
            return Err(SeriesError::LengthMismatch {
                time: time.len(),
                value: value.len(),
            });
        }
        if let Some(index) = time.windows(2).position(|w| w[1] < w[0]) {
            return Err(SeriesError::NonMonotonicTime {
                index: index + 1,
                previous: time[index],
                current: time[index + 1],
            });
        }
        Ok(Self { time, value })
    }

    /// Build a series sampled at 1 Hz starting from t = 0.
    pub fn from_values(value: Vec<f64>) -> Self {
        let time = (0..value.len()).map(|i| i as f64).collect();
        Self { time, value }
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn values(&self) -> &[f64] {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Copy of the samples in `[start, end)`, clamped to the series length.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);
        Self {
            time: self.time[start..end].to_vec(),
            value: self.value[start..end].to_vec(),
        }
    }

    /// Time at the middle sample of a boundary, or the boundary midpoint
    /// index when the boundary falls outside the series.
    pub fn midpoint_time(&self, boundary: &SegmentBoundary) -> f64 {
        let start = boundary.start.min(self.len().saturating_sub(1));
        let last = (boundary.end.saturating_sub(1)).min(self.len().saturating_sub(1));
        match (self.time.get(start), self.time.get(last)) {
            (Some(a), Some(b)) => 0.5 * (a + b),
            _ => boundary.midpoint(),
        }
    }
}
