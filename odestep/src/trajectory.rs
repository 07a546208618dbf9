use itertools::izip;
use nalgebra::{DMatrix, DVector};

use crate::error::{configuration_error, IntegrationError};

/// Relative tolerance for treating the ratio of span and step size as an integer.
const STEP_COUNT_TOLERANCE: f64 = 1e-9;

/// Fixed-step time grid from an initial to a final time.
///
/// The grid has `ceil((final_time - initial_time) / step_size)` steps. If the span is not
/// a multiple of the step size, the last step is shortened so that the grid ends exactly
/// at `final_time`. Grid times are computed from the step index, not accumulated.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TimeGrid {
    initial_time: f64,
    final_time: f64,
    step_size: f64,
    num_steps: usize,
}

impl TimeGrid {
    pub fn new(initial_time: f64, final_time: f64, step_size: f64) -> Result<Self, IntegrationError> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(configuration_error(format!(
                "step size must be positive and finite, got {}",
                step_size
            )));
        }
        if !initial_time.is_finite() || !final_time.is_finite() {
            return Err(configuration_error("initial and final time must be finite"));
        }
        if final_time < initial_time {
            return Err(configuration_error(format!(
                "final time {} is smaller than initial time {}",
                final_time, initial_time
            )));
        }

        let ratio = (final_time - initial_time) / step_size;
        if !ratio.is_finite() || ratio >= usize::MAX as f64 {
            return Err(configuration_error("step size is too small for the time interval"));
        }
        let rounded = ratio.round();
        let num_steps = if (ratio - rounded).abs() <= STEP_COUNT_TOLERANCE * rounded.max(1.0) {
            rounded as usize
        } else {
            ratio.ceil() as usize
        };

        Ok(Self {
            initial_time,
            final_time,
            step_size,
            num_steps,
        })
    }

    pub fn initial_time(&self) -> f64 {
        self.initial_time
    }

    pub fn final_time(&self) -> f64 {
        self.final_time
    }

    /// The nominal step size.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    /// Time of the grid point with the given index. Index `num_steps()` is `final_time`.
    pub fn time(&self, index: usize) -> f64 {
        if index >= self.num_steps {
            self.final_time
        } else {
            self.initial_time + index as f64 * self.step_size
        }
    }

    /// Length of the step from grid point `index` to `index + 1`.
    pub fn step_length(&self, index: usize) -> f64 {
        self.time(index + 1) - self.time(index)
    }

    /// Whether the step starting at grid point `index` is shorter than the nominal step size.
    pub fn is_step_truncated(&self, index: usize) -> bool {
        index < self.num_steps && self.step_size - self.step_length(index) > STEP_COUNT_TOLERANCE * self.step_size
    }

    /// Whether the final step is shortened to land on `final_time`.
    pub fn is_truncated(&self) -> bool {
        self.num_steps > 0 && self.is_step_truncated(self.num_steps - 1)
    }
}

/// Sequence of (time, state) pairs produced by an integrator, starting with the initial condition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<DVector<f64>>,
}

impl Trajectory {
    pub fn new(initial_time: f64, initial_state: DVector<f64>) -> Self {
        Self {
            times: vec![initial_time],
            states: vec![initial_state],
        }
    }

    pub(crate) const fn empty() -> Self {
        Self {
            times: Vec::new(),
            states: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, t: f64, state: DVector<f64>) {
        self.times.push(t);
        self.states.push(state);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[DVector<f64>] {
        &self.states
    }

    pub fn iter<'a>(&'a self) -> impl 'a + Iterator<Item = (f64, &'a DVector<f64>)> {
        izip!(&self.times, &self.states).map(|(t, y)| (*t, y))
    }

    pub fn last(&self) -> Option<(f64, &DVector<f64>)> {
        self.iter().last()
    }

    pub fn final_state(&self) -> Option<&DVector<f64>> {
        self.states.last()
    }

    /// The states as columns of a matrix.
    pub fn state_matrix(&self) -> DMatrix<f64> {
        let nrows = self.states.first().map(|y| y.len()).unwrap_or(0);
        DMatrix::from_fn(nrows, self.states.len(), |i, j| self.states[j][i])
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<DVector<f64>>) {
        (self.times, self.states)
    }
}
