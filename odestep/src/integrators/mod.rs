use log::info;
use nalgebra::DVector;

use crate::config::{InputParameters, Method};
use crate::error::{configuration_error, IntegrationError};
use crate::function::Function;
use crate::trajectory::{TimeGrid, Trajectory};

mod adams_moulton;
mod bdf;
mod euler;
mod multistep;

pub use adams_moulton::{adams_moulton_step, AdamsMoulton, AdamsMoultonCoefficients};
pub use bdf::{bdf_step, Bdf, BdfCoefficients};
pub use euler::{backward_euler_step, BackwardEuler};
pub use multistep::{MultiStep, MultiStepFormula, StartingValues};

/// A fixed-step integrator that advances an initial state to the final time.
///
/// Each call to `advance` computes and appends one state. If a step fails, the error carries
/// the index of the state that could not be computed and the trajectory keeps all states
/// computed so far; the failed step may be attempted again.
pub trait Integrator {
    fn name(&self) -> &'static str;

    /// Computes the next state. Returns `false` without doing anything if the final time
    /// has already been reached.
    fn advance(&mut self) -> Result<bool, IntegrationError>;

    fn trajectory(&self) -> &Trajectory;

    fn into_trajectory(self: Box<Self>) -> Trajectory;

    fn is_finished(&self) -> bool;

    /// Advances until the final time is reached.
    fn solve(&mut self) -> Result<&Trajectory, IntegrationError> {
        while self.advance()? {}
        Ok(self.trajectory())
    }
}

/// Builds the integrator selected by `params.method`.
pub fn build_integrator(
    params: &InputParameters,
    function: Function,
) -> Result<Box<dyn Integrator + Send>, IntegrationError> {
    let integrator: Box<dyn Integrator + Send> = match params.method {
        Method::BackwardEuler => Box::new(BackwardEuler::from_parameters(params, function)?),
        Method::Bdf => Box::new(Bdf::from_parameters(params, function)?),
        Method::AdamsMoulton => Box::new(AdamsMoulton::from_parameters(params, function)?),
    };
    Ok(integrator)
}

/// Integrates the system described by `params` and returns the complete trajectory.
///
/// On failure, the states computed before the failing step are discarded.
pub fn integrate(params: &InputParameters, function: Function) -> Result<Trajectory, IntegrationError> {
    let mut integrator = build_integrator(params, function)?;
    integrator.solve()?;
    Ok(integrator.into_trajectory())
}

/// The function, time grid and trajectory of a configured integrator.
#[derive(Debug)]
pub(crate) struct Problem {
    pub function: Function,
    pub grid: TimeGrid,
    pub trajectory: Trajectory,
}

impl Problem {
    pub fn new(
        step_size: f64,
        initial_time: f64,
        final_time: f64,
        initial_condition: DVector<f64>,
        function: Function,
    ) -> Result<Self, IntegrationError> {
        let grid = TimeGrid::new(initial_time, final_time, step_size)?;
        if initial_condition.len() != function.dimension() {
            return Err(configuration_error(format!(
                "initial condition has {} components, but the function has dimension {}",
                initial_condition.len(),
                function.dimension()
            )));
        }
        if initial_condition.iter().any(|y| !y.is_finite()) {
            return Err(configuration_error("initial condition must be finite"));
        }

        Ok(Self {
            function,
            grid,
            trajectory: Trajectory::new(initial_time, initial_condition),
        })
    }

    pub fn from_parameters(params: &InputParameters, function: Function) -> Result<Self, IntegrationError> {
        params.validate()?;
        if function.dimension() != params.num_equations {
            return Err(configuration_error(format!(
                "function has dimension {}, but the system has {} equations",
                function.dimension(),
                params.num_equations
            )));
        }
        Self::new(
            params.step_size,
            params.initial_time,
            params.final_time,
            params.initial_state(),
            function,
        )
    }

    /// Index of the next state to compute, or `None` if the final time is reached.
    pub fn next_step(&self) -> Option<usize> {
        let step = self.trajectory.len();
        if step <= self.grid.num_steps() {
            Some(step)
        } else {
            None
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next_step().is_none()
    }

    pub fn current_state(&self) -> &DVector<f64> {
        // The trajectory always holds at least the initial condition
        &self.trajectory.states()[self.trajectory.len() - 1]
    }

    pub fn log_summary(&self, name: &str) {
        info!(
            "{}: integrating {} equations from t = {} to t = {} in {} steps of size {}",
            name,
            self.function.dimension(),
            self.grid.initial_time(),
            self.grid.final_time(),
            self.grid.num_steps(),
            self.grid.step_size()
        );
        if self.grid.is_truncated() {
            info!(
                "{}: final step is truncated to length {}",
                name,
                self.grid.step_length(self.grid.num_steps() - 1)
            );
        }
    }

    pub fn log_finished(&self, name: &str) {
        if self.is_finished() {
            info!("{}: reached final time t = {}", name, self.grid.final_time());
        }
    }
}
