use coarse_prof::profile;
use log::debug;
use nalgebra::DVector;

use crate::error::{configuration_error, FunctionError, IntegrationError, NewtonError};
use crate::function::Function;
use crate::integrators::euler::backward_euler_step;
use crate::integrators::{Integrator, Problem};
use crate::newton::{NewtonSettings, NewtonSolution};
use crate::trajectory::Trajectory;

/// The step formula of an implicit linear multistep method.
pub trait MultiStepFormula {
    fn name(&self) -> &'static str;

    /// Number of previous states used by the formula.
    fn num_steps(&self) -> usize;

    /// Solves for the state at `t_next`.
    ///
    /// `history` holds exactly `num_steps()` pairs `(t, y)`, newest first, so that
    /// `history[0]` is the current state.
    fn step(
        &self,
        function: &Function,
        t_next: f64,
        step_size: f64,
        history: &[(f64, &DVector<f64>)],
        settings: &NewtonSettings,
    ) -> Result<NewtonSolution, NewtonError>;
}

/// Checks that a step formula of `num_steps` steps was given a matching history of states
/// with the dimension of `function`.
pub(crate) fn check_history<'a>(
    function: &Function,
    num_steps: usize,
    history: impl ExactSizeIterator<Item = &'a DVector<f64>>,
) -> Result<(), NewtonError> {
    if history.len() != num_steps {
        return Err(NewtonError::HistoryLength {
            expected: num_steps,
            actual: history.len(),
        });
    }
    for state in history {
        if state.len() != function.dimension() {
            return Err(FunctionError::DimensionMismatch {
                expected: function.dimension(),
                actual: state.len(),
            }
            .into());
        }
    }
    Ok(())
}

/// How the states before a full history is available are obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum StartingValues {
    /// Take single Backward Euler steps until k states are known.
    BackwardEuler,
    /// Treat the initial condition as if it had been constant for all times before
    /// the initial time, and use the multistep formula from the first step.
    Replicate,
    /// States at the first grid points after the initial time. Missing states are
    /// computed with Backward Euler.
    Supplied(Vec<DVector<f64>>),
}

impl Default for StartingValues {
    fn default() -> Self {
        StartingValues::BackwardEuler
    }
}

/// Fixed-step integrator driven by a linear multistep formula.
///
/// Steps for which fewer than k previous states are known are taken according to the
/// `StartingValues` policy. A final step that is shorter than the step size cannot use the
/// formula and is taken as a single Backward Euler step.
#[derive(Debug)]
pub struct MultiStep<M> {
    formula: M,
    starting_values: StartingValues,
    settings: NewtonSettings,
    problem: Problem,
}

impl<M> MultiStep<M>
where
    M: MultiStepFormula,
{
    pub fn new(
        formula: M,
        step_size: f64,
        initial_time: f64,
        final_time: f64,
        initial_condition: DVector<f64>,
        function: Function,
    ) -> Result<Self, IntegrationError> {
        let problem = Problem::new(step_size, initial_time, final_time, initial_condition, function)?;
        Self::from_problem(formula, problem)
    }

    pub(crate) fn from_problem(formula: M, problem: Problem) -> Result<Self, IntegrationError> {
        if formula.num_steps() == 0 {
            return Err(configuration_error("a multistep method needs at least one step"));
        }
        problem.log_summary(formula.name());
        Ok(Self {
            formula,
            starting_values: StartingValues::default(),
            settings: NewtonSettings::default(),
            problem,
        })
    }

    pub fn with_newton_settings(self, settings: NewtonSettings) -> Self {
        Self { settings, ..self }
    }

    /// Sets the starting value policy. Must be called before the first step.
    pub fn with_starting_values(mut self, starting_values: StartingValues) -> Result<Self, IntegrationError> {
        if self.problem.trajectory.len() > 1 {
            return Err(configuration_error(
                "starting values must be set before the integration starts",
            ));
        }

        if let StartingValues::Supplied(states) = &starting_values {
            let k = self.formula.num_steps();
            if states.len() + 1 > k {
                return Err(configuration_error(format!(
                    "{} starting values given, but a {}-step method uses at most {}",
                    states.len(),
                    k,
                    k - 1
                )));
            }
            let grid = &self.problem.grid;
            if states.len() > grid.num_steps()
                || (states.len() == grid.num_steps() && grid.is_truncated())
            {
                return Err(configuration_error("starting values extend beyond the time grid"));
            }
            let dimension = self.problem.function.dimension();
            if let Some(state) = states.iter().find(|state| state.len() != dimension) {
                return Err(configuration_error(format!(
                    "starting value has {} components, expected {}",
                    state.len(),
                    dimension
                )));
            }

            for (i, state) in states.iter().enumerate() {
                let t = self.problem.grid.time(i + 1);
                self.problem.trajectory.push(t, state.clone());
            }
        }

        self.starting_values = starting_values;
        Ok(self)
    }

    pub fn formula(&self) -> &M {
        &self.formula
    }

    pub fn starting_values(&self) -> &StartingValues {
        &self.starting_values
    }

    /// The `k` most recent states, newest first. With the `Replicate` policy, missing states
    /// are copies of the initial condition at times before the initial time.
    fn history(&self, k: usize) -> Vec<(f64, &DVector<f64>)> {
        let times = self.problem.trajectory.times();
        let states = self.problem.trajectory.states();
        let h = self.problem.grid.step_size();
        let n = states.len();

        (0..k)
            .map(|j| {
                if j < n {
                    (times[n - 1 - j], &states[n - 1 - j])
                } else {
                    let steps_back = (j + 1 - n) as f64;
                    (times[0] - steps_back * h, &states[0])
                }
            })
            .collect()
    }

    fn uses_formula(&self, step: usize) -> bool {
        let known_states = self.problem.trajectory.len();
        if self.problem.grid.is_step_truncated(step - 1) {
            false
        } else {
            match self.starting_values {
                StartingValues::Replicate => true,
                StartingValues::BackwardEuler | StartingValues::Supplied(_) => {
                    known_states >= self.formula.num_steps()
                }
            }
        }
    }
}

impl<M> Integrator for MultiStep<M>
where
    M: MultiStepFormula,
{
    fn name(&self) -> &'static str {
        self.formula.name()
    }

    fn advance(&mut self) -> Result<bool, IntegrationError> {
        let step = match self.problem.next_step() {
            Some(step) => step,
            None => return Ok(false),
        };

        profile!("multistep step");
        let t_next = self.problem.grid.time(step);
        let h = self.problem.grid.step_length(step - 1);

        let result = if self.uses_formula(step) {
            let history = self.history(self.formula.num_steps());
            self.formula
                .step(&self.problem.function, t_next, h, &history, &self.settings)
        } else {
            debug!("{} step {}: falling back to a Backward Euler step", self.formula.name(), step);
            backward_euler_step(
                &self.problem.function,
                t_next,
                h,
                self.problem.current_state(),
                &self.settings,
            )
        };
        let solution = result.map_err(|err| err.at_step(step, t_next))?;
        debug!(
            "Number of Newton iterations in {} step {}: {}",
            self.formula.name(),
            step,
            solution.iterations
        );

        self.problem.trajectory.push(t_next, solution.solution);
        self.problem.log_finished(self.formula.name());
        Ok(true)
    }

    fn trajectory(&self) -> &Trajectory {
        &self.problem.trajectory
    }

    fn into_trajectory(self: Box<Self>) -> Trajectory {
        self.problem.trajectory
    }

    fn is_finished(&self) -> bool {
        self.problem.is_finished()
    }
}
