use coarse_prof::profile;
use log::debug;
use nalgebra::DVector;

use crate::config::InputParameters;
use crate::error::{configuration_error, IntegrationError, NewtonError};
use crate::function::Function;
use crate::integrators::{Integrator, Problem};
use crate::newton::{NewtonMethod, NewtonSettings, NewtonSolution};
use crate::residual::ImplicitResidual;
use crate::trajectory::Trajectory;

static EMPTY_TRAJECTORY: Trajectory = Trajectory::empty();

/// Performs one step of the Backward Euler integrator,
///  y^{n+1} = y^n + h * F(t^{n+1}, y^{n+1}),
/// by solving
///  G(y) = y - h * F(t^{n+1}, y) - y^n = 0
/// with Newton's method, starting from y^n.
pub fn backward_euler_step(
    function: &Function,
    t_next: f64,
    step_size: f64,
    y_n: &DVector<f64>,
    settings: &NewtonSettings,
) -> Result<NewtonSolution, NewtonError> {
    let residual = ImplicitResidual::backward_euler(function, t_next, 1.0, y_n.clone(), step_size);
    NewtonMethod::new(residual, *settings).solve(y_n.clone())
}

/// The implicit (Backward) Euler method.
///
/// A default-constructed integrator is a placeholder: it must be configured before it can
/// advance.
#[derive(Debug, Default)]
pub struct BackwardEuler {
    problem: Option<Problem>,
    settings: NewtonSettings,
}

impl BackwardEuler {
    pub fn new(
        step_size: f64,
        initial_time: f64,
        final_time: f64,
        initial_condition: DVector<f64>,
        function: Function,
    ) -> Result<Self, IntegrationError> {
        let mut integrator = Self::default();
        integrator.configure(step_size, initial_time, final_time, initial_condition, function)?;
        Ok(integrator)
    }

    pub fn from_parameters(params: &InputParameters, function: Function) -> Result<Self, IntegrationError> {
        let problem = Problem::from_parameters(params, function)?;
        problem.log_summary("Backward Euler");
        Ok(Self {
            problem: Some(problem),
            settings: params.newton,
        })
    }

    /// Sets up the problem, discarding any previously computed trajectory.
    pub fn configure(
        &mut self,
        step_size: f64,
        initial_time: f64,
        final_time: f64,
        initial_condition: DVector<f64>,
        function: Function,
    ) -> Result<(), IntegrationError> {
        let problem = Problem::new(step_size, initial_time, final_time, initial_condition, function)?;
        problem.log_summary("Backward Euler");
        self.problem = Some(problem);
        Ok(())
    }

    pub fn with_newton_settings(self, settings: NewtonSettings) -> Self {
        Self { settings, ..self }
    }

    pub fn is_configured(&self) -> bool {
        self.problem.is_some()
    }
}

impl Integrator for BackwardEuler {
    fn name(&self) -> &'static str {
        "Backward Euler"
    }

    fn advance(&mut self) -> Result<bool, IntegrationError> {
        let problem = self
            .problem
            .as_mut()
            .ok_or_else(|| configuration_error("Backward Euler integrator is not configured"))?;
        let step = match problem.next_step() {
            Some(step) => step,
            None => return Ok(false),
        };

        profile!("backward euler step");
        let t_next = problem.grid.time(step);
        let h = problem.grid.step_length(step - 1);
        let solution = backward_euler_step(&problem.function, t_next, h, problem.current_state(), &self.settings)
            .map_err(|err| err.at_step(step, t_next))?;
        debug!(
            "Number of Newton iterations in Backward Euler step {}: {}",
            step, solution.iterations
        );

        problem.trajectory.push(t_next, solution.solution);
        problem.log_finished("Backward Euler");
        Ok(true)
    }

    fn trajectory(&self) -> &Trajectory {
        self.problem
            .as_ref()
            .map(|problem| &problem.trajectory)
            .unwrap_or(&EMPTY_TRAJECTORY)
    }

    fn into_trajectory(self: Box<Self>) -> Trajectory {
        self.problem
            .map(|problem| problem.trajectory)
            .unwrap_or_default()
    }

    fn is_finished(&self) -> bool {
        self.problem.as_ref().map(Problem::is_finished).unwrap_or(false)
    }
}
