use approx::abs_diff_eq;
use itertools::izip;
use log::warn;
use nalgebra::DVector;

use crate::config::InputParameters;
use crate::error::{configuration_error, IntegrationError, NewtonError};
use crate::function::Function;
use crate::integrators::multistep::{check_history, MultiStep, MultiStepFormula, StartingValues};
use crate::integrators::Problem;
use crate::newton::{NewtonMethod, NewtonSettings, NewtonSolution};
use crate::residual::ImplicitResidual;

/// Coefficients `[beta_0, beta_1, ..., beta_k]` of a k-step Adams-Moulton method
///  y^{n+1} = y^n + h * (beta_0 F(t^{n+1}, y^{n+1}) + sum_{j=1}^k beta_j F(t^{n+1-j}, y^{n+1-j})).
#[derive(Debug, Clone, PartialEq)]
pub struct AdamsMoultonCoefficients {
    beta: Vec<f64>,
}

impl AdamsMoultonCoefficients {
    pub fn new(beta: Vec<f64>) -> Result<Self, IntegrationError> {
        if beta.len() < 2 {
            return Err(configuration_error(format!(
                "Adams-Moulton needs at least two coefficients, got {}",
                beta.len()
            )));
        }
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(configuration_error("Adams-Moulton coefficients must be finite"));
        }
        if beta[0] == 0.0 {
            return Err(configuration_error(
                "leading Adams-Moulton coefficient must be nonzero",
            ));
        }

        let sum: f64 = beta.iter().sum();
        if !abs_diff_eq!(sum, 1.0, epsilon = 1e-10) {
            warn!("Adams-Moulton coefficients {:?} are not consistent: they sum to {}", beta, sum);
        }
        Ok(Self { beta })
    }

    /// Backward Euler written as a one-step Adams-Moulton method.
    pub fn backward_euler() -> Self {
        Self { beta: vec![1.0, 0.0] }
    }

    /// The standard k-step Adams-Moulton method, for k between 1 and 4.
    pub fn standard(k: usize) -> Result<Self, IntegrationError> {
        let beta = match k {
            1 => vec![0.5, 0.5],
            2 => vec![5.0 / 12.0, 8.0 / 12.0, -1.0 / 12.0],
            3 => vec![9.0 / 24.0, 19.0 / 24.0, -5.0 / 24.0, 1.0 / 24.0],
            4 => vec![
                251.0 / 720.0,
                646.0 / 720.0,
                -264.0 / 720.0,
                106.0 / 720.0,
                -19.0 / 720.0,
            ],
            _ => {
                return Err(configuration_error(format!(
                    "standard Adams-Moulton coefficients are available for 1 to 4 steps, not {}",
                    k
                )))
            }
        };
        Ok(Self { beta })
    }

    pub fn order(&self) -> usize {
        self.beta.len() - 1
    }

    pub fn leading(&self) -> f64 {
        self.beta[0]
    }

    pub fn history_weights(&self) -> &[f64] {
        &self.beta[1..]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.beta
    }
}

/// Performs one Adams-Moulton step by solving
///  G(y) = y - h * beta_0 * F(t^{n+1}, y) - c = 0,
///  c = y^n + h * sum_{j=1}^k beta_j F(t^{n+1-j}, y^{n+1-j}),
/// with Newton's method, starting from the most recent state.
///
/// `history` holds the k most recent pairs `(t, y)`, newest first.
pub fn adams_moulton_step(
    function: &Function,
    t_next: f64,
    step_size: f64,
    coefficients: &AdamsMoultonCoefficients,
    history: &[(f64, &DVector<f64>)],
    settings: &NewtonSettings,
) -> Result<NewtonSolution, NewtonError> {
    check_history(function, coefficients.order(), history.iter().map(|(_, y)| *y))?;

    let y_n = history[0].1;
    let mut constant_term = y_n.clone();
    for (beta_j, (t_j, y_j)) in izip!(coefficients.history_weights(), history) {
        if *beta_j != 0.0 {
            let f_j = function.build_right_hand_side(*t_j, y_j)?;
            constant_term.axpy(step_size * beta_j, &f_j, 1.0);
        }
    }

    let residual = ImplicitResidual::backward_euler(function, t_next, coefficients.leading(), constant_term, step_size);
    NewtonMethod::new(residual, *settings).solve(y_n.clone())
}

impl MultiStepFormula for AdamsMoultonCoefficients {
    fn name(&self) -> &'static str {
        "Adams-Moulton"
    }

    fn num_steps(&self) -> usize {
        self.order()
    }

    fn step(
        &self,
        function: &Function,
        t_next: f64,
        step_size: f64,
        history: &[(f64, &DVector<f64>)],
        settings: &NewtonSettings,
    ) -> Result<NewtonSolution, NewtonError> {
        adams_moulton_step(function, t_next, step_size, self, history, settings)
    }
}

/// Adams-Moulton integrator.
pub type AdamsMoulton = MultiStep<AdamsMoultonCoefficients>;

impl MultiStep<AdamsMoultonCoefficients> {
    /// Builds an Adams-Moulton integrator with `params.num_steps` steps. Uses the standard
    /// coefficients if `params.beta` is empty.
    pub fn from_parameters(params: &InputParameters, function: Function) -> Result<Self, IntegrationError> {
        let problem = Problem::from_parameters(params, function)?;
        let coefficients = if params.beta.is_empty() {
            AdamsMoultonCoefficients::standard(params.num_steps)?
        } else {
            AdamsMoultonCoefficients::new(params.beta.clone())?
        };
        Self::from_problem(coefficients, problem)?
            .with_newton_settings(params.newton)
            .with_starting_values(StartingValues::Supplied(params.starting_states()))
    }
}
