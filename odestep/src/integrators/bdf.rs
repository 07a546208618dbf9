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

/// Coefficients `[alpha_0, alpha_1, ..., alpha_k]` of a k-step backward differentiation formula
///  y^{n+1} = sum_{j=1}^k alpha_j y^{n+1-j} + h * alpha_0 * F(t^{n+1}, y^{n+1}).
#[derive(Debug, Clone, PartialEq)]
pub struct BdfCoefficients {
    alpha: Vec<f64>,
}

impl BdfCoefficients {
    pub fn new(alpha: Vec<f64>) -> Result<Self, IntegrationError> {
        if alpha.len() < 2 {
            return Err(configuration_error(format!(
                "BDF needs at least two coefficients, got {}",
                alpha.len()
            )));
        }
        if alpha.iter().any(|a| !a.is_finite()) {
            return Err(configuration_error("BDF coefficients must be finite"));
        }
        if alpha[0] == 0.0 {
            return Err(configuration_error("leading BDF coefficient must be nonzero"));
        }

        let history_sum: f64 = alpha[1..].iter().sum();
        if !abs_diff_eq!(history_sum, 1.0, epsilon = 1e-10) {
            warn!(
                "BDF coefficients {:?} are not consistent: history weights sum to {}",
                alpha, history_sum
            );
        }
        Ok(Self { alpha })
    }

    /// The standard k-step BDF method, for k between 1 and 6.
    pub fn standard(k: usize) -> Result<Self, IntegrationError> {
        let alpha = match k {
            1 => vec![1.0, 1.0],
            2 => vec![2.0 / 3.0, 4.0 / 3.0, -1.0 / 3.0],
            3 => vec![6.0 / 11.0, 18.0 / 11.0, -9.0 / 11.0, 2.0 / 11.0],
            4 => vec![12.0 / 25.0, 48.0 / 25.0, -36.0 / 25.0, 16.0 / 25.0, -3.0 / 25.0],
            5 => vec![
                60.0 / 137.0,
                300.0 / 137.0,
                -300.0 / 137.0,
                200.0 / 137.0,
                -75.0 / 137.0,
                12.0 / 137.0,
            ],
            6 => vec![
                60.0 / 147.0,
                360.0 / 147.0,
                -450.0 / 147.0,
                400.0 / 147.0,
                -225.0 / 147.0,
                72.0 / 147.0,
                -10.0 / 147.0,
            ],
            _ => {
                return Err(configuration_error(format!(
                    "standard BDF coefficients are available for 1 to 6 steps, not {}",
                    k
                )))
            }
        };
        Ok(Self { alpha })
    }

    /// Converts coefficients `[a_0, a_1, ..., a_k]` of the form
    ///  a_0 y^{n+1} - sum_{j=1}^k a_j y^{n+1-j} = h * F(t^{n+1}, y^{n+1}).
    pub fn from_leading_normalized(a: &[f64]) -> Result<Self, IntegrationError> {
        match a.first() {
            Some(&a0) if a0 != 0.0 && a0.is_finite() => {
                let alpha = std::iter::once(1.0 / a0)
                    .chain(a[1..].iter().map(|a_j| a_j / a0))
                    .collect();
                Self::new(alpha)
            }
            _ => Err(configuration_error("leading BDF coefficient must be nonzero")),
        }
    }

    /// Number of previous states k.
    pub fn order(&self) -> usize {
        self.alpha.len() - 1
    }

    pub fn leading(&self) -> f64 {
        self.alpha[0]
    }

    pub fn history_weights(&self) -> &[f64] {
        &self.alpha[1..]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.alpha
    }
}

/// Performs one BDF step by solving
///  G(y) = y - h * alpha_0 * F(t^{n+1}, y) - sum_{j=1}^k alpha_j y^{n+1-j} = 0
/// with Newton's method, starting from the most recent state.
///
/// `history` holds the k most recent states, newest first. A history of the wrong length
/// is a `NewtonError::HistoryLength`.
pub fn bdf_step(
    function: &Function,
    t_next: f64,
    step_size: f64,
    coefficients: &BdfCoefficients,
    history: &[&DVector<f64>],
    settings: &NewtonSettings,
) -> Result<NewtonSolution, NewtonError> {
    check_history(function, coefficients.order(), history.iter().copied())?;

    let mut constant_term = DVector::zeros(function.dimension());
    for (alpha_j, y_j) in izip!(coefficients.history_weights(), history) {
        constant_term.axpy(*alpha_j, *y_j, 1.0);
    }

    let residual = ImplicitResidual::bdf(function, t_next, coefficients.leading(), constant_term, step_size);
    NewtonMethod::new(residual, *settings).solve(history[0].clone())
}

impl MultiStepFormula for BdfCoefficients {
    fn name(&self) -> &'static str {
        "BDF"
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
        let states: Vec<_> = history.iter().map(|(_, y)| *y).collect();
        bdf_step(function, t_next, step_size, self, &states, settings)
    }
}

/// Backward differentiation formula integrator.
pub type Bdf = MultiStep<BdfCoefficients>;

impl MultiStep<BdfCoefficients> {
    /// Builds a BDF integrator with `params.num_steps` steps. Uses the standard coefficients
    /// if `params.alpha` is empty.
    pub fn from_parameters(params: &InputParameters, function: Function) -> Result<Self, IntegrationError> {
        let problem = Problem::from_parameters(params, function)?;
        let coefficients = if params.alpha.is_empty() {
            BdfCoefficients::standard(params.num_steps)?
        } else {
            BdfCoefficients::new(params.alpha.clone())?
        };
        Self::from_problem(coefficients, problem)?
            .with_newton_settings(params.newton)
            .with_starting_values(StartingValues::Supplied(params.starting_states()))
    }
}
