use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::{configuration_error, IntegrationError};
use crate::function::Function;
use crate::newton::NewtonSettings;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    BackwardEuler,
    Bdf,
    AdamsMoulton,
}

impl Default for Method {
    fn default() -> Self {
        Method::BackwardEuler
    }
}

/// Parameters of a single integration run.
///
/// Coefficient vectors include the leading coefficient, so a `num_steps`-step method has
/// `num_steps + 1` coefficients. Empty coefficient vectors select the standard coefficients
/// of the method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputParameters {
    pub method: Method,
    pub num_equations: usize,
    pub step_size: f64,
    pub initial_time: f64,
    pub final_time: f64,
    #[serde(alias = "num_stage")]
    pub num_steps: usize,
    /// BDF coefficients `[alpha_0, alpha_1, ..., alpha_k]`.
    pub alpha: Vec<f64>,
    /// Adams-Moulton coefficients `[beta_0, beta_1, ..., beta_k]`.
    pub beta: Vec<f64>,
    pub initial_condition: Vec<f64>,
    /// States following the initial condition, used to start multistep methods.
    pub starting_values: Vec<Vec<f64>>,
    /// Right-hand side as a term table, see `TermTable`.
    pub function_terms: Option<Vec<Vec<String>>>,
    pub jacobian_terms: Option<Vec<Vec<String>>>,
    pub newton: NewtonSettings,
}

impl Default for InputParameters {
    fn default() -> Self {
        Self {
            method: Method::default(),
            num_equations: 1,
            step_size: 0.1,
            initial_time: 0.0,
            final_time: 1.0,
            num_steps: 1,
            alpha: Vec::new(),
            beta: Vec::new(),
            initial_condition: vec![0.0],
            starting_values: Vec::new(),
            function_terms: None,
            jacobian_terms: None,
            newton: NewtonSettings::default(),
        }
    }
}

impl InputParameters {
    /// Checks the dimensional consistency of the parameters.
    pub fn validate(&self) -> Result<(), IntegrationError> {
        if self.num_equations == 0 {
            return Err(configuration_error("number of equations must be positive"));
        }
        if self.initial_condition.len() != self.num_equations {
            return Err(configuration_error(format!(
                "initial condition has {} components, but the system has {} equations",
                self.initial_condition.len(),
                self.num_equations
            )));
        }
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(configuration_error(format!(
                "step size must be positive and finite, got {}",
                self.step_size
            )));
        }
        if !self.initial_time.is_finite() || !self.final_time.is_finite() {
            return Err(configuration_error("initial and final time must be finite"));
        }
        if self.final_time < self.initial_time {
            return Err(configuration_error(format!(
                "final time {} is smaller than initial time {}",
                self.final_time, self.initial_time
            )));
        }
        if self.num_steps == 0 {
            return Err(configuration_error("number of steps must be positive"));
        }

        match self.method {
            Method::BackwardEuler => {}
            Method::Bdf => check_coefficients("alpha", &self.alpha, self.num_steps)?,
            Method::AdamsMoulton => check_coefficients("beta", &self.beta, self.num_steps)?,
        }

        let max_starting_values = match self.method {
            Method::BackwardEuler => 0,
            Method::Bdf | Method::AdamsMoulton => self.num_steps - 1,
        };
        if self.starting_values.len() > max_starting_values {
            return Err(configuration_error(format!(
                "{} starting values given, but at most {} can be used",
                self.starting_values.len(),
                max_starting_values
            )));
        }
        if let Some(value) = self
            .starting_values
            .iter()
            .find(|value| value.len() != self.num_equations)
        {
            return Err(configuration_error(format!(
                "starting value has {} components, but the system has {} equations",
                value.len(),
                self.num_equations
            )));
        }

        if !(self.newton.tolerance > 0.0) || self.newton.max_iterations == 0 {
            return Err(configuration_error(
                "Newton tolerance and maximum number of iterations must be positive",
            ));
        }

        Ok(())
    }

    pub fn initial_state(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.initial_condition)
    }

    pub fn starting_states(&self) -> Vec<DVector<f64>> {
        self.starting_values
            .iter()
            .map(|value| DVector::from_column_slice(value))
            .collect()
    }

    /// Builds the right-hand side from `function_terms` and `jacobian_terms`.
    pub fn build_function(&self) -> Result<Function, IntegrationError> {
        let rhs = self
            .function_terms
            .as_ref()
            .ok_or_else(|| configuration_error("no function terms given"))?;
        let function = Function::from_term_tables(rhs, self.jacobian_terms.as_deref())?;
        if function.dimension() != self.num_equations {
            return Err(configuration_error(format!(
                "function terms describe {} equations, expected {}",
                function.dimension(),
                self.num_equations
            )));
        }
        Ok(function)
    }
}

fn check_coefficients(name: &str, coefficients: &[f64], num_steps: usize) -> Result<(), IntegrationError> {
    if !coefficients.is_empty() && coefficients.len() != num_steps + 1 {
        return Err(configuration_error(format!(
            "{} must have {} coefficients for a {}-step method, got {}",
            name,
            num_steps + 1,
            num_steps,
            coefficients.len()
        )));
    }
    if coefficients.first() == Some(&0.0) {
        return Err(configuration_error(format!("leading coefficient of {} must be nonzero", name)));
    }
    Ok(())
}
