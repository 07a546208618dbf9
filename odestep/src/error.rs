use thiserror::Error;

use crate::function::TermTableError;

/// Errors raised while evaluating a `Function` or its Jacobian.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunctionError {
    /// The state (or a matrix returned by a user callable) does not have the dimension of the system.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A user callable failed or produced output of the wrong shape.
    #[error("evaluation failed at t = {t}: {message}")]
    Evaluation { t: f64, state: Vec<f64>, message: String },
}

/// Errors raised by a single Newton solve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NewtonError {
    #[error(transparent)]
    Function(#[from] FunctionError),
    #[error("Newton iteration did not converge within {iterations} iterations (residual norm {residual_norm:e})")]
    ConvergenceFailure { iterations: usize, residual_norm: f64 },
    /// The Jacobian of the residual could not be factorized in the given iteration.
    #[error("singular Jacobian in Newton iteration {iteration}")]
    SingularJacobian { iteration: usize },
    /// A multistep formula was given a history of the wrong length.
    #[error("multistep history has {actual} states, expected {expected}")]
    HistoryLength { expected: usize, actual: usize },
}

/// Errors surfaced by the integrators.
///
/// Errors that occur while computing a step carry the index of the state that was being
/// computed (the initial condition has index 0) and its time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IntegrationError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("step {step}: evaluation failed at t = {t}: {message}")]
    Evaluation {
        step: usize,
        t: f64,
        state: Vec<f64>,
        message: String,
    },
    #[error("step {step} (t = {t}): Newton iteration did not converge within {iterations} iterations (residual norm {residual_norm:e})")]
    ConvergenceFailure {
        step: usize,
        t: f64,
        iterations: usize,
        residual_norm: f64,
    },
    #[error("step {step} (t = {t}): singular Jacobian")]
    SingularJacobian { step: usize, t: f64 },
}

impl IntegrationError {
    /// The index of the step that failed, if the error occurred during stepping.
    pub fn step(&self) -> Option<usize> {
        match self {
            IntegrationError::Configuration(_) => None,
            IntegrationError::Evaluation { step, .. }
            | IntegrationError::ConvergenceFailure { step, .. }
            | IntegrationError::SingularJacobian { step, .. } => Some(*step),
        }
    }
}

impl FunctionError {
    pub(crate) fn at_step(self, step: usize) -> IntegrationError {
        match self {
            FunctionError::DimensionMismatch { expected, actual } => IntegrationError::Configuration(format!(
                "dimension mismatch in step {}: expected {}, got {}",
                step, expected, actual
            )),
            FunctionError::Evaluation { t, state, message } => IntegrationError::Evaluation {
                step,
                t,
                state,
                message,
            },
        }
    }
}

impl NewtonError {
    /// Tags the error with the index and time of the step whose solve failed.
    pub(crate) fn at_step(self, step: usize, t: f64) -> IntegrationError {
        match self {
            NewtonError::Function(err) => err.at_step(step),
            NewtonError::ConvergenceFailure {
                iterations,
                residual_norm,
            } => IntegrationError::ConvergenceFailure {
                step,
                t,
                iterations,
                residual_norm,
            },
            NewtonError::SingularJacobian { .. } => IntegrationError::SingularJacobian { step, t },
            NewtonError::HistoryLength { expected, actual } => IntegrationError::Configuration(format!(
                "history in step {} has {} states, expected {}",
                step, actual, expected
            )),
        }
    }
}

pub(crate) fn configuration_error(message: impl Into<String>) -> IntegrationError {
    IntegrationError::Configuration(message.into())
}

impl From<TermTableError> for IntegrationError {
    fn from(err: TermTableError) -> Self {
        IntegrationError::Configuration(err.to_string())
    }
}
