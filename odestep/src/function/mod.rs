use coarse_prof::profile;
use nalgebra::{DMatrix, DVector};
use std::error::Error;
use std::fmt;

use crate::error::FunctionError;

mod term_table;

pub use term_table::{Term, TermKind, TermTable, TermTableError};

/// Result type returned by user-supplied callables.
pub type EvalResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

type RightHandSide = dyn Fn(f64, &DVector<f64>) -> EvalResult<DVector<f64>> + Send + Sync;
type JacobianCallable = dyn Fn(f64, &DVector<f64>) -> EvalResult<DMatrix<f64>> + Send + Sync;

/// sqrt(machine epsilon), the relative perturbation used for finite differences.
const FINITE_DIFFERENCE_STEP: f64 = 1.4901161193847656e-8;

/// How the Jacobian of a `Function` is obtained. Decided once, when the function is built.
pub enum JacobianSource {
    Analytic(Box<JacobianCallable>),
    FiniteDifference,
}

/// The right-hand side F(t, y) of an ODE system dy/dt = F(t, y).
///
/// A `Function` evaluates F and its Jacobian dF/dy. If no analytic Jacobian is supplied,
/// the Jacobian is approximated with forward differences. The user callables must be
/// deterministic and free of side effects.
pub struct Function {
    dimension: usize,
    rhs: Box<RightHandSide>,
    jacobian: JacobianSource,
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("dimension", &self.dimension)
            .field("has_analytic_jacobian", &self.has_analytic_jacobian())
            .finish()
    }
}

impl Function {
    /// Creates a function of the given dimension from an infallible right-hand side.
    pub fn new<F>(dimension: usize, rhs: F) -> Self
    where
        F: Fn(f64, &DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Self::try_new(dimension, move |t, y| Ok(rhs(t, y)))
    }

    /// Creates a function whose right-hand side may fail.
    pub fn try_new<F>(dimension: usize, rhs: F) -> Self
    where
        F: Fn(f64, &DVector<f64>) -> EvalResult<DVector<f64>> + Send + Sync + 'static,
    {
        Self {
            dimension,
            rhs: Box::new(rhs),
            jacobian: JacobianSource::FiniteDifference,
        }
    }

    /// Supplies an analytic Jacobian, replacing the finite difference approximation.
    pub fn with_jacobian<J>(self, jacobian: J) -> Self
    where
        J: Fn(f64, &DVector<f64>) -> DMatrix<f64> + Send + Sync + 'static,
    {
        self.try_with_jacobian(move |t, y| Ok(jacobian(t, y)))
    }

    pub fn try_with_jacobian<J>(self, jacobian: J) -> Self
    where
        J: Fn(f64, &DVector<f64>) -> EvalResult<DMatrix<f64>> + Send + Sync + 'static,
    {
        Self {
            jacobian: JacobianSource::Analytic(Box::new(jacobian)),
            ..self
        }
    }

    /// Builds a function from term tables.
    ///
    /// `rhs` has one row per equation and `dimension + 1` cells per row, see `TermTable`.
    /// If `jacobian` is given, it must be a square table of the same dimension; otherwise
    /// the Jacobian is approximated numerically.
    pub fn from_term_tables<S>(rhs: &[Vec<S>], jacobian: Option<&[Vec<S>]>) -> Result<Self, TermTableError>
    where
        S: AsRef<str>,
    {
        let rhs_table = TermTable::parse_right_hand_side(rhs)?;
        let dimension = rhs_table.num_rows();
        let function = Self::try_new(dimension, move |t, y| rhs_table.evaluate_right_hand_side(t, y));

        match jacobian {
            Some(jacobian) => {
                let jacobian_table = TermTable::parse_jacobian(jacobian, dimension)?;
                Ok(function.try_with_jacobian(move |_, y| jacobian_table.evaluate_jacobian(y)))
            }
            None => Ok(function),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn has_analytic_jacobian(&self) -> bool {
        match self.jacobian {
            JacobianSource::Analytic(_) => true,
            JacobianSource::FiniteDifference => false,
        }
    }

    /// Evaluates F(t, y).
    pub fn build_right_hand_side(&self, t: f64, y: &DVector<f64>) -> Result<DVector<f64>, FunctionError> {
        self.check_dimension(y)?;
        let f = (self.rhs)(t, y).map_err(|err| evaluation_error(t, y, err.to_string()))?;
        if f.len() != self.dimension {
            return Err(evaluation_error(
                t,
                y,
                format!(
                    "right-hand side returned a vector of length {}, expected {}",
                    f.len(),
                    self.dimension
                ),
            ));
        }
        Ok(f)
    }

    /// Evaluates the Jacobian dF/dy at (t, y).
    pub fn build_jacobian(&self, t: f64, y: &DVector<f64>) -> Result<DMatrix<f64>, FunctionError> {
        profile!("jacobian");
        self.check_dimension(y)?;
        match &self.jacobian {
            JacobianSource::Analytic(jacobian) => {
                let j = jacobian(t, y).map_err(|err| evaluation_error(t, y, err.to_string()))?;
                if j.nrows() != self.dimension || j.ncols() != self.dimension {
                    return Err(evaluation_error(
                        t,
                        y,
                        format!(
                            "Jacobian has shape {}x{}, expected {}x{}",
                            j.nrows(),
                            j.ncols(),
                            self.dimension,
                            self.dimension
                        ),
                    ));
                }
                Ok(j)
            }
            JacobianSource::FiniteDifference => self.approximate_jacobian(t, y),
        }
    }

    /// Forward difference approximation of the Jacobian.
    ///
    /// Column `i` is (F(y + eps_i e_i) - F(y)) / eps_i with eps_i = sqrt(eps) * max(1, |y_i|).
    fn approximate_jacobian(&self, t: f64, y: &DVector<f64>) -> Result<DMatrix<f64>, FunctionError> {
        let f = self.build_right_hand_side(t, y)?;
        let mut jacobian = DMatrix::zeros(self.dimension, self.dimension);
        let mut y_perturbed = y.clone();

        for i in 0..self.dimension {
            let y_i = y[i];
            y_perturbed[i] = y_i + FINITE_DIFFERENCE_STEP * y_i.abs().max(1.0);
            // Divide by the step that is actually representable
            let h = y_perturbed[i] - y_i;
            let f_perturbed = self.build_right_hand_side(t, &y_perturbed)?;
            jacobian.column_mut(i).copy_from(&((f_perturbed - &f) / h));
            y_perturbed[i] = y_i;
        }

        Ok(jacobian)
    }

    fn check_dimension(&self, y: &DVector<f64>) -> Result<(), FunctionError> {
        if y.len() == self.dimension {
            Ok(())
        } else {
            Err(FunctionError::DimensionMismatch {
                expected: self.dimension,
                actual: y.len(),
            })
        }
    }
}

fn evaluation_error(t: f64, y: &DVector<f64>, message: String) -> FunctionError {
    FunctionError::Evaluation {
        t,
        state: y.iter().copied().collect(),
        message,
    }
}
