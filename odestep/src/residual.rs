use nalgebra::{DMatrix, DVector};

use crate::error::FunctionError;
use crate::function::Function;

/// A nonlinear vector function G whose root is sought by `NewtonMethod`.
pub trait ResidualProvider {
    fn dimension(&self) -> usize;

    /// Evaluates G(y).
    fn evaluate(&self, y: &DVector<f64>) -> Result<DVector<f64>, FunctionError>;

    /// Evaluates the Jacobian dG/dy.
    fn jacobian(&self, y: &DVector<f64>) -> Result<DMatrix<f64>, FunctionError>;
}

impl<R> ResidualProvider for &R
where
    R: ResidualProvider + ?Sized,
{
    fn dimension(&self) -> usize {
        R::dimension(self)
    }

    fn evaluate(&self, y: &DVector<f64>) -> Result<DVector<f64>, FunctionError> {
        R::evaluate(self, y)
    }

    fn jacobian(&self, y: &DVector<f64>) -> Result<DMatrix<f64>, FunctionError> {
        R::jacobian(self, y)
    }
}

/// The bare right-hand side G(y) = F(t, y) at a fixed time.
pub struct RootFind<'a> {
    pub function: &'a Function,
    pub t: f64,
}

impl<'a> RootFind<'a> {
    pub fn new(function: &'a Function, t: f64) -> Self {
        Self { function, t }
    }
}

impl<'a> ResidualProvider for RootFind<'a> {
    fn dimension(&self) -> usize {
        self.function.dimension()
    }

    fn evaluate(&self, y: &DVector<f64>) -> Result<DVector<f64>, FunctionError> {
        self.function.build_right_hand_side(self.t, y)
    }

    fn jacobian(&self, y: &DVector<f64>) -> Result<DMatrix<f64>, FunctionError> {
        self.function.build_jacobian(self.t, y)
    }
}

/// Residual of an implicit step,
///  G(y) = y - c * h * F(t, y) - b,
/// with Jacobian
///  dG/dy = I - c * h * dF/dy.
///
/// For Backward Euler c = beta and b = y^n. Linear multistep methods fold the contributions
/// of the previous states into the constant term b, with c the leading coefficient of the method.
pub struct ImplicitResidual<'a> {
    function: &'a Function,
    t: f64,
    coefficient: f64,
    step_size: f64,
    constant_term: DVector<f64>,
}

impl<'a> ImplicitResidual<'a> {
    /// Residual y - beta * h * F(t, y) - constant_term.
    pub fn backward_euler(
        function: &'a Function,
        t: f64,
        beta: f64,
        constant_term: DVector<f64>,
        step_size: f64,
    ) -> Self {
        Self {
            function,
            t,
            coefficient: beta,
            step_size,
            constant_term,
        }
    }

    /// Residual y - alpha_0 * h * F(t, y) - constant_term, where the constant term is the
    /// weighted sum of the history states.
    pub fn bdf(function: &'a Function, t: f64, alpha0: f64, constant_term: DVector<f64>, step_size: f64) -> Self {
        Self {
            function,
            t,
            coefficient: alpha0,
            step_size,
            constant_term,
        }
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn constant_term(&self) -> &DVector<f64> {
        &self.constant_term
    }
}

impl<'a> ResidualProvider for ImplicitResidual<'a> {
    fn dimension(&self) -> usize {
        self.function.dimension()
    }

    #[allow(non_snake_case)]
    fn evaluate(&self, y: &DVector<f64>) -> Result<DVector<f64>, FunctionError> {
        let F = self.function.build_right_hand_side(self.t, y)?;
        let mut G = y - &self.constant_term;
        G.axpy(-self.coefficient * self.step_size, &F, 1.0);
        Ok(G)
    }

    #[allow(non_snake_case)]
    fn jacobian(&self, y: &DVector<f64>) -> Result<DMatrix<f64>, FunctionError> {
        let J_F = self.function.build_jacobian(self.t, y)?;
        let n = self.dimension();
        let mut J_G = J_F * (-self.coefficient * self.step_size);
        for i in 0..n {
            J_G[(i, i)] += 1.0;
        }
        Ok(J_G)
    }
}
