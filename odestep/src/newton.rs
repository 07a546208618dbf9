use coarse_prof::profile;
use log::{debug, trace};
use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dynamic};
use serde::{Deserialize, Serialize};

use crate::error::NewtonError;
use crate::residual::ResidualProvider;

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewtonSettings {
    /// Convergence tolerance.
    ///
    /// The iteration stops once either the update or the residual satisfies
    ///  norm(x) <= tolerance * (1 + norm(y)),
    /// where y is the current iterate and norm( ) is the Euclidean 2-norm.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Factorize the Jacobian only in the first iteration and reuse it afterwards
    /// (chord method).
    pub reuse_jacobian: bool,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-10,
            max_iterations: 50,
            reuse_jacobian: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewtonSolution {
    pub solution: DVector<f64>,
    /// Number of Newton updates that were applied.
    pub iterations: usize,
    /// Norm of the residual at the solution.
    pub residual_norm: f64,
}

/// Newton's method for G(y) = 0.
///
/// Each iteration solves the dense linear system dG/dy * dy = -G(y) with an LU decomposition.
pub struct NewtonMethod<R> {
    residual: R,
    settings: NewtonSettings,
}

impl<R> NewtonMethod<R>
where
    R: ResidualProvider,
{
    pub fn new(residual: R, settings: NewtonSettings) -> Self {
        Self { residual, settings }
    }

    pub fn residual(&self) -> &R {
        &self.residual
    }

    pub fn settings(&self) -> &NewtonSettings {
        &self.settings
    }

    /// Runs the iteration from the given initial guess.
    ///
    /// Returns immediately with zero iterations if the initial guess already satisfies
    /// the tolerance.
    pub fn solve(&self, initial_guess: DVector<f64>) -> Result<NewtonSolution, NewtonError> {
        profile!("newton");
        let tolerance = self.settings.tolerance;

        let mut y = initial_guess;
        let mut g = self.residual.evaluate(&y)?;
        let mut residual_norm = g.norm();

        if residual_norm <= tolerance * (1.0 + y.norm()) {
            trace!("Initial guess satisfies Newton tolerance (residual norm {:e})", residual_norm);
            return Ok(NewtonSolution {
                solution: y,
                iterations: 0,
                residual_norm,
            });
        }

        let mut lu = None;
        for iteration in 1..=self.settings.max_iterations {
            if lu.is_none() || !self.settings.reuse_jacobian {
                let jacobian = self.residual.jacobian(&y)?;
                lu = Some(factorize(jacobian, iteration)?);
            }

            let dy = lu
                .as_ref()
                .and_then(|lu| lu.solve(&(-&g)))
                .ok_or(NewtonError::SingularJacobian { iteration })?;
            y += &dy;

            g = self.residual.evaluate(&y)?;
            residual_norm = g.norm();
            let dy_norm = dy.norm();
            trace!(
                "Newton iteration {}: update norm {:e}, residual norm {:e}",
                iteration,
                dy_norm,
                residual_norm
            );

            if !residual_norm.is_finite() || !dy_norm.is_finite() {
                return Err(NewtonError::ConvergenceFailure {
                    iterations: iteration,
                    residual_norm,
                });
            }

            let threshold = tolerance * (1.0 + y.norm());
            if dy_norm <= threshold || residual_norm <= threshold {
                debug!("Newton converged in {} iterations", iteration);
                return Ok(NewtonSolution {
                    solution: y,
                    iterations: iteration,
                    residual_norm,
                });
            }
        }

        Err(NewtonError::ConvergenceFailure {
            iterations: self.settings.max_iterations,
            residual_norm,
        })
    }
}

/// LU-factorizes the Jacobian, rejecting matrices with a pivot that is zero relative
/// to the largest entry.
fn factorize(jacobian: DMatrix<f64>, iteration: usize) -> Result<LU<f64, Dynamic, Dynamic>, NewtonError> {
    let scale = jacobian.amax();
    let lu = jacobian.lu();
    let min_pivot = lu
        .u()
        .diagonal()
        .iter()
        .fold(f64::INFINITY, |min, pivot| min.min(pivot.abs()));

    if !scale.is_finite() || scale == 0.0 || !(min_pivot > f64::EPSILON * scale) {
        Err(NewtonError::SingularJacobian { iteration })
    } else {
        Ok(lu)
    }
}
