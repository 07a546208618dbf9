#![allow(clippy::excessive_precision)]
#![allow(clippy::too_many_arguments)]

/// Error types shared by functions, the Newton solver and the integrators.
pub mod error;
/// Right-hand sides of ODE systems and their Jacobians.
pub mod function;
/// Newton's method for the nonlinear systems produced by implicit steppers.
pub mod newton;
/// Residuals of implicit discretizations, consumed by the Newton solver.
pub mod residual;
/// Time grids and trajectories.
pub mod trajectory;
/// Run parameters of an integration.
pub mod config;
/// Implementations of implicit integration schemes.
pub mod integrators;
/// Parallel integration of independent configurations.
pub mod sweep;

pub use nalgebra;

pub use config::{InputParameters, Method};
pub use error::{FunctionError, IntegrationError, NewtonError};
pub use function::Function;
pub use integrators::{build_integrator, integrate, Integrator};
pub use newton::{NewtonMethod, NewtonSettings, NewtonSolution};
pub use trajectory::{TimeGrid, Trajectory};
