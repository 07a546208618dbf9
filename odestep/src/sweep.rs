use log::info;
use rayon::prelude::*;

use crate::config::InputParameters;
use crate::error::IntegrationError;
use crate::function::Function;
use crate::integrators::integrate;
use crate::trajectory::Trajectory;

/// Integrates independent configurations in parallel.
///
/// `make_function` builds a fresh `Function` for every configuration, so that no state is
/// shared between the runs. Results are returned in the order of `params`.
pub fn integrate_sweep<F>(params: &[InputParameters], make_function: F) -> Vec<Result<Trajectory, IntegrationError>>
where
    F: Fn(&InputParameters) -> Result<Function, IntegrationError> + Sync,
{
    info!("Integrating {} configurations in parallel", params.len());
    params
        .par_iter()
        .map(|params| integrate(params, make_function(params)?))
        .collect()
}

/// Integrates configurations whose right-hand sides are given as term tables.
pub fn integrate_term_table_sweep(params: &[InputParameters]) -> Vec<Result<Trajectory, IntegrationError>> {
    integrate_sweep(params, InputParameters::build_function)
}
