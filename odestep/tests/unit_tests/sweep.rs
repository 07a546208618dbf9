use odestep::sweep::{integrate_sweep, integrate_term_table_sweep};
use odestep::{integrate, InputParameters, IntegrationError, Method};

use crate::unit_tests::problems::linear_decay;
use crate::utils::assert_trajectories_eq;

fn decay_parameters(step_size: f64) -> InputParameters {
    InputParameters {
        method: Method::Bdf,
        num_steps: 2,
        step_size,
        initial_condition: vec![1.0],
        ..InputParameters::default()
    }
}

#[test]
fn results_are_returned_in_input_order() {
    let step_sizes = [0.1, 0.05, 0.3, 0.02, 0.25, 0.125];
    let params: Vec<_> = step_sizes.iter().map(|h| decay_parameters(*h)).collect();

    let results = integrate_sweep(&params, |_| Ok(linear_decay(-2.0)));
    assert_eq!(results.len(), params.len());

    for (params, result) in params.iter().zip(&results) {
        let trajectory = result.as_ref().unwrap();
        let expected = integrate(params, linear_decay(-2.0)).unwrap();
        assert_trajectories_eq(trajectory, &expected, 0.0);
    }
}

#[test]
fn failing_configuration_only_affects_its_own_result() {
    let mut params = vec![decay_parameters(0.1), decay_parameters(-0.1), decay_parameters(0.2)];
    params[2].num_equations = 2;

    let results = integrate_sweep(&params, |params| {
        if params.num_equations == 1 {
            Ok(linear_decay(-1.0))
        } else {
            Err(IntegrationError::Configuration("no function for this system".to_string()))
        }
    });

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(IntegrationError::Configuration(_))));
    assert_eq!(
        results[2],
        Err(IntegrationError::Configuration("no function for this system".to_string()))
    );
}

#[test]
fn term_table_sweep_builds_functions_from_parameters() {
    let decay = |lambda: f64| InputParameters {
        function_terms: Some(vec![vec!["0".to_string(), format!("{}_6_1", lambda)]]),
        jacobian_terms: Some(vec![vec![format!("{}_7_1", lambda)]]),
        ..decay_parameters(0.1)
    };
    let params = vec![decay(-1.0), decay(-4.0), decay_parameters(0.1)];

    let results = integrate_term_table_sweep(&params);
    for (i, &lambda) in [-1.0, -4.0].iter().enumerate() {
        let expected = integrate(&params[i], linear_decay(lambda)).unwrap();
        assert_trajectories_eq(results[i].as_ref().unwrap(), &expected, 1e-14);
    }

    // No function terms given
    assert!(matches!(results[2], Err(IntegrationError::Configuration(_))));
}
