use matrixcompare::assert_scalar_eq;
use odestep::integrators::StartingValues;
use odestep::{build_integrator, integrate, InputParameters, IntegrationError, Method, NewtonSettings};

use crate::unit_tests::problems::{forced_oscillator, FORCED_OSCILLATOR_BACKWARD_EULER};
use crate::utils::{assert_trajectories_eq, assert_trajectory_matches};

fn forced_oscillator_terms() -> InputParameters {
    let table = |rows: &[&[&str]]| -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    };

    InputParameters {
        num_equations: 2,
        initial_condition: vec![1.0, 0.0],
        function_terms: Some(table(&[&["1_6_1", "0", "1_6_1"], &["1_1_1", "-1_6_1", "0"]])),
        jacobian_terms: Some(table(&[&["0", "1_7_1"], &["-1_7_1", "0"]])),
        ..InputParameters::default()
    }
}

#[test]
fn deserialize_parameters() {
    let json = r#"{
        "method": "bdf",
        "num_equations": 2,
        "step_size": 0.05,
        "final_time": 2.0,
        "num_stage": 2,
        "alpha": [0.6666666666666666, 1.3333333333333333, -0.3333333333333333],
        "initial_condition": [1.0, 0.0],
        "newton": { "max_iterations": 10 }
    }"#;
    let params: InputParameters = serde_json::from_str(json).unwrap();

    assert_eq!(params.method, Method::Bdf);
    assert_eq!(params.num_steps, 2);
    assert_scalar_eq!(params.step_size, 0.05);
    assert_scalar_eq!(params.initial_time, 0.0);
    assert_eq!(params.alpha.len(), 3);
    assert!(params.beta.is_empty());
    assert!(params.starting_values.is_empty());
    assert_eq!(params.newton.max_iterations, 10);
    assert_scalar_eq!(params.newton.tolerance, NewtonSettings::default().tolerance);
    assert_eq!(params.validate(), Ok(()));
}

#[test]
fn parameters_survive_serialization() {
    let params = InputParameters {
        method: Method::AdamsMoulton,
        num_steps: 2,
        starting_values: vec![vec![0.25]],
        ..InputParameters::default()
    };
    let json = serde_json::to_string(&params).unwrap();
    let deserialized: InputParameters = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized, params);
}

#[test]
fn unknown_method_is_rejected() {
    let result: Result<InputParameters, _> = serde_json::from_str(r#"{ "method": "runge_kutta" }"#);
    assert!(result.is_err());
}

#[test]
fn term_table_forced_oscillator_matches_reference() {
    let params = forced_oscillator_terms();
    let function = params.build_function().unwrap();
    assert!(function.has_analytic_jacobian());

    let trajectory = integrate(&params, function).unwrap();
    assert_trajectory_matches(&trajectory, FORCED_OSCILLATOR_BACKWARD_EULER, 1e-10);

    let with_closures = integrate(&params, forced_oscillator()).unwrap();
    assert_trajectories_eq(&trajectory, &with_closures, 1e-12);
}

#[test]
fn term_table_without_jacobian_uses_finite_differences() {
    let params = InputParameters {
        jacobian_terms: None,
        ..forced_oscillator_terms()
    };
    let function = params.build_function().unwrap();
    assert!(!function.has_analytic_jacobian());

    let trajectory = integrate(&params, function).unwrap();
    assert_trajectory_matches(&trajectory, FORCED_OSCILLATOR_BACKWARD_EULER, 1e-6);
}

#[test]
fn invalid_terms_are_configuration_errors() {
    let mut params = forced_oscillator_terms();
    params.function_terms = Some(vec![
        vec!["1_9_1".to_string(), "0".to_string(), "0".to_string()],
        vec!["0".to_string(), "0".to_string(), "0".to_string()],
    ]);
    assert!(matches!(
        params.build_function(),
        Err(IntegrationError::Configuration(_))
    ));

    params.function_terms = None;
    assert!(matches!(
        params.build_function(),
        Err(IntegrationError::Configuration(_))
    ));
}

#[test]
fn build_integrator_selects_method() {
    let cases = vec![
        (Method::BackwardEuler, 1, "Backward Euler"),
        (Method::Bdf, 2, "BDF"),
        (Method::AdamsMoulton, 2, "Adams-Moulton"),
    ];
    for (method, num_steps, name) in cases {
        let params = InputParameters {
            method,
            num_steps,
            ..forced_oscillator_terms()
        };
        let integrator = build_integrator(&params, forced_oscillator()).unwrap();
        assert_eq!(integrator.name(), name);
        assert_eq!(integrator.trajectory().len(), 1);
    }
}

#[test]
fn supplied_starting_values_enter_trajectory() {
    let params = InputParameters {
        method: Method::Bdf,
        num_steps: 3,
        starting_values: vec![vec![1.0, -0.1], vec![1.0, -0.2]],
        ..forced_oscillator_terms()
    };
    let integrator = build_integrator(&params, forced_oscillator()).unwrap();
    let trajectory = integrator.trajectory();
    assert_eq!(trajectory.len(), 3);
    assert_scalar_eq!(trajectory.states()[2][1], -0.2);

    let default_policy = StartingValues::default();
    assert_eq!(default_policy, StartingValues::BackwardEuler);
}

#[test]
fn invalid_parameters_are_rejected() {
    let valid = forced_oscillator_terms();
    let invalid = vec![
        InputParameters {
            num_equations: 0,
            ..valid.clone()
        },
        InputParameters {
            initial_condition: vec![1.0],
            ..valid.clone()
        },
        InputParameters {
            step_size: -0.1,
            ..valid.clone()
        },
        InputParameters {
            final_time: -1.0,
            ..valid.clone()
        },
        InputParameters {
            initial_time: f64::INFINITY,
            ..valid.clone()
        },
        InputParameters {
            num_steps: 0,
            ..valid.clone()
        },
        InputParameters {
            method: Method::AdamsMoulton,
            num_steps: 2,
            beta: vec![0.5, 0.5],
            ..valid.clone()
        },
        InputParameters {
            newton: NewtonSettings {
                max_iterations: 0,
                ..NewtonSettings::default()
            },
            ..valid.clone()
        },
    ];

    for params in invalid {
        assert!(
            matches!(params.validate(), Err(IntegrationError::Configuration(_))),
            "parameters should be invalid: {:?}",
            params
        );
        assert!(build_integrator(&params, forced_oscillator()).is_err());
    }
}
