use nalgebra::DVector;
use odestep::integrators::{bdf_step, BackwardEuler, Bdf, BdfCoefficients, StartingValues};
use odestep::{
    build_integrator, Function, FunctionError, InputParameters, IntegrationError, Integrator, Method, NewtonError,
    NewtonSettings,
};

use crate::unit_tests::problems::{damped_scalar, forced_oscillator, linear_decay, FORCED_OSCILLATOR_BACKWARD_EULER};
use crate::utils::{assert_trajectories_eq, assert_trajectory_matches};

const DAMPED_SCALAR_BDF2: &[&[f64]] = &[
    &[0.0],
    &[0.1887084750059145],
    &[0.3683873041248288],
    &[0.5350187337363279],
    &[0.686802378259351],
    &[0.823159487732168],
    &[0.944287323454226],
    &[1.0508889398999448],
    &[1.1439766053164664],
    &[1.2247241687255133],
    &[1.294360551469453],
    &[1.3540978506861583],
    &[1.4050867154356828],
    &[1.4483917338565508],
    &[1.4849805687500781],
    &[1.515721959692827],
    &[1.5413890597858462],
    &[1.5626656974074133],
    &[1.58015400005025],
    &[1.5943824154226383],
    &[1.6058135671370324],
];

const DAMPED_SCALAR_BDF3: &[&[f64]] = &[
    &[0.0],
    &[0.1887084750059145],
    &[0.36402855790515004],
    &[0.5287890781049212],
    &[0.6807118466297196],
    &[0.8178160777165732],
    &[0.9395664342342294],
    &[1.046507672054578],
    &[1.1397251160840813],
    &[1.2204968346740483],
    &[1.2901237430847627],
    &[1.3498560914285374],
    &[1.4008615451577802],
    &[1.4442107474933896],
    &[1.4808719843834786],
    &[1.5117118406283059],
    &[1.5374998950436674],
    &[1.5589157979929245],
    &[1.5765574256782193],
    &[1.5909492290035998],
    &[1.602550263327002],
];

fn scalar(value: f64) -> DVector<f64> {
    DVector::from_element(1, value)
}

#[test]
fn one_step_bdf_reproduces_backward_euler() {
    let y0 = DVector::from_vec(vec![1.0, 0.0]);
    let coefficients = BdfCoefficients::new(vec![1.0, 1.0]).unwrap();
    let mut bdf = Bdf::new(coefficients, 0.1, 0.0, 1.0, y0.clone(), forced_oscillator()).unwrap();
    let mut euler = BackwardEuler::new(0.1, 0.0, 1.0, y0, forced_oscillator()).unwrap();

    let bdf_trajectory = bdf.solve().unwrap();
    assert_trajectories_eq(bdf_trajectory, euler.solve().unwrap(), 1e-14);
    assert_trajectory_matches(bdf_trajectory, FORCED_OSCILLATOR_BACKWARD_EULER, 1e-10);
}

#[test]
fn two_step_bdf_with_backward_euler_start() {
    let coefficients = BdfCoefficients::standard(2).unwrap();
    let mut bdf = Bdf::new(coefficients, 0.1, 0.0, 2.0, scalar(0.0), damped_scalar()).unwrap();
    assert_eq!(bdf.starting_values(), &StartingValues::BackwardEuler);
    assert_trajectory_matches(bdf.solve().unwrap(), DAMPED_SCALAR_BDF2, 1e-8);
}

#[test]
fn three_step_bdf_with_supplied_starting_values() {
    // Coefficients in the form 11/6 y^{n+1} - 3 y^n + 3/2 y^{n-1} - 1/3 y^{n-2} = h F
    let coefficients = BdfCoefficients::from_leading_normalized(&[11.0 / 6.0, 3.0, -1.5, 1.0 / 3.0]).unwrap();
    let starting_values = vec![scalar(0.1887084750059145), scalar(0.36402855790515004)];
    let mut bdf = Bdf::new(coefficients, 0.1, 0.0, 2.0, scalar(0.0), damped_scalar())
        .unwrap()
        .with_starting_values(StartingValues::Supplied(starting_values))
        .unwrap();

    // Supplied states are part of the trajectory before the first step
    assert_eq!(bdf.trajectory().len(), 3);
    assert!((bdf.trajectory().times()[2] - 0.2).abs() < 1e-15);
    assert_trajectory_matches(bdf.solve().unwrap(), DAMPED_SCALAR_BDF3, 1e-8);
}

#[test]
fn replicated_history_uses_formula_from_first_step() {
    let h = 0.1;
    let coefficients = BdfCoefficients::standard(2).unwrap();
    let mut bdf = Bdf::new(coefficients, h, 0.0, 0.2, scalar(1.0), linear_decay(-1.0))
        .unwrap()
        .with_starting_values(StartingValues::Replicate)
        .unwrap();
    bdf.advance().unwrap();

    // With y^{-1} = y^0, the first BDF2 step reads y^1 = y^0 - 2/3 h y^1
    let y1 = bdf.trajectory().states()[1][0];
    assert!((y1 - 1.0 / (1.0 + 2.0 * h / 3.0)).abs() < 1e-12);
}

#[test]
fn constant_function_keeps_state_for_every_policy() {
    let y0 = DVector::from_vec(vec![0.5, -1.5]);
    let policies = vec![
        StartingValues::BackwardEuler,
        StartingValues::Replicate,
        StartingValues::Supplied(vec![y0.clone(), y0.clone()]),
    ];

    for policy in policies {
        let function = Function::new(2, |_, y| DVector::zeros(y.len()));
        let mut bdf = Bdf::new(BdfCoefficients::standard(3).unwrap(), 0.1, 0.0, 1.0, y0.clone(), function)
            .unwrap()
            .with_starting_values(policy)
            .unwrap();
        let trajectory = bdf.solve().unwrap();
        assert_eq!(trajectory.len(), 11);
        for state in trajectory.states() {
            assert!((state - &y0).amax() < 1e-14);
        }
    }
}

#[test]
fn truncated_final_step_falls_back_to_backward_euler() {
    let lambda = -2.0;
    let mut bdf = Bdf::new(BdfCoefficients::standard(2).unwrap(), 0.3, 0.0, 1.0, scalar(1.0), linear_decay(lambda)).unwrap();
    let trajectory = bdf.solve().unwrap();

    assert_eq!(trajectory.times().len(), 5);
    assert_eq!(trajectory.times()[4], 1.0);

    let states = trajectory.states();
    let last_step = 1.0 - trajectory.times()[3];
    let expected = states[3][0] / (1.0 - last_step * lambda);
    assert!((states[4][0] - expected).abs() < 1e-12);
}

#[test]
fn second_order_convergence() {
    let exact = (-1.0f64).exp();
    let error = |h: f64| {
        let mut bdf = Bdf::new(BdfCoefficients::standard(2).unwrap(), h, 0.0, 1.0, scalar(1.0), linear_decay(-1.0))
            .unwrap()
            .with_starting_values(StartingValues::Supplied(vec![scalar((-h).exp())]))
            .unwrap();
        (bdf.solve().unwrap().final_state().unwrap()[0] - exact).abs()
    };

    let ratio = error(0.02) / error(0.01);
    assert!(ratio > 3.6 && ratio < 4.4, "ratio {} is not close to 4", ratio);
}

#[test]
fn too_many_starting_values_are_rejected() {
    let bdf = Bdf::new(BdfCoefficients::standard(2).unwrap(), 0.1, 0.0, 1.0, scalar(1.0), linear_decay(-1.0)).unwrap();
    let result = bdf.with_starting_values(StartingValues::Supplied(vec![scalar(0.9), scalar(0.8)]));
    assert!(matches!(result, Err(IntegrationError::Configuration(_))));
}

#[test]
fn coefficient_count_must_match_number_of_steps() {
    let params = InputParameters {
        method: Method::Bdf,
        num_steps: 3,
        alpha: vec![2.0 / 3.0, 4.0 / 3.0, -1.0 / 3.0],
        ..InputParameters::default()
    };
    let result = build_integrator(&params, linear_decay(-1.0));
    assert!(matches!(result, Err(IntegrationError::Configuration(_))));
}

#[test]
fn bdf_step_rejects_incomplete_history() {
    let function = linear_decay(-1.0);
    let coefficients = BdfCoefficients::standard(2).unwrap();
    let settings = NewtonSettings::default();
    let y = scalar(1.0);

    let result = bdf_step(&function, 0.1, 0.1, &coefficients, &[&y], &settings);
    assert_eq!(result, Err(NewtonError::HistoryLength { expected: 2, actual: 1 }));

    let wrong_dimension = DVector::zeros(2);
    let result = bdf_step(&function, 0.1, 0.1, &coefficients, &[&y, &wrong_dimension], &settings);
    assert_eq!(
        result,
        Err(NewtonError::Function(FunctionError::DimensionMismatch { expected: 1, actual: 2 }))
    );
}

#[test]
fn failure_is_tagged_with_step() {
    let function = Function::new(1, |_, y| y.component_mul(y));
    let mut bdf = Bdf::new(BdfCoefficients::standard(2).unwrap(), 0.1, 0.0, 1.0, scalar(1.0), function).unwrap();
    let err = bdf.solve().unwrap_err();
    let step = err.step().unwrap();
    assert_eq!(bdf.trajectory().len(), step);
    assert!(matches!(
        err,
        IntegrationError::ConvergenceFailure { .. } | IntegrationError::SingularJacobian { .. }
    ));
}
