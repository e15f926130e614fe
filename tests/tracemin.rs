use approx::assert_abs_diff_eq;
use ndarray::{arr2, Array1, Array2, ArrayView2, ArrayViewMut2};
use ndarray_tracemin::generate;
use ndarray_tracemin::{tracemin, TraceMinError, TraceMinOptions};
use rand::SeedableRng;
use rand_pcg::Pcg64;

fn diag(values: &[f64]) -> Array2<f64> {
    Array2::from_diag(&Array1::from(values.to_vec()))
}

fn dense_op(a: Array2<f64>) -> impl FnMut(ArrayView2<'_, f64>, ArrayViewMut2<'_, f64>, bool) {
    move |input, mut output, _first| output.assign(&a.dot(&input))
}

fn blocks(n: usize, p: usize, count: usize) -> Vec<Array2<f64>> {
    (0..count).map(|_| Array2::zeros((n, p))).collect()
}

// Pin closures to higher-ranked signatures so they coerce to the driver's
// callback trait objects.
fn precond_fn<F>(f: F) -> F
where
    F: FnMut(
        ArrayView2<'_, f64>,
        ArrayViewMut2<'_, f64>,
        ArrayView2<'_, f64>,
        ArrayView2<'_, f64>,
    ),
{
    f
}

fn constraint_fn<F>(f: F) -> F
where
    F: FnMut(ArrayViewMut2<'_, f64>),
{
    f
}

fn exact_only() -> TraceMinOptions {
    TraceMinOptions {
        force_exact_linmin: true,
        ..Default::default()
    }
}

#[test]
fn diagonal_p1() {
    let a = diag(&[1., 2., 3., 4., 5., 6., 7., 8.]);
    let mut y = Array2::from_elem((8, 1), 1.0 / 8f64.sqrt());
    let mut work = blocks(8, 1, 4);
    let mut identity = precond_fn(|g, mut x, _y, _yty| x.assign(&g));

    let out = tracemin(
        dense_op(a),
        &mut y,
        Some(&mut identity),
        None,
        &mut work,
        1e-10,
        &exact_only(),
    )
    .unwrap();

    assert!((out.trace - 1.0).abs() < 1e-8, "trace = {}", out.trace);
    assert!(out.iterations <= 40, "took {} iterations", out.iterations);
    assert_abs_diff_eq!(out.eigenvalues[0], 1.0, epsilon = 1e-7);
}

#[test]
fn diagonal_p3_sorted_eigenvalues() {
    let a = diag(&(1..=16).map(|i| i as f64).collect::<Vec<_>>());
    let mut rng = Pcg64::seed_from_u64(2);
    let mut y = generate::random_orthonormal_using(16, 3, &mut rng);
    let mut work = blocks(16, 3, 4);

    let out = tracemin(
        dense_op(a),
        &mut y,
        None,
        None,
        &mut work,
        1e-10,
        &exact_only(),
    )
    .unwrap();

    assert_abs_diff_eq!(out.trace, 6.0, epsilon = 6.0 * 1e-7);
    assert_abs_diff_eq!(out.eigenvalues, Array1::from(vec![1., 2., 3.]), epsilon = 1e-5);
    assert!(out.eigenvalues[0] <= out.eigenvalues[1]);
    assert!(out.eigenvalues[1] <= out.eigenvalues[2]);
}

#[test]
fn dense_spd_p2() {
    let n = 32;
    let mut rng = Pcg64::seed_from_u64(3);
    let h: Array2<f64> = generate::random_orthonormal_using(n, n, &mut rng);
    let lambda = diag(&(1..=n).map(|i| i as f64).collect::<Vec<_>>());
    let a = h.t().dot(&lambda).dot(&h);

    let mut y = generate::random_orthonormal_using(n, 2, &mut rng);
    let mut work = blocks(n, 2, 4);
    let out = tracemin(
        dense_op(a),
        &mut y,
        None,
        None,
        &mut work,
        1e-10,
        &exact_only(),
    )
    .unwrap();

    assert_abs_diff_eq!(out.trace, 3.0, epsilon = 3.0 * 1e-7);
    assert_abs_diff_eq!(out.eigenvalues[0], 1.0, epsilon = 1e-5);
    assert_abs_diff_eq!(out.eigenvalues[1], 2.0, epsilon = 1e-5);
}

#[test]
fn conjugate_directions_beat_steepest_descent_when_ill_conditioned() {
    let delta = 1e-6;
    let spectrum = [1.0, 1.0 + delta, 100., 300., 1000., 3000., 6000., 10000.];
    let a = diag(&spectrum);
    let mut rng = Pcg64::seed_from_u64(4);
    let y0: Array2<f64> = generate::random_orthonormal_using(8, 2, &mut rng);

    let mut y_cg = y0.clone();
    let mut work = blocks(8, 2, 4);
    let cg = tracemin(
        dense_op(a.clone()),
        &mut y_cg,
        None,
        None,
        &mut work,
        1e-9,
        &exact_only(),
    )
    .unwrap();

    let mut y_sd = y0;
    let mut work = blocks(8, 2, 2);
    let sd = tracemin(
        dense_op(a),
        &mut y_sd,
        None,
        None,
        &mut work,
        1e-9,
        &exact_only(),
    )
    .unwrap();

    let expect = 2.0 + delta;
    assert_abs_diff_eq!(cg.trace, expect, epsilon = 1e-6);
    assert_abs_diff_eq!(sd.trace, expect, epsilon = 1e-6);
    assert!(
        sd.iterations >= 5 * cg.iterations,
        "steepest descent took {} iterations, conjugate gradient {}",
        sd.iterations,
        cg.iterations
    );
}

#[test]
fn forced_approximate_line_search_still_converges() {
    let a = diag(&(1..=16).map(|i| i as f64).collect::<Vec<_>>());
    let mut rng = Pcg64::seed_from_u64(5);
    let mut y = generate::random_orthonormal_using(16, 3, &mut rng);
    let mut work = blocks(16, 3, 4);
    let options = TraceMinOptions {
        force_approx_linmin: true,
        ..Default::default()
    };

    let out = tracemin(dense_op(a), &mut y, None, None, &mut work, 1e-9, &options).unwrap();

    assert_abs_diff_eq!(out.trace, 6.0, epsilon = 6.0 * 1e-6);
    assert_abs_diff_eq!(out.eigenvalues, Array1::from(vec![1., 2., 3.]), epsilon = 1e-4);
}

#[test]
fn adaptive_scheduling_still_converges() {
    let a = diag(&(1..=16).map(|i| i as f64).collect::<Vec<_>>());
    let mut rng = Pcg64::seed_from_u64(6);
    let mut y = generate::random_orthonormal_using(16, 3, &mut rng);
    let mut work = blocks(16, 3, 4);

    let out = tracemin(
        dense_op(a),
        &mut y,
        None,
        None,
        &mut work,
        1e-9,
        &TraceMinOptions::default(),
    )
    .unwrap();

    assert_abs_diff_eq!(out.trace, 6.0, epsilon = 6.0 * 1e-6);
}

#[test]
fn constraint_restricts_the_reachable_spectrum() {
    let a = diag(&[1., 2., 3., 4., 5., 6., 7., 8.]);
    let mut y = Array2::from_elem((8, 1), 1.0 / 8f64.sqrt());
    let mut work = blocks(8, 1, 4);
    let mut zero_first = constraint_fn(|mut yv| yv.row_mut(0).fill(0.0));

    let out = tracemin(
        dense_op(a),
        &mut y,
        None,
        Some(&mut zero_first),
        &mut work,
        1e-10,
        &TraceMinOptions::default(),
    )
    .unwrap();

    // the lowest eigenvalue is unreachable under the constraint
    assert_abs_diff_eq!(out.trace, 2.0, epsilon = 2.0 * 1e-8);
    assert_abs_diff_eq!(out.eigenvalues[0], 2.0, epsilon = 1e-6);
    assert!(y[(0, 0)].abs() < 1e-8, "constraint violated: {}", y[(0, 0)]);
}

#[test]
fn converged_trace_is_invariant_to_column_rotation() {
    let a = diag(&(1..=16).map(|i| i as f64).collect::<Vec<_>>());
    let mut rng = Pcg64::seed_from_u64(7);
    let y0: Array2<f64> = generate::random_orthonormal_using(16, 3, &mut rng);
    let q = arr2(&[[2., 1., 0.], [0., 1., 3.], [1., 0., 1.]]);

    let mut y_plain = y0.clone();
    let mut work = blocks(16, 3, 4);
    let plain = tracemin(
        dense_op(a.clone()),
        &mut y_plain,
        None,
        None,
        &mut work,
        1e-10,
        &exact_only(),
    )
    .unwrap();

    let mut y_rotated = y0.dot(&q);
    let mut work = blocks(16, 3, 4);
    let rotated = tracemin(
        dense_op(a),
        &mut y_rotated,
        None,
        None,
        &mut work,
        1e-10,
        &exact_only(),
    )
    .unwrap();

    assert_abs_diff_eq!(plain.trace, rotated.trace, epsilon = 6.0 * 1e-7);
}

#[test]
fn steepest_descent_alone_converges() {
    let a = diag(&[1., 2., 3., 4., 5., 6., 7., 8.]);
    let mut y = Array2::from_elem((8, 1), 1.0 / 8f64.sqrt());
    let mut work = blocks(8, 1, 2);

    let out = tracemin(
        dense_op(a),
        &mut y,
        None,
        None,
        &mut work,
        1e-9,
        &exact_only(),
    )
    .unwrap();

    assert_abs_diff_eq!(out.trace, 1.0, epsilon = 1e-6);
}

#[test]
fn identical_inputs_reproduce_identical_runs() {
    let a = diag(&(1..=16).map(|i| i as f64).collect::<Vec<_>>());
    let mut rng = Pcg64::seed_from_u64(8);
    let y0: Array2<f64> = generate::random_orthonormal_using(16, 3, &mut rng);

    let mut run = || {
        let mut y = y0.clone();
        let mut work = blocks(16, 3, 4);
        tracemin(
            dense_op(a.clone()),
            &mut y,
            None,
            None,
            &mut work,
            1e-10,
            &exact_only(),
        )
        .unwrap()
    };

    let first = run();
    let second = run();
    assert_eq!(first.iterations, second.iterations);
    assert_eq!(first.trace.to_bits(), second.trace.to_bits());
}

#[test]
fn impossible_tolerance_exhausts_the_iteration_limit() {
    let a = diag(&[1., 2.]);
    let mut y = arr2(&[[0.8], [0.6]]);
    let mut work = blocks(2, 1, 4);

    let r = tracemin(
        dense_op(a),
        &mut y,
        None,
        None,
        &mut work,
        0.0,
        &exact_only(),
    );
    assert!(matches!(
        r,
        Err(TraceMinError::NonConvergence { iterations: _ })
    ));
}
