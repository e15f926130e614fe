//! Outer trace-minimization loop
//!
//! [`tracemin`] minimizes `tr((Y^T Y)^-1 Y^T A Y)` over `n x p` blocks `Y`
//! for a Hermitian operator `A`, which at the minimum equals the sum of the
//! `p` smallest eigenvalues of `A` and leaves the columns of `Y` spanning
//! the corresponding invariant subspace. The minimization is a block
//! nonlinear conjugate gradient on the unit-circle parametrization
//! `Y(theta) = cos(theta) Y + (sin(theta)/|D|) D`, with either an exact
//! one-dimensional search or a two-point Newton fit along each direction.
//!
//! The iterate does not need orthonormal columns; the formulation carries
//! `(Y^T Y)^-1` explicitly and only rescales the global column norm once
//! per iteration.

use std::time::Instant;

use log::{debug, info};
use nalgebra::RealField;
use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut2, ScalarOperand};
use num_traits::{Float, NumCast, ToPrimitive};

use super::functional::{derivatives_at_origin, RayleighCurve};
use super::schedule::{KernelTimings, LinminStrategy, StrategySelector};
use crate::dense;
use crate::error::*;
use crate::kernels;
use crate::linmin::{linmin, newton_theta};
use crate::types::*;

/// Hard limit on outer iterations
pub const MAX_ITERATIONS: usize = 10_000;
/// The conjugate direction is forgotten every this many iterations
const CG_RESET_PERIOD: usize = 70;
/// Progress feedback is throttled to one line per this many seconds
const FEEDBACK_INTERVAL: f64 = 4.0;
/// Absolute floor inside the relative convergence test
const CONVERGENCE_EPS: f64 = 1e-7;
/// The Newton probe rejects steps predicting more than this multiple of
/// the previous actual energy change
const NEWTON_TRUST_FACTOR: f64 = 20.0;

/// Knobs of the solver, all off-by-default except the two that guard
/// long-running convergence
#[derive(Debug, Clone)]
pub struct TraceMinOptions {
    /// Emit per-iteration diagnostics instead of throttled progress lines
    pub verbose: bool,
    /// Project the preconditioned gradient back onto the complement of the
    /// iterate, `X <- X - Y (Y^T Y)^-1 Y^T X`
    pub project_preconditioning: bool,
    /// Forget the conjugate direction periodically
    pub reset_cg: bool,
    /// Pin the exact line search
    pub force_exact_linmin: bool,
    /// Pin the Newton-approximated line search
    pub force_approx_linmin: bool,
}

impl Default for TraceMinOptions {
    fn default() -> Self {
        TraceMinOptions {
            verbose: false,
            project_preconditioning: true,
            reset_cg: true,
            force_exact_linmin: false,
            force_approx_linmin: false,
        }
    }
}

/// Preconditioner callback: `(G, X_out, Y, YtY)`, writing `K G` into
/// `X_out`. The iterate and its Gram block are passed for context.
pub type Preconditioner<'a, A> =
    dyn FnMut(ArrayView2<'_, A>, ArrayViewMut2<'_, A>, ArrayView2<'_, A>, ArrayView2<'_, A>) + 'a;

/// Constraint callback: an idempotent in-place projection of the iterate.
pub type Constraint<'a, A> = dyn FnMut(ArrayViewMut2<'_, A>) + 'a;

/// What the solver hands back on success
#[derive(Debug, Clone)]
pub struct TraceMinOutput<A> {
    /// The `p` smallest eigenvalues, ascending, aligned with the columns
    /// of the converged block
    pub eigenvalues: Array1<A>,
    /// Converged Rayleigh trace
    pub trace: A,
    /// Outer iterations spent
    pub iterations: usize,
}

/// Minimize the Rayleigh trace of `op` over the block `y`.
///
/// * `op` applies the Hermitian operator: `(input, output, is_first_call)`.
///   Closures capture whatever scratch they need.
/// * `y` is the initial guess on entry and the converged invariant
///   subspace on exit, columns rotated to eigenvectors of the reduced
///   problem in ascending eigenvalue order.
/// * `precond` optionally applies an approximate inverse of `op` to the
///   gradient; `constraint` optionally re-projects the iterate after every
///   update.
/// * `work` provides the block workspace, borrowed for the duration of the
///   call: `work[0]` is the gradient, `work[1]` the preconditioned
///   gradient. A third block enables conjugate directions
///   (Fletcher-Reeves), a fourth upgrades them to Polak-Ribiere. With only
///   two blocks the method degenerates to preconditioned steepest descent.
/// * `tolerance` is the fractional convergence target on the trace.
pub fn tracemin<A, Op>(
    mut op: Op,
    y: &mut Array2<A>,
    mut precond: Option<&mut Preconditioner<'_, A>>,
    mut constraint: Option<&mut Constraint<'_, A>>,
    work: &mut [Array2<A>],
    tolerance: A,
    options: &TraceMinOptions,
) -> Result<TraceMinOutput<A>>
where
    A: Float + Scalar + ScalarOperand + RealField,
    Op: FnMut(ArrayView2<'_, A>, ArrayViewMut2<'_, A>, bool),
{
    let (n, p) = y.dim();
    if work.len() < 2 {
        return Err(TraceMinError::bad_input(
            "at least two work blocks are required (gradient and preconditioned gradient)",
        ));
    }
    if work.iter().any(|w| w.dim() != (n, p)) {
        return Err(TraceMinError::bad_input(
            "every work block must have the shape of the iterate",
        ));
    }
    let use_cg = work.len() >= 3;
    let use_polak_ribiere = work.len() >= 4;

    let (g, rest) = work.split_first_mut().unwrap();
    let (x, rest) = rest.split_first_mut().unwrap();
    let (mut d, rest) = if use_cg {
        let (d, rest) = rest.split_first_mut().unwrap();
        (Some(d), rest)
    } else {
        (None, rest)
    };
    let mut prev_g = if use_polak_ribiere {
        Some(rest.split_first_mut().unwrap().0)
    } else {
        None
    };
    if let Some(b) = d.as_deref_mut() {
        b.fill(A::zero());
    }
    if let Some(b) = prev_g.as_deref_mut() {
        b.fill(A::zero());
    }

    let zero = A::zero();
    let one = A::one();
    let two = one + one;
    let half: A = NumCast::from(0.5).unwrap();
    let eps: A = NumCast::from(CONVERGENCE_EPS).unwrap();
    let pi: A = NumCast::from(std::f64::consts::PI).unwrap();
    let trust: A = NumCast::from(NEWTON_TRUST_FACTOR).unwrap();
    let p_real: A = NumCast::from(p).unwrap();

    // the only allocations the solver makes are p x p
    let mut yty = Array2::<A>::zeros((p, p));
    let mut u = Array2::<A>::zeros((p, p));
    let mut ytayu = Array2::<A>::zeros((p, p));
    let mut ytay = Array2::<A>::zeros((p, p));
    let mut dtd = Array2::<A>::zeros((p, p));
    let mut dtad = Array2::<A>::zeros((p, p));
    let mut sym_ytd = Array2::<A>::zeros((p, p));
    let mut sym_ytad = Array2::<A>::zeros((p, p));
    let mut s1 = Array2::<A>::zeros((p, p));
    let mut s2 = Array2::<A>::zeros((p, p));
    let mut s3 = Array2::<A>::zeros((p, p));

    let mut prev_energy = zero;
    let mut prev_trace_gt_x = zero;
    let mut prev_theta: A = NumCast::from(0.5).unwrap();
    let mut timings = KernelTimings::default();
    let mut selector = StrategySelector::new(options);
    let mut last_feedback = Instant::now();
    let mut iteration = 0_usize;

    if let Some(c) = constraint.as_mut() {
        c(y.view_mut());
    }

    let final_energy = loop {
        if iteration >= MAX_ITERATIONS {
            return Err(TraceMinError::NonConvergence { iterations: iteration });
        }
        selector.enforce(options);

        timed(&mut timings.gram_self, || kernels::xt_x(&mut yty, y));

        // keep the global column scale bounded
        let norm2 = dense::trace(&yty) / p_real;
        if !(norm2 > zero) || dense::is_bad(norm2) {
            return Err(TraceMinError::bad_input("iterate block has no norm"));
        }
        let inv_norm = Float::recip(Float::sqrt(norm2));
        y.mapv_inplace(|v| v * inv_norm);
        yty.mapv_inplace(|v| v * inv_norm * inv_norm);

        u.assign(&yty);
        dense::invh_in_place(&mut u)?;

        timed(&mut timings.apply_a, || {
            op(y.view(), x.view_mut(), iteration == 0)
        });
        timed(&mut timings.block_scale, || kernels::x_eq_ys(g, x, &u));
        timed(&mut timings.gram, || kernels::xt_y(&mut ytayu, y, g));

        let energy = dense::trace(&ytayu);
        if dense::is_bad(energy) {
            return Err(TraceMinError::Divergence {
                trace: energy.to_f64().unwrap_or(f64::NAN),
            });
        }

        if iteration > 0
            && Float::abs(energy - prev_energy)
                < tolerance * half * (Float::abs(energy) + Float::abs(prev_energy) + eps)
        {
            break energy;
        }

        if options.verbose || last_feedback.elapsed().as_secs_f64() > FEEDBACK_INTERVAL {
            let change = if iteration > 0 {
                let rel = two * (energy - prev_energy)
                    / (Float::abs(energy) + Float::abs(prev_energy) + eps);
                100.0 * rel.to_f64().unwrap_or(f64::NAN)
            } else {
                0.0
            };
            info!(
                "iteration {:4}: trace = {:.16e} ({:.2e}% change)",
                iteration,
                energy.to_f64().unwrap_or(f64::NAN),
                change
            );
            last_feedback = Instant::now();
        }

        // Euclidean gradient of the trace in the non-orthonormal basis:
        // G <- G - Y (U YtAYU)
        kernels::x_eq_ys(&mut s1, &u, &ytayu);
        timed(&mut timings.block_scale, || {
            kernels::x_plus_ays(g, -one, y, &s1)
        });

        match precond.as_mut() {
            Some(k) => timed(&mut timings.apply_k, || {
                k(g.view(), x.view_mut(), y.view(), yty.view())
            }),
            None => {
                timings.apply_k = 0.0;
                x.assign(&*g);
            }
        }

        if options.project_preconditioning {
            timed(&mut timings.gram, || kernels::xt_y(&mut s2, y, x));
            kernels::x_eq_ys(&mut s1, &u, &s2);
            timed(&mut timings.block_scale, || {
                kernels::x_plus_ays(x, -one, y, &s1)
            });
        }

        // conjugate search direction
        let trace_gt_x = kernels::trace_xt_y(g, x);
        if use_cg {
            let gamma_num = if use_polak_ribiere {
                kernels::fused_gradient_swap(g, prev_g.as_deref_mut().unwrap());
                kernels::trace_xt_y(g, x)
            } else {
                trace_gt_x
            };
            let reset = options.reset_cg && (iteration + 1) % CG_RESET_PERIOD == 0;
            let gamma = if prev_trace_gt_x == zero || reset {
                if reset {
                    debug!("forgetting the conjugate direction at iteration {}", iteration);
                }
                zero
            } else {
                gamma_num / prev_trace_gt_x
            };
            kernels::ax_plus_by(gamma, d.as_deref_mut().unwrap(), one, x);
        }

        let mut accepted_theta = None;
        let mut newton_reverted = false;
        // the improvement fed to the scheduler is this iteration's; an
        // iteration that runs no exact search reports none
        let mut improvement = 0.0_f64;

        match selector.current() {
            LinminStrategy::Exact => {
                let dir = d.as_deref().unwrap_or(&*x);
                timed(&mut timings.apply_a, || op(dir.view(), g.view_mut(), false));
                timed(&mut timings.gram_self, || kernels::xt_x(&mut dtd, dir));
                let dnorm2 = dense::trace(&dtd) / p_real;
                if dnorm2 > zero {
                    let d_norm = Float::sqrt(dnorm2);
                    timed(&mut timings.gram, || kernels::xt_y(&mut dtad, dir, g));
                    timed(&mut timings.gram, || kernels::xt_y(&mut sym_ytd, y, dir));
                    dense::symmetrize(&mut sym_ytd);
                    timed(&mut timings.gram, || kernels::xt_y(&mut sym_ytad, y, g));
                    dense::symmetrize(&mut sym_ytad);
                    // YtAYU still holds (Y^T A Y) U, so right-multiplying
                    // by YtY = U^-1 recovers Y^T A Y itself
                    kernels::x_eq_ys(&mut ytay, &ytayu, &yty);

                    let (de, d2e) = derivatives_at_origin(
                        &u, &ytay, &dtd, &dtad, &sym_ytd, &sym_ytad, d_norm,
                    );
                    let theta0 = newton_theta(de, d2e, prev_theta, energy - prev_energy);
                    if de != zero && theta0 != zero && Float::abs(theta0) < pi {
                        let downhill = if de > zero { -one } else { one };
                        let mut curve = RayleighCurve::new(
                            &yty, &dtd, &sym_ytd, &ytay, &dtad, &sym_ytad, d_norm,
                        );
                        let started = Instant::now();
                        let result = linmin(
                            &mut |t| curve.eval(t),
                            zero,
                            energy,
                            de,
                            theta0,
                            downhill * pi,
                            tolerance,
                        )?;
                        timings.linmin = started.elapsed().as_secs_f64();
                        improvement = result.improvement.to_f64().unwrap_or(0.0);

                        let theta = result.x;
                        if theta != zero {
                            let c = Float::cos(theta);
                            let s = Float::sin(theta) / d_norm;
                            kernels::ax_plus_by(c, y, s, dir);
                            accepted_theta = Some(theta);
                        }
                    }
                }
            }
            LinminStrategy::Approx => {
                let dir = d.as_deref().unwrap_or(&*x);
                timed(&mut timings.gram_self, || kernels::xt_x(&mut dtd, dir));
                let dnorm2 = dense::trace(&dtd) / p_real;
                if dnorm2 > zero {
                    let d_norm = Float::sqrt(dnorm2);
                    // after the Polak-Ribiere swap the unmodified gradient
                    // lives in prev_G
                    let slope_source: &Array2<A> = if use_polak_ribiere {
                        prev_g.as_deref().unwrap()
                    } else {
                        &*g
                    };
                    let de = two * kernels::trace_xt_y(slope_source, dir) / d_norm;
                    let probe = if de > zero { -one } else { one } * Float::abs(prev_theta);
                    if de != zero && probe != zero {
                        kernels::ax_plus_by(one, y, probe / d_norm, dir);

                        timed(&mut timings.gram_self, || kernels::xt_x(&mut s2, y));
                        s3.assign(&s2);
                        dense::invh_in_place(&mut s3)?;
                        timed(&mut timings.apply_a, || op(y.view(), g.view_mut(), false));
                        timed(&mut timings.gram, || kernels::xt_y(&mut s1, y, g));
                        let probed_energy = dense::trace_at_b(&s1, &s3);
                        if dense::is_bad(probed_energy) {
                            return Err(TraceMinError::Divergence {
                                trace: probed_energy.to_f64().unwrap_or(f64::NAN),
                            });
                        }

                        // two-point quadratic fit along the direction
                        let d2e =
                            (probed_energy - energy - de * probe) / (half * probe * probe);
                        let theta = -de / d2e;
                        if d2e < zero
                            || !Float::is_finite(theta)
                            || -half * de * theta > trust * Float::abs(energy - prev_energy)
                        {
                            // fit unreliable: undo the probe and let the
                            // exact search take the next iteration
                            kernels::ax_plus_by(one, y, -probe / d_norm, dir);
                            selector.revert_to_exact(options);
                            newton_reverted = true;
                        } else {
                            kernels::ax_plus_by(one, y, (theta - probe) / d_norm, dir);
                            accepted_theta = Some(theta);
                        }
                    }
                }
            }
        }

        if let Some(c) = constraint.as_mut() {
            c(y.view_mut());
        }

        prev_trace_gt_x = trace_gt_x;
        if let Some(theta) = accepted_theta {
            prev_theta = theta;
        }
        if !newton_reverted {
            prev_energy = energy;
        }

        selector.consider_switch(improvement, &timings, options);
        iteration += 1;
    };

    let eigenvalues = resolve_eigenvalues(&mut op, y, x, g, &mut ytay, &mut yty)?;

    Ok(TraceMinOutput {
        eigenvalues,
        trace: final_energy,
        iterations: iteration,
    })
}

/// Resolve eigenvalues from a converged invariant subspace.
///
/// Recomputes the reduced Rayleigh and Gram blocks, diagonalizes the
/// generalized `p x p` problem, rotates the block into its eigenbasis and
/// returns the eigenvalues ascending, aligned with the rotated columns.
fn resolve_eigenvalues<A, Op>(
    op: &mut Op,
    y: &mut Array2<A>,
    x: &mut Array2<A>,
    g: &mut Array2<A>,
    ytay: &mut Array2<A>,
    yty: &mut Array2<A>,
) -> Result<Array1<A>>
where
    A: Scalar + RealField,
    Op: FnMut(ArrayView2<'_, A>, ArrayViewMut2<'_, A>, bool),
{
    op(y.view(), x.view_mut(), false);
    kernels::xt_y(ytay, y, x);
    dense::symmetrize(ytay);
    kernels::xt_x(yty, y);
    let (eigenvalues, rotation) = dense::eigh_ascending(ytay, yty)?;
    kernels::x_eq_ys(g, y, &rotation);
    y.assign(&*g);
    Ok(eigenvalues)
}

fn timed<T>(slot: &mut f64, body: impl FnOnce() -> T) -> T {
    let started = Instant::now();
    let out = body();
    *slot = started.elapsed().as_secs_f64();
    out
}
