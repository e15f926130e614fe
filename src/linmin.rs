//! One-dimensional exact line minimization
//!
//! [`linmin`] minimizes a smooth function along a line given its value and
//! derivative at the starting abscissa: it first brackets a sign change of
//! the derivative by scanning downhill, then polishes the root of the
//! derivative with Ridders' method (false position combined with
//! exponential interpolation, quadratically convergent on smooth
//! derivatives).
//!
//! The objective is only ever probed through a caller-supplied closure, so
//! the routine is independent of the block eigensolver that drives it.

use log::{debug, warn};
use num_traits::{Float, NumCast};

use crate::error::*;
use crate::types::*;

const ITMAX: usize = 100;

/// Outcome of a line minimization
#[derive(Debug, Clone, Copy)]
pub struct Linmin<A> {
    /// Minimizing abscissa
    pub x: A,
    /// Function value at `x`
    pub f: A,
    /// Relative decrease `2 (f_start - f) / (|f_start| + |f| + tol)`,
    /// measured from the first probed point
    pub improvement: A,
}

fn relative_improvement<A: Float>(f_start: A, f_final: A, tolerance: A) -> A {
    let two = A::one() + A::one();
    two * (f_start - f_final) / (Float::abs(f_start) + Float::abs(f_final) + tolerance)
}

/// Minimize `f` over the segment from `xmin` towards `xmax`.
///
/// `f_xmin` and `df_xmin` are the value and derivative already known at
/// `xmin`; `x0` is the initial guess, which must lie strictly downhill of
/// `xmin` (`df_xmin * (x0 - xmin) < 0`) and strictly inside the segment.
/// The closure returns `(value, derivative)` at the probed abscissa.
pub fn linmin<A, F>(
    f: &mut F,
    xmin: A,
    f_xmin: A,
    df_xmin: A,
    x0: A,
    xmax: A,
    tolerance: A,
) -> Result<Linmin<A>>
where
    A: Float + Scalar,
    F: FnMut(A) -> Result<(A, A)>,
{
    let zero = A::zero();
    let two = A::one() + A::one();
    let half: A = NumCast::from(0.5).unwrap();

    if df_xmin == zero {
        return Ok(Linmin {
            x: xmin,
            f: f_xmin,
            improvement: zero,
        });
    }
    if df_xmin * (x0 - xmin) >= zero {
        return Err(TraceMinError::bad_input(
            "linmin: initial guess is not downhill from the starting point",
        ));
    }
    if (xmax - xmin) * (x0 - xmin) <= zero || Float::abs(x0 - xmin) >= Float::abs(xmax - xmin) {
        return Err(TraceMinError::bad_input(
            "linmin: initial guess out of bracket range",
        ));
    }

    // Phase 1: expand downhill from x0, tripling the offset from xmin,
    // until the derivative changes sign. Overrunning xmax restarts the
    // scan from a halved x0; a guess indistinguishable from xmin means no
    // bracket exists at this tolerance.
    let mut x0 = x0;
    let mut f_start: Option<A> = None;
    let (xb, fb, dfb) = 'bracket: loop {
        if Float::abs(x0 - xmin) <= tolerance * (Float::abs(x0) + tolerance) || x0 == xmin {
            return Err(TraceMinError::BracketFailure);
        }
        let mut x = x0;
        loop {
            let (fx, dfx) = f(x)?;
            let f_start = *f_start.get_or_insert(fx);
            if dfx * df_xmin < zero {
                break 'bracket (x, fx, dfx);
            }
            if dfx == zero {
                // exactly stationary while still heading downhill
                return Ok(Linmin {
                    x,
                    f: fx,
                    improvement: relative_improvement(f_start, fx, tolerance),
                });
            }
            x = x + two * (x - xmin);
            if (x - xmax) * (xmax - xmin) > zero {
                x0 = half * (x0 + xmin);
                continue 'bracket;
            }
        }
    };
    let f_start = f_start.unwrap();
    let done = |x: A, fx: A| Linmin {
        x,
        f: fx,
        improvement: relative_improvement(f_start, fx, tolerance),
    };

    // Phase 2: Ridders' method on the derivative over the bracket.
    let (mut xl, mut fl, mut dfl, mut xh, mut fh, mut dfh) = if xmin < xb {
        (xmin, f_xmin, df_xmin, xb, fb, dfb)
    } else {
        (xb, fb, dfb, xmin, f_xmin, df_xmin)
    };
    let mut prev = xb;
    let mut prev_f = fb;

    for _ in 0..ITMAX {
        let xm = half * (xl + xh);
        let (fm, dfm) = f(xm)?;
        if dfm == zero {
            return Ok(done(xm, fm));
        }

        // exponential interpolation through (xl, xm, xh)
        let s = Float::sqrt(dfm * dfm - dfl * dfh);
        let sign = if dfl > dfh { A::one() } else { -A::one() };
        let mut x = xm + (xm - xl) * sign * dfm / s;
        if !Float::is_finite(x) || (x - xl) * (x - xh) >= zero {
            // degenerate update, bisect towards the sign change instead
            let opposite = if dfm * dfl < zero { xl } else { xh };
            x = half * (xm + opposite);
        }
        let (fx, dfx) = f(x)?;
        if dfx == zero {
            return Ok(done(x, fx));
        }

        if dfm * dfx < zero {
            // the root crossed between the midpoint and the new point
            if xm < x {
                (xl, fl, dfl) = (xm, fm, dfm);
                (xh, fh, dfh) = (x, fx, dfx);
            } else {
                (xl, fl, dfl) = (x, fx, dfx);
                (xh, fh, dfh) = (xm, fm, dfm);
            }
        } else if dfl * dfx < zero {
            // both probes carry the upper sign, keep the tighter upper end
            if xm < x {
                (xh, fh, dfh) = (xm, fm, dfm);
            } else {
                (xh, fh, dfh) = (x, fx, dfx);
            }
        } else {
            // both probes carry the lower sign, keep the tighter lower end
            if xm > x {
                (xl, fl, dfl) = (xm, fm, dfm);
            } else {
                (xl, fl, dfl) = (x, fx, dfx);
            }
        }

        if dfl == zero {
            return Ok(done(xl, fl));
        }
        if dfh == zero {
            return Ok(done(xh, fh));
        }

        let motion = Float::abs(x - prev);
        let edge = Float::min(Float::abs(x - xl), Float::abs(x - xh));
        if Float::max(motion, edge) < tolerance * (Float::abs(x) + tolerance) {
            return Ok(done(x, fx));
        }
        prev = x;
        prev_f = fx;
    }

    Ok(done(prev, prev_f))
}

/// Clamp a Newton step `-dE/d2E` for the trace line search.
///
/// Indefinite curvature means the quadratic model is centered near a
/// maximum; the step is then replaced by the previous accepted angle taken
/// downhill. Any step reaching `pi` wraps the periodic parametrization and
/// is replaced the same way. A step predicting a much larger decrease than
/// the last iteration actually produced is kept, since the exact search
/// will tame it, but is worth a notice.
pub(crate) fn newton_theta<A: Float + Scalar>(
    de: A,
    d2e: A,
    prev_theta: A,
    energy_change: A,
) -> A {
    let zero = A::zero();
    let two = A::one() + A::one();
    let half: A = NumCast::from(0.5).unwrap();
    let pi: A = NumCast::from(std::f64::consts::PI).unwrap();

    let downhill = if de > zero { -A::one() } else { A::one() };
    let fallback = downhill * Float::abs(prev_theta);

    let mut theta = -de / d2e;
    if d2e < zero {
        debug!("line curvature {} is negative, stepping away from a maximum", d2e);
        theta = fallback;
    } else if -half * de * theta > two * Float::abs(energy_change) {
        warn!(
            "predicted energy decrease {} looks too good, the line search will correct it",
            -half * de * theta
        );
    }
    if !Float::is_finite(theta) || Float::abs(theta) >= pi {
        theta = fallback;
    }
    theta
}
