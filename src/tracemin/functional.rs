//! Rayleigh trace along the line-search curve
//!
//! The exact line search moves the iterate along
//! `Y(theta) = cos(theta) Y + (sin(theta) / |D|) D`, where `|D|` is the
//! column-averaged Frobenius norm of the direction block. Everything the
//! trace `tr(Y^T A Y (Y^T Y)^-1)` does along that curve is a combination of
//! six `p x p` blocks precomputed by the driver, so evaluating the
//! functional and its derivative costs only small dense arithmetic and one
//! Cholesky per probe.

use ndarray::linalg::general_mat_mul;
use ndarray::{azip, Array2};
use num_traits::{Float, NumCast};

use crate::dense;
use crate::error::*;
use crate::types::*;

/// Precomputed curve data for one exact line search.
///
/// Holds the Gram and Rayleigh blocks of the current iterate `Y` and
/// direction `D`, plus three scratch blocks reused by every probe.
pub(crate) struct RayleighCurve<'a, A> {
    yty: &'a Array2<A>,
    dtd: &'a Array2<A>,
    sym_ytd: &'a Array2<A>,
    ytay: &'a Array2<A>,
    dtad: &'a Array2<A>,
    sym_ytad: &'a Array2<A>,
    d_norm: A,
    m1: Array2<A>,
    m2: Array2<A>,
    m3: Array2<A>,
}

impl<'a, A> RayleighCurve<'a, A>
where
    A: Float + Scalar + nalgebra::RealField,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        yty: &'a Array2<A>,
        dtd: &'a Array2<A>,
        sym_ytd: &'a Array2<A>,
        ytay: &'a Array2<A>,
        dtad: &'a Array2<A>,
        sym_ytad: &'a Array2<A>,
        d_norm: A,
    ) -> Self {
        let p = yty.nrows();
        RayleighCurve {
            yty,
            dtd,
            sym_ytd,
            ytay,
            dtad,
            sym_ytad,
            d_norm,
            m1: Array2::zeros((p, p)),
            m2: Array2::zeros((p, p)),
            m3: Array2::zeros((p, p)),
        }
    }

    /// Trace and its derivative at the angle `theta`
    pub fn eval(&mut self, theta: A) -> Result<(A, A)> {
        let two = A::one() + A::one();
        let half: A = NumCast::from(0.5).unwrap();
        let inv_d = Float::recip(self.d_norm);
        let inv_d2 = inv_d * inv_d;

        let c = Float::cos(theta);
        let s = Float::sin(theta) * inv_d;
        let cc = c * c;
        let ss = s * s;
        let cs2 = two * c * s;

        // M1 = Y(theta)^T Y(theta), M2 = Y(theta)^T A Y(theta)
        azip!((m in &mut self.m1, &g in self.yty, &d in self.dtd, &x in self.sym_ytd)
            *m = cc * g + ss * d + cs2 * x);
        azip!((m in &mut self.m2, &g in self.ytay, &d in self.dtad, &x in self.sym_ytad)
            *m = cc * g + ss * d + cs2 * x);

        dense::invh_in_place(&mut self.m1)?;
        let f = dense::trace_at_b(&self.m2, &self.m1);

        // M3 = d(M2)/d(theta) / 2, traced against M1^-1
        let c2 = Float::cos(theta + theta);
        let s2 = Float::sin(theta + theta);
        azip!((m in &mut self.m3, &g in self.ytay, &d in self.dtad, &x in self.sym_ytad)
            *m = -half * s2 * (g - d * inv_d2) + c2 * inv_d * x);
        let term1 = dense::trace_at_b(&self.m1, &self.m3);

        // M2 <- M1^-1 M2 M1^-1, then trace against d(M1)/d(theta) / 2
        general_mat_mul(A::one(), &self.m1, &self.m2, A::zero(), &mut self.m3);
        general_mat_mul(A::one(), &self.m3, &self.m1, A::zero(), &mut self.m2);
        azip!((m in &mut self.m3, &g in self.yty, &d in self.dtd, &x in self.sym_ytd)
            *m = -half * s2 * (g - d * inv_d2) + c2 * inv_d * x);
        let term2 = dense::trace_at_b(&self.m2, &self.m3);

        Ok((f, two * (term1 - term2)))
    }
}

/// First and second derivative of the trace at `theta = 0`.
///
/// `u` must hold `(Y^T Y)^-1` for the same iterate the curve blocks were
/// built from. The sign and the `2 / |D|^2` factor of the curvature are
/// what the Newton guess `-dE/d2E` relies on.
#[allow(clippy::too_many_arguments)]
pub(crate) fn derivatives_at_origin<A>(
    u: &Array2<A>,
    ytay: &Array2<A>,
    dtd: &Array2<A>,
    dtad: &Array2<A>,
    sym_ytd: &Array2<A>,
    sym_ytad: &Array2<A>,
    d_norm: A,
) -> (A, A)
where
    A: Float + Scalar,
{
    let two = A::one() + A::one();
    let four = two + two;
    let inv_d2 = Float::recip(d_norm * d_norm);

    let uau = u.dot(ytay).dot(u);
    let de = two * (dense::trace_at_b(u, sym_ytad) - dense::trace_at_b(&uau, sym_ytd))
        / d_norm;

    let usu = u.dot(sym_ytd).dot(u);
    let su = sym_ytd.dot(u);
    let ususu = usu.dot(&su);
    let udu = u.dot(dtd).dot(u);
    let d2e = two
        * inv_d2
        * (dense::trace_at_b(dtad, u) - dense::trace_at_b(ytay, &udu)
            - four * dense::trace_at_b(sym_ytad, &usu)
            + four * dense::trace_at_b(ytay, &ususu));

    (de, d2e)
}
