//! Block-matrix kernels
//!
//! Operations on tall, skinny `n x p` iterate blocks. These are the only
//! routines that touch `O(n p)` data; everything above them works on `p x p`
//! Gram blocks. They are written against preallocated outputs with
//! [`general_mat_mul`] and [`Zip`] so that the solver never allocates block
//! storage of its own.

use ndarray::linalg::general_mat_mul;
use ndarray::{azip, Array2, LinalgScalar, Zip};

/// R <- X^T Y
pub fn xt_y<A: LinalgScalar>(r: &mut Array2<A>, x: &Array2<A>, y: &Array2<A>) {
    general_mat_mul(A::one(), &x.t(), y, A::zero(), r);
}

/// R <- X^T X
pub fn xt_x<A: LinalgScalar>(r: &mut Array2<A>, x: &Array2<A>) {
    general_mat_mul(A::one(), &x.t(), x, A::zero(), r);
}

/// X <- Y S, with S a small `p x p` block
pub fn x_eq_ys<A: LinalgScalar>(x: &mut Array2<A>, y: &Array2<A>, s: &Array2<A>) {
    general_mat_mul(A::one(), y, s, A::zero(), x);
}

/// X <- X + a Y S, with S a small `p x p` block
pub fn x_plus_ays<A: LinalgScalar>(x: &mut Array2<A>, a: A, y: &Array2<A>, s: &Array2<A>) {
    general_mat_mul(a, y, s, A::one(), x);
}

/// X <- a X + b Y
pub fn ax_plus_by<A: LinalgScalar>(a: A, x: &mut Array2<A>, b: A, y: &Array2<A>) {
    azip!((xe in x, &ye in y) *xe = a * *xe + b * ye);
}

/// tr(X^T Y)
pub fn trace_xt_y<A: LinalgScalar>(x: &Array2<A>, y: &Array2<A>) -> A {
    Zip::from(x)
        .and(y)
        .fold(A::zero(), |acc, &xe, &ye| acc + xe * ye)
}

/// Single-pass update used by the Polak-Ribiere direction:
/// `(G, prev_G) <- (G - prev_G, G)` elementwise.
///
/// One traversal, no `n x p` scratch.
pub fn fused_gradient_swap<A: LinalgScalar>(g: &mut Array2<A>, prev_g: &mut Array2<A>) {
    azip!((ge in g, pe in prev_g) {
        let current = *ge;
        *ge = current - *pe;
        *pe = current;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    #[test]
    fn products_match_dot() {
        let x = arr2(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        let y = arr2(&[[0.5, -1.0], [2.0, 0.25], [-0.5, 1.5]]);
        let s = arr2(&[[2.0, 1.0], [0.0, -1.0]]);

        let mut r = Array2::zeros((2, 2));
        xt_y(&mut r, &x, &y);
        assert_abs_diff_eq!(r, x.t().dot(&y), epsilon = 1e-12);

        xt_x(&mut r, &x);
        assert_abs_diff_eq!(r, x.t().dot(&x), epsilon = 1e-12);

        let mut z = Array2::zeros((3, 2));
        x_eq_ys(&mut z, &x, &s);
        assert_abs_diff_eq!(z, x.dot(&s), epsilon = 1e-12);

        x_plus_ays(&mut z, -2.0, &y, &s);
        assert_abs_diff_eq!(z, x.dot(&s) - y.dot(&s) * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn axpby_and_trace() {
        let mut x = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let y = arr2(&[[1.0, 0.0], [0.0, 1.0]]);
        ax_plus_by(2.0, &mut x, -1.0, &y);
        assert_abs_diff_eq!(x, arr2(&[[1.0, 4.0], [6.0, 7.0]]), epsilon = 1e-12);

        let t = trace_xt_y(&x, &y);
        assert_abs_diff_eq!(t, x.t().dot(&y).diag().sum(), epsilon = 1e-12);
    }

    #[test]
    fn fused_swap_is_difference_and_copy() {
        let mut g = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let mut prev = arr2(&[[0.5, 0.5], [0.5, 0.5]]);
        let g0 = g.clone();
        fused_gradient_swap(&mut g, &mut prev);
        assert_abs_diff_eq!(g, &g0 - 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(prev, g0, epsilon = 1e-12);
    }
}
