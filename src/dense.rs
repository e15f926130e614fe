//! Dense `p x p` helpers
//!
//! The solver factorizes nothing larger than a `p x p` Gram or Rayleigh
//! block, so the factorization-backed pieces (Hermitian positive-definite
//! inverse, generalized symmetric eigendecomposition) are delegated to
//! [`nalgebra`]'s pure-Rust `Cholesky` and `SymmetricEigen`.

use nalgebra::{Cholesky, DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, Zip};
use num_traits::{Float, NumCast};

use crate::error::*;
use crate::types::*;

fn to_na<A: Scalar + nalgebra::Scalar>(a: &Array2<A>) -> DMatrix<A> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[(i, j)])
}

/// A <- (A + A^T) / 2
pub fn symmetrize<A: Scalar>(a: &mut Array2<A>) {
    let half: A = NumCast::from(0.5).unwrap();
    let p = a.nrows();
    debug_assert_eq!(p, a.ncols());
    for i in 0..p {
        for j in (i + 1)..p {
            let m = (a[(i, j)] + a[(j, i)]) * half;
            a[(i, j)] = m;
            a[(j, i)] = m;
        }
    }
}

/// tr(A)
pub fn trace<A: Scalar>(a: &Array2<A>) -> A {
    a.diag().iter().fold(A::zero(), |acc, &x| acc + x)
}

/// tr(A^T B)
pub fn trace_at_b<A: Scalar>(a: &Array2<A>, b: &Array2<A>) -> A {
    Zip::from(a)
        .and(b)
        .fold(A::zero(), |acc, &x, &y| acc + x * y)
}

/// In-place inverse of a Hermitian positive-definite matrix via Cholesky
pub fn invh_in_place<A>(a: &mut Array2<A>) -> Result<()>
where
    A: Scalar + nalgebra::RealField,
{
    let chol = Cholesky::new(to_na(a)).ok_or(TraceMinError::NotPositiveDefinite)?;
    let inv = chol.inverse();
    for ((i, j), v) in a.indexed_iter_mut() {
        *v = inv[(i, j)];
    }
    Ok(())
}

/// Generalized symmetric eigenproblem `A V = B V diag(e)` with `B`
/// positive definite, eigenvalues ascending.
///
/// Reduction to a standard problem by the Cholesky factor of `B`,
/// `B = L L^T`, then `L^-1 A L^-T` is handed to `SymmetricEigen` and the
/// eigenvectors are back-substituted through `L^T`. The columns of `V`
/// satisfy `V^T B V = I`.
pub fn eigh_ascending<A>(a: &Array2<A>, b: &Array2<A>) -> Result<(Array1<A>, Array2<A>)>
where
    A: Scalar + nalgebra::RealField,
{
    let p = a.nrows();
    let chol = Cholesky::new(to_na(b)).ok_or(TraceMinError::NotPositiveDefinite)?;
    let l = chol.l();
    let half_reduced = l
        .solve_lower_triangular(&to_na(a))
        .ok_or(TraceMinError::NotPositiveDefinite)?;
    let reduced = l
        .solve_lower_triangular(&half_reduced.transpose())
        .ok_or(TraceMinError::NotPositiveDefinite)?;

    let eig = SymmetricEigen::new(reduced);
    let vecs = l
        .transpose()
        .solve_upper_triangular(&eig.eigenvectors)
        .ok_or(TraceMinError::NotPositiveDefinite)?;

    let mut order: Vec<usize> = (0..p).collect();
    order.sort_by(|&i, &j| {
        eig.eigenvalues[i]
            .partial_cmp(&eig.eigenvalues[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let e = Array1::from_shape_fn(p, |k| eig.eigenvalues[order[k]]);
    let v = Array2::from_shape_fn((p, p), |(i, k)| vecs[(i, order[k])]);
    Ok((e, v))
}

/// Health check applied to every computed trace
pub fn is_bad<A: Float>(x: A) -> bool {
    !Float::is_finite(x)
}
