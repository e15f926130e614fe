//! Generator functions for matrices

use nalgebra::{DMatrix, RealField};
use ndarray::*;
use rand::prelude::*;

use super::types::*;

/// Generate random array with given shape
///
/// - This function uses [rand::thread_rng].
///   See [random_using] for using another RNG
pub fn random<A, S, Sh, D>(sh: Sh) -> ArrayBase<S, D>
where
    A: Scalar,
    S: DataOwned<Elem = A>,
    D: Dimension,
    Sh: ShapeBuilder<Dim = D>,
{
    let mut rng = thread_rng();
    random_using(sh, &mut rng)
}

/// Generate random array with given RNG
///
/// - See [random] for using default RNG
pub fn random_using<A, S, Sh, D, R>(sh: Sh, rng: &mut R) -> ArrayBase<S, D>
where
    A: Scalar,
    S: DataOwned<Elem = A>,
    D: Dimension,
    Sh: ShapeBuilder<Dim = D>,
    R: Rng,
{
    ArrayBase::from_shape_fn(sh, |_| A::rand(rng))
}

/// Generate a random `n x p` block with orthonormal columns
///
/// - Be sure that this is **NOT** a uniform distribution.
///   Use it only for test purpose.
/// - This function uses [rand::thread_rng].
///   See [random_orthonormal_using] for using another RNG.
pub fn random_orthonormal<A>(n: usize, p: usize) -> Array2<A>
where
    A: Scalar + RealField,
{
    let mut rng = thread_rng();
    random_orthonormal_using(n, p, &mut rng)
}

/// Generate a random `n x p` block with orthonormal columns with given RNG
///
/// The columns are the thin-QR factor of a random block.
///
/// - See [random_orthonormal] for using default RNG.
pub fn random_orthonormal_using<A, R>(n: usize, p: usize, rng: &mut R) -> Array2<A>
where
    A: Scalar + RealField,
    R: Rng,
{
    assert!(p <= n);
    let a: Array2<A> = random_using((n, p), rng);
    let qr = DMatrix::from_fn(n, p, |i, j| a[(i, j)]).qr();
    let q = qr.q();
    Array2::from_shape_fn((n, p), |(i, j)| q[(i, j)])
}
