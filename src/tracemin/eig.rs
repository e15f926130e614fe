//! Truncated eigenvalue decomposition of dense symmetric problems
//!

use nalgebra::RealField;
use ndarray::linalg::general_mat_mul;
use ndarray::prelude::*;
use ndarray::ScalarOperand;
use num_traits::{Float, NumCast};

use super::solver::{tracemin, Constraint, Preconditioner, TraceMinOptions};
use crate::error::*;
use crate::generate;
use crate::types::*;

/// Smallest-eigenvalue solver for dense symmetric problems
///
/// This struct wraps the trace-minimization driver and provides convenient
/// builder-pattern access to parameters like precision, workspace size and
/// constraint matrix.
///
/// # Example
///
/// ```rust
/// use ndarray::{arr1, Array2};
/// use ndarray_tracemin::TraceMinEig;
///
/// let diag = arr1(&[1., 2., 3., 4., 5.]);
/// let a = Array2::from_diag(&diag);
///
/// let eig = TraceMinEig::new(a).precision(1e-8);
///
/// let res = eig.decompose(3);
/// ```
pub struct TraceMinEig<A: Scalar> {
    problem: Array2<A>,
    preconditioner: Option<Array2<A>>,
    pub constraints: Option<Array2<A>>,
    precision: f32,
    work_blocks: usize,
    options: TraceMinOptions,
}

impl<A: Float + Scalar + ScalarOperand + RealField> TraceMinEig<A> {
    /// Create a new solver for a dense symmetric `problem` matrix
    pub fn new(problem: Array2<A>) -> TraceMinEig<A> {
        TraceMinEig {
            problem,
            preconditioner: None,
            constraints: None,
            precision: 1e-7,
            work_blocks: 4,
            options: TraceMinOptions::default(),
        }
    }

    /// Set the desired fractional precision of the Rayleigh trace
    pub fn precision(mut self, precision: f32) -> Self {
        self.precision = precision;

        self
    }

    /// Set the number of `n x p` work blocks handed to the driver
    ///
    /// Two blocks run preconditioned steepest descent, three enable
    /// conjugate directions and four upgrade them to Polak-Ribiere.
    pub fn work_blocks(mut self, work_blocks: usize) -> Self {
        self.work_blocks = work_blocks;

        self
    }

    /// Construct a solution orthogonal to this subspace
    ///
    /// The columns must be orthonormal; every iterate is re-projected onto
    /// their orthogonal complement. If a number of eigenvectors are
    /// already known, this searches the spectrum above them.
    pub fn orthogonal_to(mut self, constraints: Array2<A>) -> Self {
        self.constraints = Some(constraints);

        self
    }

    /// Apply a preconditioning matrix, approximating the inverse of the
    /// problem
    pub fn precondition_with(mut self, preconditioner: Array2<A>) -> Self {
        self.preconditioner = Some(preconditioner);

        self
    }

    /// Override the driver options
    pub fn options(mut self, options: TraceMinOptions) -> Self {
        self.options = options;

        self
    }

    /// Calculate the `num` smallest eigenvalues and their invariant
    /// subspace, starting from a random block
    pub fn decompose(&self, num: usize) -> Result<(Array1<A>, Array2<A>)> {
        let n = self.problem.nrows();
        let mut y: Array2<A> = generate::random((n, num));
        let mut work: Vec<Array2<A>> = (0..self.work_blocks)
            .map(|_| Array2::zeros((n, num)))
            .collect();

        let problem = &self.problem;
        let op = as_operator::<A, _>(|input, mut output, _first| {
            general_mat_mul(A::one(), problem, &input, A::zero(), &mut output);
        });

        let mut apply_k;
        let precond: Option<&mut Preconditioner<'_, A>> = match self.preconditioner.as_ref() {
            Some(k) => {
                apply_k = as_precond::<A, _>(move |g, mut out, _y, _yty| {
                    general_mat_mul(A::one(), k, &g, A::zero(), &mut out);
                });
                Some(&mut apply_k)
            }
            None => None,
        };

        let mut project;
        let constraint: Option<&mut Constraint<'_, A>> = match self.constraints.as_ref() {
            Some(c) => {
                project = as_constraint::<A, _>(move |mut yv| {
                    let overlap = c.t().dot(&yv);
                    yv -= &c.dot(&overlap);
                });
                Some(&mut project)
            }
            None => None,
        };

        let result = tracemin(
            op,
            &mut y,
            precond,
            constraint,
            &mut work,
            NumCast::from(self.precision).unwrap(),
            &self.options,
        )?;
        Ok((result.eigenvalues, y))
    }
}

// Pin the closures to the higher-ranked signatures the driver expects.
fn as_operator<A, F>(f: F) -> F
where
    F: FnMut(ArrayView2<'_, A>, ArrayViewMut2<'_, A>, bool),
{
    f
}

fn as_precond<A, F>(f: F) -> F
where
    F: FnMut(ArrayView2<'_, A>, ArrayViewMut2<'_, A>, ArrayView2<'_, A>, ArrayView2<'_, A>),
{
    f
}

fn as_constraint<A, F>(f: F) -> F
where
    F: FnMut(ArrayViewMut2<'_, A>),
{
    f
}
