//! Trace minimization with block preconditioned conjugate gradients
//!
//! This module finds the `p` smallest eigenvalues and the corresponding
//! invariant subspace of a large Hermitian operator `A` by minimizing the
//! Rayleigh trace
//! ```text
//! tr( (Y^T Y)^-1  Y^T A Y )
//! ```
//! over `n x p` blocks `Y`, whose minimum is the sum of the `p` smallest
//! eigenvalues. It has the following properties:
//! * matrix free: the operator enters only through block products `A Y`.
//! * block iteration: one operator application serves all `p` vectors.
//! * preconditioned: an approximate inverse of `A` accelerates convergence
//!   when available, and the iterate is never required to have orthonormal
//!   columns.
//!
//! [`tracemin`] is the raw driver working on caller-provided workspace;
//! [`TraceMinEig`] wraps it in a builder for dense problems.

mod eig;
mod functional;
mod schedule;
mod solver;

pub use eig::TraceMinEig;
pub use solver::{
    tracemin, Constraint, Preconditioner, TraceMinOptions, TraceMinOutput, MAX_ITERATIONS,
};
