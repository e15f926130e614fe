//! The `ndarray-tracemin` crate finds the smallest eigenvalues and invariant
//! subspaces of large Hermitian operators by minimizing the Rayleigh trace
//! `tr((Y^T Y)^-1 Y^T A Y)` over tall `n x p` blocks `Y` stored as
//! [`ndarray`](https://github.com/rust-ndarray/ndarray) arrays.
//!
//! The minimization is a block nonlinear conjugate gradient
//! (Fletcher-Reeves or Polak-Ribiere, chosen by workspace size) with an
//! exact line search along a unit-circle curve through the iterate, a
//! cheaper two-point Newton line search, and a timing-driven scheduler that
//! picks between the two at run time.
//!
//! Solver surfaces
//! -----------------------
//! - [tracemin](tracemin/fn.tracemin.html): the raw matrix-free driver. The
//!   operator, preconditioner and constraint enter as callbacks and the
//!   block workspace is borrowed from the caller.
//! - [TraceMinEig](tracemin/struct.TraceMinEig.html): a builder around the
//!   driver for dense symmetric problems.
//!
//! Supporting modules
//! -----------------------
//! - [kernels](kernels/index.html): the `n x p` block products everything
//!   is built from.
//! - [dense](dense/index.html): `p x p` helpers, including the
//!   Cholesky-based Hermitian inverse and the generalized symmetric
//!   eigendecomposition used to resolve the final eigenvalues.
//! - [linmin](linmin/index.html): bracketing plus Ridders' root finding on
//!   the directional derivative.
//! - [generate](generate/index.html): random matrix generators for tests
//!   and initial guesses.

#![allow(clippy::many_single_char_names)]
#![deny(rustdoc::broken_intra_doc_links, rustdoc::private_intra_doc_links)]

pub mod dense;
pub mod error;
pub mod generate;
pub mod kernels;
pub mod linmin;
pub mod tracemin;
pub mod types;

pub use crate::error::*;
pub use crate::linmin::{linmin, Linmin};
pub use crate::tracemin::{
    tracemin, Constraint, Preconditioner, TraceMinEig, TraceMinOptions, TraceMinOutput,
    MAX_ITERATIONS,
};
pub use crate::types::*;
