//! Basic types and their methods for linear algebra

pub use cauchy::Scalar;
