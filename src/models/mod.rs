//! Model-curve evaluation.
//!
//! Curves are built by small, pure functions so the fitters and solvers can stay
//! generic over shapes and escape handling.

pub mod curve;

pub use curve::*;
