//! Parameter bounds for the least-squares solver.
//!
//! The fitting pipeline only needs box constraints: peak amplitudes are
//! non-negative, peak widths stay within limits and peak centers stay near
//! their guess. They are enforced by projection inside the solver.

pub mod bounds;

pub use bounds::{Bounds, ParameterBounds};
