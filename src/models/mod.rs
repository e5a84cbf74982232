//! Domain models
//!
//! Pure data plus the invariants each entity enforces on itself.
//! Nothing in here performs I/O.

pub mod exam;
pub mod exercise;
pub mod solution;
pub mod test_case;

pub use exam::*;
pub use exercise::*;
pub use solution::*;
pub use test_case::*;
