//! Crate-level test suites: random containment fuzzing for the interval
//! kernel and ground-truth soundness checks for the validated ODE
//! machinery. Unit tests for individual layers live next to their
//! modules.

mod ode_soundness;
pub(crate) mod problems;
