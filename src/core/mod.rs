//! Core trait plumbing shared by every numeric layer.
//!
//! This module contains the scalar-ring abstractions:
//! - [`Ring`] / [`Field`] - what a user vector field is generic over
//! - [`TaylorRing`] - extra structure required of series coefficients
//! - [`Transcendental`] - enclosed elementary functions

pub(crate) mod traits;

pub use traits::{Field, Ring, TaylorRing, Transcendental};
