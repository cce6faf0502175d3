// src/dag/mod.rs

//! Task graph.
//!
//! - [`plan`] turns the validated config into an ordered [`BuildPlan`].

pub mod plan;

pub use plan::{BuildPlan, PlannedTask};
