//! Variable Neighborhood Search (VNS) optimization of fleet assignments.
//!
//! Searches order→vehicle assignments and per-vehicle visiting sequences,
//! using bounded-horizon simulation plus KPI scoring as the evaluation
//! oracle.
//!
//! # Submodules
//!
//! - [`operators`]: pure route-surgery operators (swap, remove, 2-opt)
//!
//! # Reference
//! - Mladenović & Hansen (1997), "Variable Neighborhood Search"
//! - Hansen et al. (2010), "Variable Neighborhood Search: Methods and
//!   Applications"

pub mod operators;
mod optimizer;
mod solution;

pub use optimizer::{VnsConfig, VnsOptimizer};
pub use solution::{Routes, VnsSolution};
