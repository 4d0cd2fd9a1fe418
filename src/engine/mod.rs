//! Time-stepped simulation of the AGV fleet.
//!
//! The engine advances a [`SimulationState`] tick by tick: it pulls
//! arriving orders from its [`OrderSource`](crate::generator::OrderSource),
//! dispatches pending work, moves vehicles, resolves spatial conflicts on
//! the [`OccupancyGrid`], commits task completions, and rolls the results
//! up into per-tick KPI snapshots.
//!
//! Execution is single-threaded and synchronous; a state is never mutated
//! concurrently. Independent clones of a state can be simulated in
//! parallel by separate engines, which is what the optimizer exploits.

mod collision;
mod simulation;
mod state;

pub use collision::OccupancyGrid;
pub use simulation::SimulationEngine;
pub use state::SimulationState;
