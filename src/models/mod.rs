//! Fleet and warehouse domain models.
//!
//! Core data types for the AGV simulation: the warehouse floor plan,
//! pick-and-deliver orders, and the vehicles that execute them.
//!
//! # Domain Mappings
//!
//! | agv-dispatch | Warehouse | Role |
//! |--------------|-----------|------|
//! | `WarehouseLayout` | Floor plan, docks, slot catalog | Read-only geometry |
//! | `Order` | Pick-and-deliver request | Unit of demand |
//! | `Vehicle` | Automated guided vehicle | Unit of supply |

mod order;
mod vehicle;
mod warehouse;

pub use order::{Order, OrderId, OrderPriority, OrderStatus};
pub use vehicle::{Vehicle, VehicleId, VehicleState};
pub use warehouse::{DemandClass, Point, StorageSlot, WarehouseLayout};
