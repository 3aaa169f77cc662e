//! Domain models for the refill system.

mod fill;
mod identity;
mod inventory;
mod prescription;
mod refill;
mod tracking;

pub use fill::*;
pub use identity::*;
pub use inventory::*;
pub use prescription::*;
pub use refill::*;
pub use tracking::*;
