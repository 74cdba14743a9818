//! Domain models for the lab-orders system.

mod catalog;
mod input;
mod money;
mod order;
mod patient;

pub use catalog::*;
pub use input::*;
pub use money::*;
pub use order::*;
pub use patient::*;
