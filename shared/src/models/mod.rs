//! Domain models for the Alufab back office

mod audit;
mod batch;
mod consumption;
mod stock;

pub use audit::*;
pub use batch::*;
pub use consumption::*;
pub use stock::*;
