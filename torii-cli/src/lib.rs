//! Building blocks for the `torii` binary.

pub mod health;
pub mod notify;
pub mod telemetry;
