//! Application layer containing the core business logic orchestration.
//!
//! `booking` and `settlement` are independent request-scoped services; the
//! storage ports are their only shared mutable state. `RentalEngine` wires
//! both together for batch processing.

pub mod availability;
pub mod booking;
pub mod engine;
pub mod pricing;
pub mod settlement;
