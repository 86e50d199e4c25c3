//! Reduction engine: device strategies, their pass plans, and host paths.

pub mod cpu;
mod engine;
mod strategy;

pub use engine::{DeviceReduction, PING, PONG, enqueue_reduction, reduce_on_device};
pub use strategy::{ReductionPass, ReductionPlan, ReductionState, ReductionStrategy, Slot};
