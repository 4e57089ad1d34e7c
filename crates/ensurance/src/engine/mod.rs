//! Tick-driven evaluation engine
//!
//! Drives the per-objective pipeline once per probe interval:
//! snapshot → evaluate → hysteresis → select → cooldown gate →
//! executor dispatch.

mod r#loop;

pub use r#loop::{EngineConfig, EnsuranceLoop, EnsuranceLoopBuilder};
