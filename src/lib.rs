//! `korri-safety` library: the command-safety layer sitting between a
//! driver-assistance controller and the vehicle CAN buses, in a `no_std`
//! environment. Every received frame feeds an integrity-checked model of the
//! vehicle; every frame about to be sent is allowed or denied against static
//! whitelists and steering limits. Nothing allocates and every hook runs in
//! bounded time.
#![no_std]
//==================================================================================
/// Static data contract between vehicle adapters and the engine: payloads,
/// field descriptors, RX check tables and TX whitelists.
pub mod core;
/// Configuration, frame construction and TX denial errors.
pub mod error;
/// Bit-level payload codec driven by field descriptors.
pub mod infra;
/// Vehicle adapters and the safety mode registry.
pub mod modes;
/// CAN frame model shared with the bus drivers.
pub mod protocol;
/// Vehicle-agnostic engine: RX integrity, vehicle state, engagement,
/// steering limits, TX gating and relay supervision.
pub mod safety;
//==================================================================================
pub use modes::{SafetyHooks, SafetyMode, SafetyModeId};
pub use protocol::transport::can_frame::CanFrame;
pub use safety::{IntegrityPolicy, SafetyContext, SafetyOptions};
