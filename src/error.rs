//! Error definitions shared across library modules.
//! Configuration problems surface once, at initialization; per-frame traffic
//! never errors and only yields allow/deny decisions ([`TxDenial`]).
use thiserror_no_std::Error;

//==================================================================================FRAME_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur while building a [`CanFrame`](crate::protocol::transport::can_frame::CanFrame).
pub enum FrameError {
    /// Classic CAN carries at most eight payload bytes.
    #[error("Payload too long: {len} bytes")]
    PayloadTooLong { len: usize },
    /// Address does not fit in a 29-bit identifier.
    #[error("Invalid CAN address {address:#x}")]
    InvalidAddress { address: u32 },
}

//==================================================================================CONFIG_ERROR
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Errors raised while selecting or validating a safety configuration.
pub enum ConfigError {
    /// No safety mode is registered under this number.
    #[error("Unknown safety mode {mode}")]
    UnknownSafetyMode { mode: u16 },
    /// The RX monitor has a fixed number of status slots.
    #[error("Too many RX check sets: {count} (max {max})")]
    TooManyRxChecks { count: usize, max: usize },
    /// An RX check set must declare at least one message.
    #[error("RX check set {index} has no message")]
    EmptyRxCheckSet { index: usize },
    /// A monitored message must have a non-zero cadence.
    #[error("Zero frequency declared for message {address:#x}")]
    InvalidFrequency { address: u32 },
    /// A field read by the adapter does not fit in the declared message length.
    #[error("Field of message {address:#x} needs {needed} bytes, table declares {declared}")]
    FieldOutOfBounds { address: u32, needed: u8, declared: u8 },
}

//==================================================================================TX_DENIAL
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Reason an outbound frame was blocked.
pub enum TxDenial {
    /// (address, bus, length) is not in the active whitelist.
    #[error("Frame not whitelisted")]
    NotWhitelisted,
    /// The harness relay lets the stock ECU through; nothing may be sent.
    #[error("Relay malfunction")]
    RelayMalfunction,
    /// Steering command rejected by the limit enforcer.
    #[error("Steering violation: {0:?}")]
    Steering(SteeringViolation),
    /// A button other than the permitted subset is pressed.
    #[error("Button not allowed: {pressed:#x}")]
    ButtonNotAllowed { pressed: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// First limit a steering command broke.
pub enum SteeringViolation {
    /// Magnitude above the static maximum.
    MaxExceeded,
    /// Step from the previous command above the (speed dependent) rate.
    RateExceeded,
    /// Step from the real-time reference above `max_rt_delta`.
    RealTimeDeltaExceeded,
    /// Steering requested while controls are not allowed.
    NotAllowed,
    /// Non-neutral command without an active steer request.
    InactiveCommand,
}
