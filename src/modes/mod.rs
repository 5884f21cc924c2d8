//! Vehicle adapters and the safety mode registry.
//!
//! An adapter describes one vehicle family: its static tables
//! ([`SafetyConfig`]), where its signals live, how a tracked RX frame turns into
//! a [`StateDelta`], and how a whitelisted TX frame turns into a [`TxCommand`].
//! The engine in [`crate::safety`] does everything else.
use crate::core::{FieldBinding, SafetyConfig};
use crate::error::ConfigError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::safety::gatekeeper::TxCommand;
use crate::safety::limits::SteeringLimits;
use crate::safety::rx_monitor::FrameIntegrity;
use crate::safety::vehicle_state::StateDelta;

pub mod nissan;
pub mod no_output;
pub mod subaru_preglobal;

pub use nissan::Nissan;
pub use no_output::NoOutput;
pub use subaru_preglobal::SubaruPreglobal;

//==================================================================================HOOKS
/// Contract between a vehicle adapter and the safety engine.
///
/// `decode_rx` only ever sees frames that matched the RX check tables and
/// passed their integrity checks; `decode_tx` only sees whitelisted frames.
pub trait SafetyHooks: FrameIntegrity {
    /// Tables of the variant selected at construction.
    fn config(&self) -> SafetyConfig;

    /// Fields read by the decoders, checked against declared lengths at init.
    fn field_bindings(&self) -> &'static [FieldBinding] {
        &[]
    }

    /// Signals carried by a tracked RX frame, `None` when the frame carries
    /// nothing for the active variant on its bus.
    fn decode_rx(&self, frame: &CanFrame) -> Option<StateDelta>;

    /// Command carried by a whitelisted TX frame, `None` when the frame needs
    /// no content check.
    fn decode_tx(&self, frame: &CanFrame) -> Option<TxCommand>;

    fn steering_limits(&self) -> Option<&SteeringLimits> {
        None
    }
}

//==================================================================================ROUTES
/// Dispatch entry: frames with `address` on `bus` carry `signal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Route<S> {
    pub address: u32,
    pub bus: u8,
    pub signal: S,
}

impl<S> Route<S> {
    pub const fn new(address: u32, bus: u8, signal: S) -> Self {
        Self {
            address,
            bus,
            signal,
        }
    }
}

/// Signal routed for `(address, bus)` of `frame`. A frame on any other bus
/// than the one listed has no route, whatever its address.
pub fn find_route<S: Copy>(routes: &[Route<S>], frame: &CanFrame) -> Option<S> {
    let address = frame.address();
    routes
        .iter()
        .find(|route| route.address == address && route.bus == frame.bus)
        .map(|route| route.signal)
}

//==================================================================================REGISTRY
/// Registered safety mode numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum SafetyModeId {
    Nissan = 14,
    NoOutput = 19,
    SubaruPreglobal = 22,
}

impl TryFrom<u16> for SafetyModeId {
    type Error = ConfigError;

    fn try_from(mode: u16) -> Result<Self, Self::Error> {
        match mode {
            14 => Ok(Self::Nissan),
            19 => Ok(Self::NoOutput),
            22 => Ok(Self::SubaruPreglobal),
            _ => Err(ConfigError::UnknownSafetyMode { mode }),
        }
    }
}

impl From<SafetyModeId> for u16 {
    fn from(id: SafetyModeId) -> Self {
        id as u16
    }
}

/// Adapter selected once at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SafetyMode {
    NoOutput(NoOutput),
    Nissan(Nissan),
    SubaruPreglobal(SubaruPreglobal),
}

impl Default for SafetyMode {
    fn default() -> Self {
        Self::NoOutput(NoOutput)
    }
}

impl SafetyMode {
    /// Select the adapter for `mode`, its variant chosen from the family
    /// `param` bitmask and the process-wide `sp_param` selector.
    ///
    /// ```
    /// use korri_safety::modes::{SafetyMode, SafetyModeId};
    ///
    /// let mode = SafetyMode::init(14, 0, 0).unwrap();
    /// assert_eq!(mode.id(), SafetyModeId::Nissan);
    /// assert!(SafetyMode::init(200, 0, 0).is_err());
    /// ```
    pub fn init(mode: u16, param: u16, sp_param: u16) -> Result<Self, ConfigError> {
        let mode = match SafetyModeId::try_from(mode)? {
            SafetyModeId::NoOutput => Self::NoOutput(NoOutput),
            SafetyModeId::Nissan => Self::Nissan(Nissan::new(param, sp_param)),
            SafetyModeId::SubaruPreglobal => Self::SubaruPreglobal(SubaruPreglobal::new(param)),
        };
        #[cfg(feature = "defmt")]
        defmt::info!(
            "Safety mode {} selected (param {=u16:#x}, sp {=u16:#x})",
            mode.id(),
            param,
            sp_param
        );
        Ok(mode)
    }

    pub fn id(&self) -> SafetyModeId {
        match self {
            Self::NoOutput(_) => SafetyModeId::NoOutput,
            Self::Nissan(_) => SafetyModeId::Nissan,
            Self::SubaruPreglobal(_) => SafetyModeId::SubaruPreglobal,
        }
    }

    fn hooks(&self) -> &dyn SafetyHooks {
        match self {
            Self::NoOutput(mode) => mode,
            Self::Nissan(mode) => mode,
            Self::SubaruPreglobal(mode) => mode,
        }
    }
}

impl FrameIntegrity for SafetyMode {
    fn counter(&self, frame: &CanFrame) -> Option<u8> {
        self.hooks().counter(frame)
    }

    fn checksum(&self, frame: &CanFrame) -> Option<(u32, u32)> {
        self.hooks().checksum(frame)
    }

    fn quality_flag(&self, frame: &CanFrame) -> Option<bool> {
        self.hooks().quality_flag(frame)
    }
}

impl SafetyHooks for SafetyMode {
    fn config(&self) -> SafetyConfig {
        self.hooks().config()
    }

    fn field_bindings(&self) -> &'static [FieldBinding] {
        self.hooks().field_bindings()
    }

    fn decode_rx(&self, frame: &CanFrame) -> Option<StateDelta> {
        self.hooks().decode_rx(frame)
    }

    fn decode_tx(&self, frame: &CanFrame) -> Option<TxCommand> {
        self.hooks().decode_tx(frame)
    }

    fn steering_limits(&self) -> Option<&SteeringLimits> {
        self.hooks().steering_limits()
    }
}
