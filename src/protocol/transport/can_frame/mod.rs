//! In-memory representation of one CAN frame as seen by the safety layer:
//! the bus it travels on, its identifier, and the fixed eight-byte payload.
use embedded_can::{ExtendedId, Id, StandardId};

use crate::core::{Payload, CAN_PAYLOAD_LEN};
use crate::error::FrameError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Immutable view of one CAN message.
pub struct CanFrame {
    /// Bus index on the gateway (0 = vehicle, 1 = secondary, 2 = camera side…).
    pub bus: u8,
    /// Standard (11-bit) or extended (29-bit) identifier.
    pub id: Id,
    /// Payload buffer. Classic CAN frames always provide eight bytes.
    pub data: Payload,
    /// Number of valid payload bytes (Data Length Code, 0 to 8). Only the
    /// constructors set it, read it through `Frame::dlc`.
    len: usize,
}

impl CanFrame {
    /// Build a frame from a raw address. Addresses up to `0x7FF` become standard
    /// identifiers, larger ones extended identifiers.
    pub fn on_bus(bus: u8, address: u32, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > CAN_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong { len: data.len() });
        }
        Ok(Self {
            bus,
            id: id_from_address(address)?,
            data: Payload::from_slice(data),
            len: data.len(),
        })
    }

    /// Same frame, seen on another bus.
    pub fn with_bus(self, bus: u8) -> Self {
        Self { bus, ..self }
    }

    /// Identifier as a plain integer, standard and extended alike.
    #[inline]
    pub fn address(&self) -> u32 {
        match self.id {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        }
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.data
    }
}

/// Standard identifier when it fits in 11 bits, extended otherwise.
pub fn id_from_address(address: u32) -> Result<Id, FrameError> {
    if let Some(id) = u16::try_from(address).ok().and_then(StandardId::new) {
        return Ok(Id::Standard(id));
    }
    ExtendedId::new(address)
        .map(Id::Extended)
        .ok_or(FrameError::InvalidAddress { address })
}

impl embedded_can::Frame for CanFrame {
    /// Driver-facing constructor; the frame is attributed to bus 0 until
    /// re-tagged with [`CanFrame::with_bus`].
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > CAN_PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            bus: 0,
            id: id.into(),
            data: Payload::from_slice(data),
            len: data.len(),
        })
    }

    /// Remote frames carry no payload to validate and are never accepted.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.len.min(CAN_PAYLOAD_LEN)
    }

    fn data(&self) -> &[u8] {
        &self.data.0[..self.dlc()]
    }
}
