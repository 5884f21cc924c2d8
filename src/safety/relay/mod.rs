//! Harness relay supervision and gateway forwarding.
//!
//! Addresses flagged `check_relay` in the TX whitelist are produced by this
//! system on their bus. Once the relay had time to switch, receiving one of
//! them from the vehicle means the stock ECU still reaches that bus: the
//! fault latches for the life of the context.
use embassy_time::Instant;

use super::RELAY_TRANSITION_TIMEOUT;
use crate::core::TxMsg;
use crate::protocol::transport::can_frame::CanFrame;

/// Vehicle side of the gateway.
pub const BUS_VEHICLE: u8 = 0;
/// Camera (stock ADAS ECU) side of the gateway.
pub const BUS_CAMERA: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelayMonitor {
    tx_msgs: &'static [TxMsg],
    started_at: Instant,
    malfunction: bool,
}

impl RelayMonitor {
    pub const fn new(tx_msgs: &'static [TxMsg], started_at: Instant) -> Self {
        Self {
            tx_msgs,
            started_at,
            malfunction: false,
        }
    }

    pub fn malfunction(&self) -> bool {
        self.malfunction
    }

    /// Inspect one received frame. Returns `true` when this frame latched the fault.
    pub fn check_rx(&mut self, frame: &CanFrame, now: Instant) -> bool {
        if self.malfunction {
            return false;
        }
        if now.saturating_duration_since(self.started_at) <= RELAY_TRANSITION_TIMEOUT {
            return false;
        }

        let address = frame.address();
        let stock_ecu_detected = self
            .tx_msgs
            .iter()
            .any(|msg| msg.check_relay && msg.address == address && msg.bus == frame.bus);
        if stock_ecu_detected {
            #[cfg(feature = "defmt")]
            defmt::error!(
                "Relay malfunction: {=u32:#x} received on bus {}",
                address,
                frame.bus
            );
            self.malfunction = true;
        }
        stock_ecu_detected
    }

    /// Destination bus for `frame`, `None` to drop it. Bus 0 and bus 2 are
    /// bridged; while `overriding`, addresses this system owns on the
    /// destination bus are not forwarded there.
    pub fn forward(&self, frame: &CanFrame, overriding: bool) -> Option<u8> {
        let destination = match frame.bus {
            BUS_VEHICLE => BUS_CAMERA,
            BUS_CAMERA => BUS_VEHICLE,
            _ => return None,
        };

        let address = frame.address();
        let owned = self
            .tx_msgs
            .iter()
            .any(|msg| msg.check_relay && msg.address == address && msg.bus == destination);
        if owned && overriding {
            None
        } else {
            Some(destination)
        }
    }
}
