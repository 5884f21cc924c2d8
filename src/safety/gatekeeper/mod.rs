//! TX gatekeeper: whitelist lookup, then content checks of the decoded command.
use embassy_time::Instant;
use embedded_can::Frame;

use super::limits::{SteeringCommand, SteeringHistory, SteeringLimits};
use super::vehicle_state::VehicleState;
use crate::core::TxMsg;
use crate::error::{SteeringViolation, TxDenial};
use crate::protocol::transport::can_frame::CanFrame;

/// Content of a whitelisted TX frame that needs checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxCommand {
    /// Steering actuation, validated against the mode's [`SteeringLimits`].
    Steer(SteeringCommand),
    /// Button field: every bit of `pressed` outside `allowed` denies.
    Buttons { pressed: u32, allowed: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxGatekeeper {
    tx_msgs: &'static [TxMsg],
    history: SteeringHistory,
}

impl TxGatekeeper {
    pub const fn new(tx_msgs: &'static [TxMsg]) -> Self {
        Self {
            tx_msgs,
            history: SteeringHistory::new(),
        }
    }

    /// Whitelist entry matching (address, bus, length) of `frame`.
    pub fn whitelisted(&self, frame: &CanFrame) -> Option<&'static TxMsg> {
        let address = frame.address();
        self.tx_msgs
            .iter()
            .find(|msg| msg.matches(frame.bus, address, frame.dlc()))
    }

    pub fn history(&self) -> &SteeringHistory {
        &self.history
    }

    /// Validate a decoded command. Steering commands need `limits`; without
    /// them the command is refused.
    pub fn enforce(
        &mut self,
        command: TxCommand,
        limits: Option<&SteeringLimits>,
        state: &VehicleState,
        now: Instant,
    ) -> Result<(), TxDenial> {
        match command {
            TxCommand::Steer(cmd) => {
                let limits = limits.ok_or(TxDenial::Steering(SteeringViolation::NotAllowed))?;
                limits
                    .check(cmd, state.controls_allowed(), state, &mut self.history, now)
                    .map_err(TxDenial::Steering)
            }
            TxCommand::Buttons { pressed, allowed } => check_buttons(pressed, allowed),
        }
    }
}

/// Only bits of `allowed` may be set in `pressed`.
pub fn check_buttons(pressed: u32, allowed: u32) -> Result<(), TxDenial> {
    if pressed & !allowed != 0 {
        Err(TxDenial::ButtonNotAllowed { pressed })
    } else {
        Ok(())
    }
}
