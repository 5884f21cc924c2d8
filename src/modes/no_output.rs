//! Default-safe mode: monitors nothing, decodes nothing, sends nothing.
use super::SafetyHooks;
use crate::core::SafetyConfig;
use crate::protocol::transport::can_frame::CanFrame;
use crate::safety::gatekeeper::TxCommand;
use crate::safety::rx_monitor::FrameIntegrity;
use crate::safety::vehicle_state::StateDelta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoOutput;

impl FrameIntegrity for NoOutput {}

impl SafetyHooks for NoOutput {
    /// Empty whitelist: every TX frame is denied.
    fn config(&self) -> SafetyConfig {
        SafetyConfig::empty()
    }

    fn decode_rx(&self, _frame: &CanFrame) -> Option<StateDelta> {
        None
    }

    fn decode_tx(&self, _frame: &CanFrame) -> Option<TxCommand> {
        None
    }
}
