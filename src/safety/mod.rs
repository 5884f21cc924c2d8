//! Vehicle-agnostic safety engine.
//!
//! [`SafetyContext`] owns everything that evolves at runtime: the vehicle
//! state, the RX integrity slots, the steering history and the relay latch.
//! The surrounding firmware drives it through three synchronous hooks, called
//! from a single execution context, each bounded in time and allocation free:
//!
//! * [`SafetyContext::rx`] for every received frame,
//! * [`SafetyContext::tx`] for every frame about to be sent,
//! * [`SafetyContext::tick`] periodically, for staleness.
//!
//! [`SafetyContext::fwd`] gives the gateway routing between the vehicle and
//! the camera buses.
use embassy_time::{Duration, Instant};

use crate::core::SafetyConfig;
use crate::error::{ConfigError, TxDenial};
use crate::modes::{SafetyHooks, SafetyMode};
use crate::protocol::transport::can_frame::CanFrame;
use cruise::DisengageReason;
use gatekeeper::TxGatekeeper;
use relay::RelayMonitor;
use rx_monitor::{RxMonitor, RxVerdict};
use vehicle_state::VehicleState;

pub mod cruise;
pub mod gatekeeper;
pub mod limits;
pub mod relay;
pub mod rx_monitor;
pub mod sample;
pub mod vehicle_state;

pub use crate::core::MAX_RX_CHECKS;
pub use sample::MAX_SAMPLE_VALS;
pub use vehicle_state::VEHICLE_SPEED_FACTOR;

//==================================================================================CONSTANTS
/// Wrong-counter score at which a message is considered invalid.
pub const MAX_WRONG_COUNTERS: u8 = 5;

/// Consecutive expected periods a message may miss before it is lagging.
pub const MAX_MISSED_MSGS: u32 = 10;

/// Lower bound of the lagging threshold, whatever the message frequency.
pub const MIN_LAG_THRESHOLD: Duration = Duration::from_secs(1);

/// Refresh period of the torque real-time reference.
pub const MAX_TORQUE_RT_INTERVAL: Duration = Duration::from_millis(250);

/// Time left to the harness relay to switch after initialization.
pub const RELAY_TRANSITION_TIMEOUT: Duration = Duration::from_secs(1);

//==================================================================================OPTIONS
/// Reaction to an RX integrity fault (bad checksum, counter or quality flag,
/// or a lagging message). Invalid frames never update the vehicle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IntegrityPolicy {
    /// Also withdraw controls.
    #[default]
    DisengageOnFault,
    /// Only drop the faulty frame; raise [`SafetyContext::rx_checks_invalid`].
    SkipUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SafetyOptions {
    pub integrity_policy: IntegrityPolicy,
}

//==================================================================================CONTEXT
#[derive(Debug)]
pub struct SafetyContext<H: SafetyHooks = SafetyMode> {
    hooks: H,
    config: SafetyConfig,
    options: SafetyOptions,
    started_at: Instant,
    state: VehicleState,
    rx_monitor: RxMonitor,
    gatekeeper: TxGatekeeper,
    relay: RelayMonitor,
    rx_checks_invalid: bool,
}

impl SafetyContext<SafetyMode> {
    /// Select a registered mode by number and build its context.
    ///
    /// ```
    /// use embassy_time::Instant;
    /// use korri_safety::safety::{SafetyContext, SafetyOptions};
    ///
    /// let ctx = SafetyContext::init(22, 0, 0, SafetyOptions::default(), Instant::from_millis(0))
    ///     .unwrap();
    /// assert!(!ctx.controls_allowed());
    /// ```
    pub fn init(
        mode: u16,
        param: u16,
        sp_param: u16,
        options: SafetyOptions,
        now: Instant,
    ) -> Result<Self, ConfigError> {
        Self::new(SafetyMode::init(mode, param, sp_param)?, options, now)
    }
}

impl<H: SafetyHooks> SafetyContext<H> {
    /// Build a context around any adapter. Its tables are validated once here;
    /// they never change afterwards.
    pub fn new(hooks: H, options: SafetyOptions, now: Instant) -> Result<Self, ConfigError> {
        let config = hooks.config();
        if let Err(error) = config.validate(hooks.field_bindings()) {
            #[cfg(feature = "defmt")]
            defmt::error!("Safety configuration rejected");
            return Err(error);
        }

        Ok(Self {
            hooks,
            config,
            options,
            started_at: now,
            state: VehicleState::new(),
            rx_monitor: RxMonitor::new(config.rx_checks),
            gatekeeper: TxGatekeeper::new(config.tx_msgs),
            relay: RelayMonitor::new(config.tx_msgs, now),
            rx_checks_invalid: false,
        })
    }

    /// Process one received frame.
    ///
    /// Returns `false` when the frame belongs to a monitored message and
    /// failed its integrity checks. Frames outside the RX tables return
    /// `true` but never reach the adapter decoder.
    pub fn rx(&mut self, frame: &CanFrame, now: Instant) -> bool {
        if self.relay.check_rx(frame, now) {
            self.state.disengage(DisengageReason::RelayMalfunction);
        }

        match self.rx_monitor.check(frame, now, &self.hooks) {
            RxVerdict::Untracked => true,
            RxVerdict::Valid { .. } => {
                if let Some(delta) = self.hooks.decode_rx(frame) {
                    self.state.apply(&delta);
                }
                true
            }
            RxVerdict::Invalid { .. } => {
                self.rx_checks_invalid = true;
                self.on_integrity_fault();
                false
            }
        }
    }

    /// Allow/deny decision for a frame about to be sent.
    pub fn tx(&mut self, frame: &CanFrame, now: Instant) -> bool {
        self.check_tx(frame, now).is_ok()
    }

    /// Same as [`tx`](Self::tx), with the reason of a denial.
    pub fn check_tx(&mut self, frame: &CanFrame, now: Instant) -> Result<(), TxDenial> {
        let result = self.evaluate_tx(frame, now);
        #[cfg(feature = "defmt")]
        if let Err(denial) = result {
            defmt::debug!(
                "TX {=u32:#x} on bus {} denied: {}",
                frame.address(),
                frame.bus,
                denial
            );
        }
        result
    }

    fn evaluate_tx(&mut self, frame: &CanFrame, now: Instant) -> Result<(), TxDenial> {
        if self.relay.malfunction() {
            return Err(TxDenial::RelayMalfunction);
        }
        if self.gatekeeper.whitelisted(frame).is_none() {
            return Err(TxDenial::NotWhitelisted);
        }
        match self.hooks.decode_tx(frame) {
            Some(command) => {
                let limits = self.hooks.steering_limits();
                self.gatekeeper.enforce(command, limits, &self.state, now)
            }
            None => Ok(()),
        }
    }

    /// Periodic staleness evaluation of every RX check set.
    pub fn tick(&mut self, now: Instant) {
        self.rx_checks_invalid = self.rx_monitor.tick(now, self.started_at);
        if self.rx_checks_invalid {
            self.on_integrity_fault();
        }
    }

    /// Gateway routing for `frame`: destination bus, or `None` to drop it.
    pub fn fwd(&self, frame: &CanFrame) -> Option<u8> {
        self.relay.forward(frame, self.state.controls_allowed())
    }

    fn on_integrity_fault(&mut self) {
        if self.options.integrity_policy == IntegrityPolicy::DisengageOnFault {
            self.state.disengage(DisengageReason::IntegrityFault);
        }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn options(&self) -> SafetyOptions {
        self.options
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    pub fn rx_monitor(&self) -> &RxMonitor {
        &self.rx_monitor
    }

    /// Latest [`tick`](Self::tick) verdict, or an integrity fault seen since.
    pub fn rx_checks_invalid(&self) -> bool {
        self.rx_checks_invalid
    }

    pub fn relay_malfunction(&self) -> bool {
        self.relay.malfunction()
    }

    pub fn controls_allowed(&self) -> bool {
        self.state.controls_allowed()
    }
}
