//! RX integrity monitor.
//!
//! One [`RxStatus`] slot per configured [`RxCheckSet`]. A frame is tracked
//! when it matches (address, bus, length) of any alternative of a set. Every
//! alternative keeps its own counter, checksum and quality flag state, so a
//! stray frame on one bus never hides the others; which bus actually feeds
//! the vehicle state is left to the adapter routes. Cadence is per set and
//! [`RxMonitor::tick`] flags sets whose messages stopped.
use embassy_time::{Duration, Instant};
use embedded_can::Frame;

use super::{MAX_MISSED_MSGS, MAX_WRONG_COUNTERS, MIN_LAG_THRESHOLD};
use crate::core::{MessageSpec, RxCheckSet, MAX_RX_ALTERNATIVES, MAX_RX_CHECKS};
use crate::protocol::transport::can_frame::CanFrame;

//==================================================================================FRAME_INTEGRITY
/// Per-message integrity fields, located by the vehicle adapter.
///
/// Every method defaults to `None`. A check enabled by the [`MessageSpec`]
/// whose field cannot be read fails closed.
pub trait FrameIntegrity {
    /// Rolling counter carried by the frame.
    fn counter(&self, _frame: &CanFrame) -> Option<u8> {
        None
    }

    /// `(transmitted, computed)` checksum pair.
    fn checksum(&self, _frame: &CanFrame) -> Option<(u32, u32)> {
        None
    }

    /// Sender-reported signal quality; `true` means the values are usable.
    fn quality_flag(&self, _frame: &CanFrame) -> Option<bool> {
        None
    }
}

/// Adapter without any integrity field.
impl FrameIntegrity for () {}

//==================================================================================RX_STATUS
/// Frame checks of one alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
struct AltIntegrity {
    last_counter: Option<u8>,
    /// Saturating score in `0..=MAX_WRONG_COUNTERS`.
    wrong_counters: u8,
    valid_checksum: bool,
    valid_quality_flag: bool,
}

impl AltIntegrity {
    const fn new() -> Self {
        Self {
            last_counter: None,
            wrong_counters: 0,
            valid_checksum: true,
            valid_quality_flag: true,
        }
    }

    fn fault(&self) -> Option<RxFault> {
        if !self.valid_checksum {
            Some(RxFault::Checksum)
        } else if self.wrong_counters >= MAX_WRONG_COUNTERS {
            Some(RxFault::Counter)
        } else if !self.valid_quality_flag {
            Some(RxFault::QualityFlag)
        } else {
            None
        }
    }

    fn update(
        &mut self,
        msg: &MessageSpec,
        frame: &CanFrame,
        integrity: &(impl FrameIntegrity + ?Sized),
    ) {
        if !msg.ignore_checksum {
            self.valid_checksum = integrity
                .checksum(frame)
                .is_some_and(|(transmitted, computed)| transmitted == computed);
        }

        if !msg.ignore_counter && msg.max_counter > 0 {
            match integrity.counter(frame) {
                Some(counter) => {
                    if let Some(last) = self.last_counter {
                        let expected = ((last as u16 + 1) % (msg.max_counter as u16 + 1)) as u8;
                        if counter == expected {
                            self.wrong_counters = self.wrong_counters.saturating_sub(1);
                        } else {
                            self.wrong_counters = (self.wrong_counters + 1).min(MAX_WRONG_COUNTERS);
                        }
                    }
                    self.last_counter = Some(counter);
                }
                None => self.wrong_counters = MAX_WRONG_COUNTERS,
            }
        }

        if !msg.ignore_quality_flag {
            self.valid_quality_flag = integrity.quality_flag(frame).unwrap_or(false);
        }
    }
}

/// Integrity state of one RX check set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStatus {
    /// Alternative of the most recent tracked frame.
    active: Option<usize>,
    last_timestamp: Option<Instant>,
    lagging: bool,
    alternatives: [AltIntegrity; MAX_RX_ALTERNATIVES],
}

impl Default for RxStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl RxStatus {
    pub const fn new() -> Self {
        Self {
            active: None,
            last_timestamp: None,
            lagging: false,
            alternatives: [AltIntegrity::new(); MAX_RX_ALTERNATIVES],
        }
    }

    pub fn seen(&self) -> bool {
        self.last_timestamp.is_some()
    }

    /// Alternative that carried the last tracked frame.
    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Wrong-counter score of the active alternative.
    pub fn wrong_counters(&self) -> u8 {
        self.active_integrity().map_or(0, |alt| alt.wrong_counters)
    }

    pub fn lagging(&self) -> bool {
        self.lagging
    }

    /// Integrity of the last tracked frame, cadence excluded.
    pub fn frame_valid(&self) -> bool {
        self.fault().is_none()
    }

    /// Integrity and cadence.
    pub fn healthy(&self) -> bool {
        self.frame_valid() && !self.lagging
    }

    /// First failing check of the last tracked frame, if any.
    pub fn fault(&self) -> Option<RxFault> {
        self.active_integrity().and_then(AltIntegrity::fault)
    }

    fn active_integrity(&self) -> Option<&AltIntegrity> {
        self.active.and_then(|alt| self.alternatives.get(alt))
    }

    fn update(
        &mut self,
        alt: usize,
        msg: &MessageSpec,
        frame: &CanFrame,
        now: Instant,
        integrity: &(impl FrameIntegrity + ?Sized),
    ) -> Option<RxFault> {
        self.last_timestamp = Some(now);
        self.lagging = false;
        self.active = Some(alt);
        let slot = self.alternatives.get_mut(alt)?;
        slot.update(msg, frame, integrity);
        slot.fault()
    }
}

/// Frame-level integrity failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFault {
    Checksum,
    Counter,
    QualityFlag,
}

/// Outcome of [`RxMonitor::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxVerdict {
    /// Not part of the active configuration: must not reach the decoder.
    Untracked,
    /// Tracked by check set `set` and trustworthy.
    Valid { set: usize },
    /// Tracked by check set `set` but failed its integrity checks.
    Invalid { set: usize, fault: RxFault },
}

impl RxVerdict {
    /// Frame may update vehicle state.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

//==================================================================================RX_MONITOR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxMonitor {
    checks: &'static [RxCheckSet],
    statuses: [RxStatus; MAX_RX_CHECKS],
}

impl RxMonitor {
    /// Slots beyond [`MAX_RX_CHECKS`] are never tracked; the configuration
    /// is validated against that capacity before a monitor is built.
    pub const fn new(checks: &'static [RxCheckSet]) -> Self {
        Self {
            checks,
            statuses: [RxStatus::new(); MAX_RX_CHECKS],
        }
    }

    pub fn status(&self, set: usize) -> Option<&RxStatus> {
        if set < self.checks.len() {
            self.statuses.get(set)
        } else {
            None
        }
    }

    /// Locate the check set tracking `frame` and run the integrity checks of
    /// the alternative it matched.
    pub fn check(
        &mut self,
        frame: &CanFrame,
        now: Instant,
        integrity: &(impl FrameIntegrity + ?Sized),
    ) -> RxVerdict {
        let address = frame.address();
        let slots = self.checks.iter().zip(self.statuses.iter_mut());
        for (set, (check, status)) in slots.enumerate() {
            let matched = check.msgs.iter().enumerate().find_map(|(alt, msg)| {
                msg.as_ref()
                    .filter(|msg| msg.matches(frame.bus, address, frame.dlc()))
                    .map(|msg| (alt, msg))
            });
            let Some((alt, msg)) = matched else {
                continue;
            };

            return match status.update(alt, msg, frame, now, integrity) {
                None => RxVerdict::Valid { set },
                Some(fault) => {
                    #[cfg(feature = "defmt")]
                    defmt::warn!(
                        "RX {=u32:#x} on bus {} failed integrity: {}",
                        address,
                        frame.bus,
                        fault
                    );
                    RxVerdict::Invalid { set, fault }
                }
            };
        }
        RxVerdict::Untracked
    }

    /// Refresh staleness of every set. A set is lagging once the time since
    /// its last frame (or since `started_at` if never seen) exceeds
    /// `max(MAX_MISSED_MSGS × period, MIN_LAG_THRESHOLD)`, period taken from
    /// the active alternative (the first one until a frame is seen).
    ///
    /// Returns `true` when any set is lagging or failed its last frame checks.
    pub fn tick(&mut self, now: Instant, started_at: Instant) -> bool {
        let mut invalid = false;
        for (check, status) in self.checks.iter().zip(self.statuses.iter_mut()) {
            let frequency = status
                .active
                .and_then(|alt| check.msgs.get(alt).copied().flatten())
                .or_else(|| check.alternatives().next().copied())
                .map_or(0, |msg| msg.frequency);
            let threshold = lag_threshold(frequency);
            let since = status.last_timestamp.unwrap_or(started_at);
            let lagging = now.saturating_duration_since(since) > threshold;

            #[cfg(feature = "defmt")]
            if lagging && !status.lagging {
                defmt::warn!("RX check set lagging ({} Hz expected)", frequency);
            }
            status.lagging = lagging;
            invalid |= !status.healthy();
        }
        invalid
    }

    /// `true` when any set is currently lagging or invalid.
    pub fn any_invalid(&self) -> bool {
        self.statuses
            .iter()
            .take(self.checks.len())
            .any(|status| !status.healthy())
    }
}

/// Staleness tolerance for a message expected at `frequency` Hz.
pub fn lag_threshold(frequency: u32) -> Duration {
    if frequency == 0 {
        return MIN_LAG_THRESHOLD;
    }
    let period = Duration::from_hz(frequency as u64);
    (period * MAX_MISSED_MSGS).max(MIN_LAG_THRESHOLD)
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
