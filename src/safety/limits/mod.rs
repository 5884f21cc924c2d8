//! Steering command limit enforcer.
//!
//! The checks are pure over their inputs: the decoded command, the current
//! authorization, the measured history held in [`VehicleState`], and the
//! [`SteeringHistory`] of previously accepted commands that they update.
//! Limits are inclusive: a command equal to a bound is allowed.
use embassy_time::Instant;

use super::vehicle_state::{VehicleState, VEHICLE_SPEED_FACTOR};
use super::MAX_TORQUE_RT_INTERVAL;
use crate::error::SteeringViolation;

/// Number of breakpoints of a [`LookupTable`].
pub const LOOKUP_POINTS: usize = 3;

//==================================================================================LOOKUP_TABLE
/// Piecewise linear function given by monotonic breakpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LookupTable {
    pub x: [f32; LOOKUP_POINTS],
    pub y: [f32; LOOKUP_POINTS],
}

impl LookupTable {
    pub const fn new(x: [f32; LOOKUP_POINTS], y: [f32; LOOKUP_POINTS]) -> Self {
        Self { x, y }
    }

    /// First `y` below the first breakpoint, last `y` past the last one,
    /// linear in between.
    pub fn interpolate(&self, x: f32) -> f32 {
        if x <= self.x[0] {
            return self.y[0];
        }
        for i in 0..LOOKUP_POINTS - 1 {
            if x < self.x[i + 1] {
                let dx = (self.x[i + 1] - self.x[i]).max(0.0001);
                let dy = self.y[i + 1] - self.y[i];
                return self.y[i] + dy * (x - self.x[i]) / dx;
            }
        }
        self.y[LOOKUP_POINTS - 1]
    }
}

//==================================================================================COMMAND
/// Steering command decoded from a TX frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SteeringCommand {
    /// Signed value in the CAN units of the limits.
    pub desired: i32,
    /// Steer request bit.
    pub request: bool,
}

impl SteeringCommand {
    pub const fn new(desired: i32, request: bool) -> Self {
        Self { desired, request }
    }
}

/// Accepted command history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SteeringHistory {
    pub desired_angle_last: i32,
    pub desired_torque_last: i32,
    /// Reference of the real-time delta check.
    pub rt_torque_last: i32,
    pub ts_torque_check_last: Option<Instant>,
}

impl SteeringHistory {
    pub const fn new() -> Self {
        Self {
            desired_angle_last: 0,
            desired_torque_last: 0,
            rt_torque_last: 0,
            ts_torque_check_last: None,
        }
    }

    fn reset_torque(&mut self, now: Instant) {
        self.desired_torque_last = 0;
        self.rt_torque_last = 0;
        self.ts_torque_check_last = Some(now);
    }
}

//==================================================================================LIMITS
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AngleSteeringLimits {
    /// Largest magnitude, CAN units.
    pub max_angle: i32,
    /// CAN units per degree.
    pub angle_deg_to_can: f32,
    /// Allowed growth per command (deg) indexed by speed (m/s).
    pub rate_up: LookupTable,
    /// Allowed reduction per command (deg) indexed by speed (m/s).
    pub rate_down: LookupTable,
    /// Without a steer request the command must be exactly zero; otherwise it
    /// must stay within one count of the measured angle window.
    pub inactive_angle_is_zero: bool,
}

/// How torque commands are bounded beyond the static maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TorqueControl {
    /// Limit widened or narrowed by the measured driver torque.
    DriverLimited {
        driver_torque_allowance: i32,
        driver_torque_multiplier: i32,
    },
    /// Command kept within `max_torque_error` of the measured EPS torque.
    MotorLimited { max_torque_error: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TorqueSteeringLimits {
    pub max_torque: i32,
    /// Largest move from the real-time reference, refreshed every
    /// [`MAX_TORQUE_RT_INTERVAL`].
    pub max_rt_delta: i32,
    pub max_rate_up: i32,
    pub max_rate_down: i32,
    pub control: TorqueControl,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SteeringLimits {
    Angle(AngleSteeringLimits),
    Torque(TorqueSteeringLimits),
}

impl SteeringLimits {
    /// Validate `cmd` with the check matching the limit family.
    pub fn check(
        &self,
        cmd: SteeringCommand,
        controls_allowed: bool,
        state: &VehicleState,
        history: &mut SteeringHistory,
        now: Instant,
    ) -> Result<(), SteeringViolation> {
        match self {
            Self::Angle(limits) => limits.check(cmd, controls_allowed, state, history),
            Self::Torque(limits) => limits.check(cmd, controls_allowed, state, history, now),
        }
    }
}

/// `Err` when `value` leaves `[min, max]`.
fn within(
    value: i32,
    max: i32,
    min: i32,
    violation: SteeringViolation,
) -> Result<(), SteeringViolation> {
    if value > max || value < min {
        Err(violation)
    } else {
        Ok(())
    }
}

//==================================================================================ANGLE_CHECK
impl AngleSteeringLimits {
    /// Rate bounds in CAN units at the slowest recent speed, less 1 m/s, plus
    /// one count so a command exactly on the rate is not rejected by rounding.
    pub fn rate_deltas(&self, state: &VehicleState) -> (i32, i32) {
        let speed = state.vehicle_speed().min().unwrap_or(0) as f32 / VEHICLE_SPEED_FACTOR;
        let fudged_speed = speed - 1.0;
        let up = self.rate_up.interpolate(fudged_speed) * self.angle_deg_to_can + 1.0;
        let down = self.rate_down.interpolate(fudged_speed) * self.angle_deg_to_can + 1.0;
        (up as i32, down as i32)
    }

    pub fn check(
        &self,
        cmd: SteeringCommand,
        controls_allowed: bool,
        state: &VehicleState,
        history: &mut SteeringHistory,
    ) -> Result<(), SteeringViolation> {
        let desired = cmd.desired;
        within(desired, self.max_angle, -self.max_angle, SteeringViolation::MaxExceeded)?;

        if cmd.request && !controls_allowed {
            return Err(SteeringViolation::NotAllowed);
        }

        if cmd.request {
            let (delta_up, delta_down) = self.rate_deltas(state);
            let last = history.desired_angle_last;
            // Growing away from zero uses the up rate, moving back the down rate.
            // From zero either direction grows.
            let highest = last + if last >= 0 { delta_up } else { delta_down };
            let lowest = last - if last <= 0 { delta_up } else { delta_down };
            within(desired, highest, lowest, SteeringViolation::RateExceeded)?;
        } else if self.inactive_angle_is_zero {
            if desired != 0 {
                return Err(SteeringViolation::InactiveCommand);
            }
        } else {
            let clamp = |angle: i32| angle.clamp(-self.max_angle, self.max_angle);
            let max = clamp(state.angle_meas().max().unwrap_or(0)) + 1;
            let min = clamp(state.angle_meas().min().unwrap_or(0)) - 1;
            within(desired, max, min, SteeringViolation::InactiveCommand)?;
        }

        history.desired_angle_last = desired;
        Ok(())
    }
}

//==================================================================================TORQUE_CHECK
impl TorqueSteeringLimits {
    /// Bounds on the next command given the last accepted one.
    pub fn allowed_range(&self, last: i32, state: &VehicleState) -> (i32, i32) {
        let highest_rl = last.max(0) + self.max_rate_up;
        let lowest_rl = last.min(0) - self.max_rate_up;

        let (upper, lower) = match self.control {
            TorqueControl::DriverLimited {
                driver_torque_allowance,
                driver_torque_multiplier,
            } => {
                let driver = state.torque_driver();
                let driver_max = driver.max().unwrap_or(0);
                let driver_min = driver.min().unwrap_or(0);
                let upper = self.max_torque
                    + (driver_torque_allowance + driver_max) * driver_torque_multiplier;
                let lower = -self.max_torque
                    + (-driver_torque_allowance + driver_min) * driver_torque_multiplier;
                (upper, lower)
            }
            TorqueControl::MotorLimited { max_torque_error } => {
                let meas = state.torque_meas();
                let upper = meas.max().unwrap_or(0).max(0) + max_torque_error;
                let lower = meas.min().unwrap_or(0).min(0) - max_torque_error;
                (upper, lower)
            }
        };

        // Past the envelope the command must head back to zero at the down rate.
        let highest = highest_rl.min((last - self.max_rate_down).max(upper.max(0)));
        let lowest = lowest_rl.max((last + self.max_rate_down).min(lower.min(0)));
        (highest, lowest)
    }

    pub fn check(
        &self,
        cmd: SteeringCommand,
        controls_allowed: bool,
        state: &VehicleState,
        history: &mut SteeringHistory,
        now: Instant,
    ) -> Result<(), SteeringViolation> {
        let desired = cmd.desired;
        let mut result = Ok(());

        if controls_allowed {
            let (highest, lowest) = self.allowed_range(history.desired_torque_last, state);
            let max = self.max_torque;
            result = within(desired, max, -max, SteeringViolation::MaxExceeded)
                .and_then(|_| within(desired, highest, lowest, SteeringViolation::RateExceeded));
            history.desired_torque_last = desired;

            let rt_last = history.rt_torque_last;
            let rt_result = within(
                desired,
                rt_last.max(0) + self.max_rt_delta,
                rt_last.min(0) - self.max_rt_delta,
                SteeringViolation::RealTimeDeltaExceeded,
            );
            result = result.and(rt_result);

            let refresh = history.ts_torque_check_last.map_or(true, |last| {
                now.saturating_duration_since(last) > MAX_TORQUE_RT_INTERVAL
            });
            if refresh {
                history.rt_torque_last = desired;
                history.ts_torque_check_last = Some(now);
            }
        } else if desired != 0 {
            result = Err(SteeringViolation::NotAllowed);
        }

        if result.is_ok() && !cmd.request && desired != 0 {
            result = Err(SteeringViolation::InactiveCommand);
        }

        if result.is_err() || !controls_allowed {
            history.reset_torque(now);
        }
        result
    }
}
