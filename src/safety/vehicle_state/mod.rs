//! Rolling model of the vehicle reconstructed from validated RX frames.
//!
//! Adapters never touch [`VehicleState`] directly: they decode one frame into
//! a [`StateDelta`] and the safety context applies it once the frame passed
//! the shape and integrity checks of the active configuration.
use super::cruise::{CruiseEngagement, DisengageReason, Transition};
use super::sample::SampleBuffer;

/// Scale between the speed stored in samples and m/s.
pub const VEHICLE_SPEED_FACTOR: f32 = 1000.0;

//==================================================================================STATE_DELTA
/// Signals decoded from one RX frame. `None` leaves the field untouched.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StateDelta {
    pub gas_pressed: Option<bool>,
    pub brake_pressed: Option<bool>,
    /// Computed from raw wheel readings, not from the converted speed.
    pub vehicle_moving: Option<bool>,
    /// m/s
    pub vehicle_speed: Option<f32>,
    /// Measured steering angle, CAN units of the adapter.
    pub angle_meas: Option<i32>,
    pub torque_driver: Option<i32>,
    /// EPS motor torque, CAN units of the adapter.
    pub torque_meas: Option<i32>,
    /// Raw ACC-engaged bit.
    pub cruise_engaged: Option<bool>,
    pub acc_main_on: Option<bool>,
}

impl StateDelta {
    pub const fn none() -> Self {
        Self {
            gas_pressed: None,
            brake_pressed: None,
            vehicle_moving: None,
            vehicle_speed: None,
            angle_meas: None,
            torque_driver: None,
            torque_meas: None,
            cruise_engaged: None,
            acc_main_on: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }
}

//==================================================================================VEHICLE_STATE
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VehicleState {
    pub(crate) gas_pressed: bool,
    pub(crate) brake_pressed: bool,
    pub(crate) vehicle_moving: bool,
    /// m/s × [`VEHICLE_SPEED_FACTOR`], rounded.
    pub(crate) vehicle_speed: SampleBuffer,
    pub(crate) angle_meas: SampleBuffer,
    pub(crate) torque_driver: SampleBuffer,
    pub(crate) torque_meas: SampleBuffer,
    pub(crate) cruise: CruiseEngagement,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self::new()
    }
}

impl VehicleState {
    /// Safe defaults: stopped, pedals released, not engaged.
    pub const fn new() -> Self {
        Self {
            gas_pressed: false,
            brake_pressed: false,
            vehicle_moving: false,
            vehicle_speed: SampleBuffer::new(),
            angle_meas: SampleBuffer::new(),
            torque_driver: SampleBuffer::new(),
            torque_meas: SampleBuffer::new(),
            cruise: CruiseEngagement::new(),
        }
    }

    pub fn gas_pressed(&self) -> bool {
        self.gas_pressed
    }

    pub fn brake_pressed(&self) -> bool {
        self.brake_pressed
    }

    pub fn vehicle_moving(&self) -> bool {
        self.vehicle_moving
    }

    pub fn acc_main_on(&self) -> bool {
        self.cruise.acc_main_on()
    }

    pub fn controls_allowed(&self) -> bool {
        self.cruise.is_engaged()
    }

    pub fn cruise(&self) -> &CruiseEngagement {
        &self.cruise
    }

    /// Speed samples in m/s × [`VEHICLE_SPEED_FACTOR`].
    pub fn vehicle_speed(&self) -> &SampleBuffer {
        &self.vehicle_speed
    }

    pub fn angle_meas(&self) -> &SampleBuffer {
        &self.angle_meas
    }

    pub fn torque_driver(&self) -> &SampleBuffer {
        &self.torque_driver
    }

    pub fn torque_meas(&self) -> &SampleBuffer {
        &self.torque_meas
    }

    /// Apply the signals of one validated frame, then run the engagement
    /// machine on the resulting pedal and cruise levels.
    pub(crate) fn apply(&mut self, delta: &StateDelta) -> Option<Transition> {
        if let Some(gas) = delta.gas_pressed {
            self.gas_pressed = gas;
        }
        if let Some(brake) = delta.brake_pressed {
            self.brake_pressed = brake;
        }
        if let Some(moving) = delta.vehicle_moving {
            self.vehicle_moving = moving;
        }
        if let Some(speed) = delta.vehicle_speed {
            self.vehicle_speed.push(scale_speed(speed));
        }
        if let Some(angle) = delta.angle_meas {
            self.angle_meas.push(angle);
        }
        if let Some(torque) = delta.torque_driver {
            self.torque_driver.push(torque);
        }
        if let Some(torque) = delta.torque_meas {
            self.torque_meas.push(torque);
        }
        if let Some(main_on) = delta.acc_main_on {
            self.cruise.set_acc_main_on(main_on);
        }

        let mut transition = None;
        if let Some(engaged) = delta.cruise_engaged {
            transition = self
                .cruise
                .on_cruise_state(engaged, self.gas_pressed, self.brake_pressed);
        }
        if let Some(edge) = self.cruise.on_pedals(self.gas_pressed, self.brake_pressed) {
            transition = Some(edge);
        }
        transition
    }

    /// Withdraw controls for a reason found outside the frame contents.
    pub(crate) fn disengage(&mut self, reason: DisengageReason) -> Option<Transition> {
        self.cruise.disengage(reason)
    }
}

/// m/s to stored units, rounded half away from zero.
fn scale_speed(speed: f32) -> i32 {
    let scaled = speed * VEHICLE_SPEED_FACTOR;
    if scaled >= 0.0 {
        (scaled + 0.5) as i32
    } else {
        (scaled - 0.5) as i32
    }
}
