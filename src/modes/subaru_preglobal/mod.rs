//! Subaru pre-global platform: torque-commanded steering, everything on bus 0.
use super::{find_route, Route, SafetyHooks};
use crate::core::{FieldBinding, FieldDescriptor, MessageSpec, RxCheckSet, SafetyConfig, TxMsg};
use crate::protocol::transport::can_frame::CanFrame;
use crate::safety::gatekeeper::TxCommand;
use crate::safety::limits::{SteeringCommand, SteeringLimits, TorqueControl, TorqueSteeringLimits};
use crate::safety::rx_monitor::FrameIntegrity;
use crate::safety::vehicle_state::StateDelta;

/// Driver torque sensor reports the opposite sign convention.
pub const PARAM_REVERSED_DRIVER_TORQUE: u16 = 4;

pub const MAIN_BUS: u8 = 0;

pub const MSG_THROTTLE: u32 = 0x140;
pub const MSG_CRUISE_CONTROL: u32 = 0x144;
pub const MSG_WHEEL_SPEEDS: u32 = 0xD4;
pub const MSG_BRAKE_PEDAL: u32 = 0xD1;
pub const MSG_STEERING_TORQUE: u32 = 0x371;
pub const MSG_ES_DISTANCE: u32 = 0x161;
pub const MSG_ES_LKAS: u32 = 0x164;

const DRIVER_TORQUE: FieldDescriptor = FieldDescriptor::little_endian(29, 11).signed();
const CRUISE_ENGAGED: FieldDescriptor = FieldDescriptor::bit(49);
const CRUISE_MAIN: FieldDescriptor = FieldDescriptor::bit(48);
const WHEEL_SPEEDS_LOW: FieldDescriptor = FieldDescriptor::little_endian(12, 20);
const WHEEL_SPEEDS_HIGH: FieldDescriptor = FieldDescriptor::little_endian(32, 32);
const BRAKE_PEDAL: FieldDescriptor = FieldDescriptor::little_endian(16, 8);
const THROTTLE: FieldDescriptor = FieldDescriptor::little_endian(0, 8);
const LKAS_TORQUE: FieldDescriptor = FieldDescriptor::little_endian(8, 13).signed();
const LKAS_REQUEST: FieldDescriptor = FieldDescriptor::bit(24);

static FIELDS: [FieldBinding; 9] = [
    FieldBinding::new(MSG_STEERING_TORQUE, DRIVER_TORQUE),
    FieldBinding::new(MSG_CRUISE_CONTROL, CRUISE_ENGAGED),
    FieldBinding::new(MSG_CRUISE_CONTROL, CRUISE_MAIN),
    FieldBinding::new(MSG_WHEEL_SPEEDS, WHEEL_SPEEDS_LOW),
    FieldBinding::new(MSG_WHEEL_SPEEDS, WHEEL_SPEEDS_HIGH),
    FieldBinding::new(MSG_BRAKE_PEDAL, BRAKE_PEDAL),
    FieldBinding::new(MSG_THROTTLE, THROTTLE),
    FieldBinding::new(MSG_ES_LKAS, LKAS_TORQUE),
    FieldBinding::new(MSG_ES_LKAS, LKAS_REQUEST),
];

static TX_MSGS: [TxMsg; 2] = [
    TxMsg::new(MSG_ES_DISTANCE, MAIN_BUS, 8, true),
    TxMsg::new(MSG_ES_LKAS, MAIN_BUS, 8, true),
];

// TODO: enable counter and checksum checks once their fields are mapped for this platform.
static RX_CHECKS: [RxCheckSet; 5] = [
    RxCheckSet::single(MessageSpec::relaxed(MSG_THROTTLE, MAIN_BUS, 8, 100)),
    RxCheckSet::single(MessageSpec::relaxed(MSG_STEERING_TORQUE, MAIN_BUS, 8, 50)),
    RxCheckSet::single(MessageSpec::relaxed(MSG_CRUISE_CONTROL, MAIN_BUS, 8, 50)),
    RxCheckSet::single(MessageSpec::relaxed(MSG_WHEEL_SPEEDS, MAIN_BUS, 8, 50)),
    RxCheckSet::single(MessageSpec::relaxed(MSG_BRAKE_PEDAL, MAIN_BUS, 4, 50)),
];

static STEERING_LIMITS: SteeringLimits = SteeringLimits::Torque(TorqueSteeringLimits {
    max_torque: 2047,
    max_rt_delta: 940,
    max_rate_up: 50,
    max_rate_down: 70,
    control: TorqueControl::DriverLimited {
        driver_torque_allowance: 75,
        driver_torque_multiplier: 10,
    },
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum RxSignal {
    SteeringTorque,
    CruiseControl,
    WheelSpeeds,
    BrakePedal,
    Throttle,
}

static RX_ROUTES: [Route<RxSignal>; 5] = [
    Route::new(MSG_STEERING_TORQUE, MAIN_BUS, RxSignal::SteeringTorque),
    Route::new(MSG_CRUISE_CONTROL, MAIN_BUS, RxSignal::CruiseControl),
    Route::new(MSG_WHEEL_SPEEDS, MAIN_BUS, RxSignal::WheelSpeeds),
    Route::new(MSG_BRAKE_PEDAL, MAIN_BUS, RxSignal::BrakePedal),
    Route::new(MSG_THROTTLE, MAIN_BUS, RxSignal::Throttle),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubaruPreglobal {
    reversed_driver_torque: bool,
}

impl SubaruPreglobal {
    pub const fn new(param: u16) -> Self {
        Self {
            reversed_driver_torque: param & PARAM_REVERSED_DRIVER_TORQUE != 0,
        }
    }

    pub fn reversed_driver_torque(&self) -> bool {
        self.reversed_driver_torque
    }
}

impl FrameIntegrity for SubaruPreglobal {}

impl SafetyHooks for SubaruPreglobal {
    fn config(&self) -> SafetyConfig {
        SafetyConfig::new(&RX_CHECKS, &TX_MSGS)
    }

    fn field_bindings(&self) -> &'static [FieldBinding] {
        &FIELDS
    }

    fn decode_rx(&self, frame: &CanFrame) -> Option<StateDelta> {
        let payload = frame.payload();
        let delta = match find_route(&RX_ROUTES, frame)? {
            RxSignal::SteeringTorque => {
                let torque = DRIVER_TORQUE.extract_signed(payload);
                StateDelta {
                    torque_driver: Some(if self.reversed_driver_torque {
                        -torque
                    } else {
                        torque
                    }),
                    ..StateDelta::none()
                }
            }
            // Engage on the rising edge of ACC, exit on ACC off.
            RxSignal::CruiseControl => StateDelta {
                cruise_engaged: Some(CRUISE_ENGAGED.is_set(payload)),
                acc_main_on: Some(CRUISE_MAIN.is_set(payload)),
                ..StateDelta::none()
            },
            // Any non-zero wheel speed.
            RxSignal::WheelSpeeds => StateDelta {
                vehicle_moving: Some(
                    WHEEL_SPEEDS_LOW.is_set(payload) || WHEEL_SPEEDS_HIGH.is_set(payload),
                ),
                ..StateDelta::none()
            },
            RxSignal::BrakePedal => StateDelta {
                brake_pressed: Some(BRAKE_PEDAL.extract(payload) > 0),
                ..StateDelta::none()
            },
            RxSignal::Throttle => StateDelta {
                gas_pressed: Some(THROTTLE.is_set(payload)),
                ..StateDelta::none()
            },
        };
        Some(delta)
    }

    fn decode_tx(&self, frame: &CanFrame) -> Option<TxCommand> {
        if frame.address() != MSG_ES_LKAS {
            return None;
        }
        let payload = frame.payload();
        let desired = -LKAS_TORQUE.extract_signed(payload);
        Some(TxCommand::Steer(SteeringCommand::new(
            desired,
            LKAS_REQUEST.is_set(payload),
        )))
    }

    fn steering_limits(&self) -> Option<&SteeringLimits> {
        Some(&STEERING_LIMITS)
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
