//! Nissan family (X-Trail, Altima, Leaf): angle-commanded steering.
//!
//! The EPS sits on bus 0 by default, on bus 1 when `param` carries
//! [`PARAM_ALT_EPS_BUS`]; the cruise state and ProPilot messages move with it.
//! Leaf cars, selected by [`SP_PARAM_LEAF`] in the process-wide selector, have
//! no ProPilot status message.
use super::{find_route, Route, SafetyHooks};
use crate::core::{FieldBinding, FieldDescriptor, MessageSpec, RxCheckSet, SafetyConfig, TxMsg};
use crate::protocol::transport::can_frame::CanFrame;
use crate::safety::gatekeeper::TxCommand;
use crate::safety::limits::{AngleSteeringLimits, LookupTable, SteeringCommand, SteeringLimits};
use crate::safety::rx_monitor::FrameIntegrity;
use crate::safety::vehicle_state::StateDelta;

/// EPS on the secondary bus (C-CAN instead of V-CAN).
pub const PARAM_ALT_EPS_BUS: u16 = 1;
/// Leaf sub-family.
pub const SP_PARAM_LEAF: u16 = 1;

pub const MSG_STEER_ANGLE: u32 = 0x2;
pub const MSG_WHEEL_SPEEDS_REAR: u32 = 0x285;
pub const MSG_GAS_PEDAL: u32 = 0x15c;
pub const MSG_DOORS_LIGHTS: u32 = 0x454;
pub const MSG_LEAF_PEDALS: u32 = 0x239;
pub const MSG_LEAF_BRAKE: u32 = 0x1cc;
pub const MSG_CRUISE_STATE: u32 = 0x30f;
pub const MSG_PRO_PILOT: u32 = 0x1B6;
pub const MSG_LKAS: u32 = 0x169;
pub const MSG_PRO_PILOT_HUD: u32 = 0x2b1;
pub const MSG_PRO_PILOT_HUD_INFO: u32 = 0x4cc;
pub const MSG_CRUISE_THROTTLE: u32 = 0x20b;
pub const MSG_CANCEL: u32 = 0x280;

/// Only button the system may press on `CRUISE_THROTTLE`.
pub const CANCEL_BUTTON: u32 = 0x02;

/// LKAS angle offset: 1310 deg in 0.01 deg units.
const LKAS_ANGLE_OFFSET: i32 = 131_000;
/// Measured angle is 0.1 deg with the opposite sign of the LKAS command.
const STEER_ANGLE_TO_LKAS: i32 = -10;
const WHEEL_SPEED_KPH_PER_COUNT: f32 = 0.005;
const KPH_TO_MS: f32 = 1.0 / 3.6;
/// Pedal readings at or below this are noise.
const GAS_PRESSED_THRESHOLD: u32 = 3;

//==================================================================================FIELDS
const STEER_ANGLE: FieldDescriptor = FieldDescriptor::little_endian(0, 16).signed();
const WHEEL_RIGHT_REAR: FieldDescriptor = FieldDescriptor::big_endian(7, 16);
const WHEEL_LEFT_REAR: FieldDescriptor = FieldDescriptor::big_endian(23, 16);
const GAS_PEDAL: FieldDescriptor = FieldDescriptor::big_endian(47, 10);
const BRAKE_PRESSED: FieldDescriptor = FieldDescriptor::bit(23);
const LEAF_GAS_PEDAL: FieldDescriptor = FieldDescriptor::little_endian(0, 8);
const LEAF_BRAKE_PRESSED: FieldDescriptor = FieldDescriptor::bit(37);
const LEAF_ACC_MAIN: FieldDescriptor = FieldDescriptor::bit(17);
const CRUISE_ENGAGED: FieldDescriptor = FieldDescriptor::bit(3);
const PRO_PILOT_ACC_MAIN: FieldDescriptor = FieldDescriptor::bit(36);
const LKAS_ANGLE: FieldDescriptor = FieldDescriptor::big_endian(7, 18);
const LKAS_ACTIVE: FieldDescriptor = FieldDescriptor::bit(52);
const CRUISE_BUTTONS: FieldDescriptor = FieldDescriptor::little_endian(8, 6);

static FIELDS: [FieldBinding; 13] = [
    FieldBinding::new(MSG_STEER_ANGLE, STEER_ANGLE),
    FieldBinding::new(MSG_WHEEL_SPEEDS_REAR, WHEEL_RIGHT_REAR),
    FieldBinding::new(MSG_WHEEL_SPEEDS_REAR, WHEEL_LEFT_REAR),
    FieldBinding::new(MSG_GAS_PEDAL, GAS_PEDAL),
    FieldBinding::new(MSG_DOORS_LIGHTS, BRAKE_PRESSED),
    FieldBinding::new(MSG_LEAF_PEDALS, LEAF_GAS_PEDAL),
    FieldBinding::new(MSG_LEAF_PEDALS, LEAF_BRAKE_PRESSED),
    FieldBinding::new(MSG_LEAF_PEDALS, LEAF_ACC_MAIN),
    FieldBinding::new(MSG_CRUISE_STATE, CRUISE_ENGAGED),
    FieldBinding::new(MSG_PRO_PILOT, PRO_PILOT_ACC_MAIN),
    FieldBinding::new(MSG_LKAS, LKAS_ANGLE),
    FieldBinding::new(MSG_LKAS, LKAS_ACTIVE),
    FieldBinding::new(MSG_CRUISE_THROTTLE, CRUISE_BUTTONS),
];

//==================================================================================TABLES
static TX_MSGS: [TxMsg; 6] = [
    TxMsg::new(MSG_LKAS, 0, 8, true),
    TxMsg::new(MSG_PRO_PILOT_HUD, 0, 8, true),
    TxMsg::new(MSG_PRO_PILOT_HUD_INFO, 0, 8, true),
    // X-Trail
    TxMsg::new(MSG_CRUISE_THROTTLE, 2, 6, false),
    // Altima
    TxMsg::new(MSG_CRUISE_THROTTLE, 1, 6, false),
    // Leaf
    TxMsg::new(MSG_CANCEL, 2, 8, true),
];

/// Checks shared by every variant. Depending on the car, each message shows
/// up on one bus or the other; only the routes pick the bus that is decoded.
const fn common_rx_checks() -> [RxCheckSet; 5] {
    [
        RxCheckSet::pair(
            MessageSpec::relaxed(MSG_STEER_ANGLE, 0, 5, 100),
            MessageSpec::relaxed(MSG_STEER_ANGLE, 1, 5, 100),
        ),
        RxCheckSet::pair(
            MessageSpec::relaxed(MSG_WHEEL_SPEEDS_REAR, 0, 8, 50),
            MessageSpec::relaxed(MSG_WHEEL_SPEEDS_REAR, 1, 8, 50),
        ),
        RxCheckSet::pair(
            MessageSpec::relaxed(MSG_CRUISE_STATE, 2, 3, 10),
            MessageSpec::relaxed(MSG_CRUISE_STATE, 1, 3, 10),
        ),
        RxCheckSet::triple(
            MessageSpec::relaxed(MSG_GAS_PEDAL, 0, 8, 50),
            MessageSpec::relaxed(MSG_GAS_PEDAL, 1, 8, 50),
            MessageSpec::relaxed(MSG_LEAF_PEDALS, 0, 8, 50),
        ),
        RxCheckSet::triple(
            MessageSpec::relaxed(MSG_DOORS_LIGHTS, 0, 8, 10),
            MessageSpec::relaxed(MSG_DOORS_LIGHTS, 1, 8, 10),
            MessageSpec::relaxed(MSG_LEAF_BRAKE, 0, 4, 100),
        ),
    ]
}

/// Common checks plus the ProPilot status on `pro_pilot_bus`.
const fn pro_pilot_rx_checks(pro_pilot_bus: u8) -> [RxCheckSet; 6] {
    let common = common_rx_checks();
    [
        common[0],
        common[1],
        common[2],
        common[3],
        common[4],
        RxCheckSet::single(MessageSpec::relaxed(MSG_PRO_PILOT, pro_pilot_bus, 8, 10)),
    ]
}

static RX_CHECKS: [RxCheckSet; 6] = pro_pilot_rx_checks(1);
static ALT_EPS_RX_CHECKS: [RxCheckSet; 6] = pro_pilot_rx_checks(2);
static LEAF_RX_CHECKS: [RxCheckSet; 5] = common_rx_checks();

static STEERING_LIMITS: SteeringLimits = SteeringLimits::Angle(AngleSteeringLimits {
    max_angle: 60_000,
    angle_deg_to_can: 100.0,
    rate_up: LookupTable::new([0., 5., 15.], [5., 0.8, 0.15]),
    rate_down: LookupTable::new([0., 5., 15.], [5., 3.5, 0.4]),
    inactive_angle_is_zero: true,
});

//==================================================================================ROUTES
/// RX signals, keyed by (address, bus) in the route tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum RxSignal {
    SteerAngle,
    WheelSpeeds,
    GasPedal,
    BrakePedal,
    /// Leaf pedals; the main switch bit is only meaningful on bus 0.
    LeafPedals,
    /// Leaf main switch seen on bus 0 while the EPS is elsewhere.
    LeafAccMain,
    CruiseState,
    ProPilotAccMain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum TxSignal {
    Lkas,
    CruiseButtons,
}

const fn rx_routes(variant: NissanVariant) -> [Route<RxSignal>; 8] {
    let main = variant.main_bus();
    [
        Route::new(MSG_STEER_ANGLE, main, RxSignal::SteerAngle),
        Route::new(MSG_WHEEL_SPEEDS_REAR, main, RxSignal::WheelSpeeds),
        Route::new(MSG_GAS_PEDAL, main, RxSignal::GasPedal),
        Route::new(MSG_DOORS_LIGHTS, main, RxSignal::BrakePedal),
        // First match wins: on the standard layout both entries name bus 0.
        Route::new(MSG_LEAF_PEDALS, main, RxSignal::LeafPedals),
        Route::new(MSG_LEAF_PEDALS, 0, RxSignal::LeafAccMain),
        Route::new(MSG_CRUISE_STATE, variant.cruise_bus(), RxSignal::CruiseState),
        Route::new(MSG_PRO_PILOT, variant.pro_pilot_bus(), RxSignal::ProPilotAccMain),
    ]
}

static RX_ROUTES: [Route<RxSignal>; 8] = rx_routes(NissanVariant::Standard);
static ALT_EPS_RX_ROUTES: [Route<RxSignal>; 8] = rx_routes(NissanVariant::AltEps);

static TX_ROUTES: [Route<TxSignal>; 3] = [
    Route::new(MSG_LKAS, 0, TxSignal::Lkas),
    Route::new(MSG_CRUISE_THROTTLE, 2, TxSignal::CruiseButtons),
    Route::new(MSG_CRUISE_THROTTLE, 1, TxSignal::CruiseButtons),
];

//==================================================================================ADAPTER
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NissanVariant {
    Standard,
    AltEps,
    Leaf,
    LeafAltEps,
}

impl NissanVariant {
    pub const fn from_params(param: u16, sp_param: u16) -> Self {
        let alt_eps = param & PARAM_ALT_EPS_BUS != 0;
        let leaf = sp_param & SP_PARAM_LEAF != 0;
        match (leaf, alt_eps) {
            (false, false) => Self::Standard,
            (false, true) => Self::AltEps,
            (true, false) => Self::Leaf,
            (true, true) => Self::LeafAltEps,
        }
    }

    pub const fn alt_eps(self) -> bool {
        matches!(self, Self::AltEps | Self::LeafAltEps)
    }

    pub const fn leaf(self) -> bool {
        matches!(self, Self::Leaf | Self::LeafAltEps)
    }

    /// Bus carrying the EPS, wheel speeds and pedals.
    pub const fn main_bus(self) -> u8 {
        if self.alt_eps() {
            1
        } else {
            0
        }
    }

    pub const fn cruise_bus(self) -> u8 {
        if self.alt_eps() {
            1
        } else {
            2
        }
    }

    pub const fn pro_pilot_bus(self) -> u8 {
        if self.alt_eps() {
            2
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Nissan {
    variant: NissanVariant,
}

impl Nissan {
    pub const fn new(param: u16, sp_param: u16) -> Self {
        Self::with_variant(NissanVariant::from_params(param, sp_param))
    }

    pub const fn with_variant(variant: NissanVariant) -> Self {
        Self { variant }
    }

    pub fn variant(&self) -> NissanVariant {
        self.variant
    }

    fn rx_routes(&self) -> &'static [Route<RxSignal>] {
        if self.variant.alt_eps() {
            &ALT_EPS_RX_ROUTES
        } else {
            &RX_ROUTES
        }
    }
}

impl FrameIntegrity for Nissan {}

impl SafetyHooks for Nissan {
    fn config(&self) -> SafetyConfig {
        let rx_checks: &'static [RxCheckSet] = match self.variant {
            NissanVariant::Leaf | NissanVariant::LeafAltEps => &LEAF_RX_CHECKS,
            NissanVariant::AltEps => &ALT_EPS_RX_CHECKS,
            NissanVariant::Standard => &RX_CHECKS,
        };
        SafetyConfig::new(rx_checks, &TX_MSGS)
    }

    fn field_bindings(&self) -> &'static [FieldBinding] {
        &FIELDS
    }

    fn decode_rx(&self, frame: &CanFrame) -> Option<StateDelta> {
        let payload = frame.payload();
        let delta = match find_route(self.rx_routes(), frame)? {
            RxSignal::SteerAngle => StateDelta {
                angle_meas: Some(STEER_ANGLE.extract_signed(payload) * STEER_ANGLE_TO_LKAS),
                ..StateDelta::none()
            },
            RxSignal::WheelSpeeds => {
                let right_rear = WHEEL_RIGHT_REAR.extract(payload);
                let left_rear = WHEEL_LEFT_REAR.extract(payload);
                let average = (right_rear + left_rear) as f32 / 2.0;
                StateDelta {
                    vehicle_moving: Some((right_rear | left_rear) != 0),
                    vehicle_speed: Some(average * WHEEL_SPEED_KPH_PER_COUNT * KPH_TO_MS),
                    ..StateDelta::none()
                }
            }
            RxSignal::GasPedal => StateDelta {
                gas_pressed: Some(GAS_PEDAL.extract(payload) > GAS_PRESSED_THRESHOLD),
                ..StateDelta::none()
            },
            RxSignal::BrakePedal => StateDelta {
                brake_pressed: Some(BRAKE_PRESSED.is_set(payload)),
                ..StateDelta::none()
            },
            RxSignal::LeafPedals => StateDelta {
                gas_pressed: Some(LEAF_GAS_PEDAL.extract(payload) > GAS_PRESSED_THRESHOLD),
                brake_pressed: Some(LEAF_BRAKE_PRESSED.is_set(payload)),
                acc_main_on: (frame.bus == 0).then(|| LEAF_ACC_MAIN.is_set(payload)),
                ..StateDelta::none()
            },
            RxSignal::LeafAccMain => StateDelta {
                acc_main_on: Some(LEAF_ACC_MAIN.is_set(payload)),
                ..StateDelta::none()
            },
            RxSignal::CruiseState => StateDelta {
                cruise_engaged: Some(CRUISE_ENGAGED.is_set(payload)),
                ..StateDelta::none()
            },
            RxSignal::ProPilotAccMain => StateDelta {
                acc_main_on: Some(PRO_PILOT_ACC_MAIN.is_set(payload)),
                ..StateDelta::none()
            },
        };
        Some(delta)
    }

    fn decode_tx(&self, frame: &CanFrame) -> Option<TxCommand> {
        let payload = frame.payload();
        let command = match find_route(&TX_ROUTES, frame)? {
            TxSignal::Lkas => {
                // Factor -0.01 deg, offset 1310 deg: flip into the angle scale of the limits.
                let desired = LKAS_ANGLE_OFFSET - LKAS_ANGLE.extract(payload) as i32;
                TxCommand::Steer(SteeringCommand::new(desired, LKAS_ACTIVE.is_set(payload)))
            }
            TxSignal::CruiseButtons => TxCommand::Buttons {
                pressed: CRUISE_BUTTONS.extract(payload),
                allowed: CANCEL_BUTTON,
            },
        };
        Some(command)
    }

    fn steering_limits(&self) -> Option<&SteeringLimits> {
        Some(&STEERING_LIMITS)
    }
}
