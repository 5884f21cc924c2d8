//! Subaru pre-global decoding and table consistency.
use super::*;
use crate::core::Payload;

fn frame(address: u32, payload: &Payload, len: usize) -> CanFrame {
    CanFrame::on_bus(MAIN_BUS, address, &payload.as_bytes()[..len]).unwrap()
}

fn driver_torque(raw: i32) -> CanFrame {
    let mut payload = Payload::new();
    DRIVER_TORQUE.insert_signed(&mut payload, raw);
    frame(MSG_STEERING_TORQUE, &payload, 8)
}

fn lkas(torque: i32, request: bool) -> CanFrame {
    let mut payload = Payload::new();
    // The wire carries the opposite sign.
    LKAS_TORQUE.insert_signed(&mut payload, -torque);
    LKAS_REQUEST.insert(&mut payload, request as u32);
    frame(MSG_ES_LKAS, &payload, 8)
}

#[test]
/// Reversed driver torque is selected by the mask value 4.
fn test_param_mask() {
    assert!(!SubaruPreglobal::new(0).reversed_driver_torque());
    assert!(SubaruPreglobal::new(4).reversed_driver_torque());
    assert!(!SubaruPreglobal::new(1 << 4).reversed_driver_torque());
}

#[test]
/// Tables pass validation with the bound fields.
fn test_tables_validate() {
    let subaru = SubaruPreglobal::new(0);
    assert_eq!(subaru.config().validate(subaru.field_bindings()), Ok(()));
    assert_eq!(subaru.config().rx_checks.len(), 5);
    assert!(subaru.config().tx_msgs.iter().all(|msg| msg.check_relay));
}

#[test]
/// Driver torque is an 11-bit signed field, optionally negated.
fn test_decode_driver_torque() {
    let normal = SubaruPreglobal::new(0);
    let reversed = SubaruPreglobal::new(PARAM_REVERSED_DRIVER_TORQUE);
    for raw in [-1024, -75, 0, 1, 1023] {
        let frame = driver_torque(raw);
        assert_eq!(normal.decode_rx(&frame).unwrap().torque_driver, Some(raw));
        assert_eq!(reversed.decode_rx(&frame).unwrap().torque_driver, Some(-raw));
    }
    // (byte3 >> 5) + (byte4 << 3)
    let manual = CanFrame::on_bus(0, MSG_STEERING_TORQUE, &[0, 0, 0, 0x60, 0x01, 0, 0, 0]).unwrap();
    assert_eq!(normal.decode_rx(&manual).unwrap().torque_driver, Some(11));
}

#[test]
/// Cruise frame carries both the engaged bit and the main switch.
fn test_decode_cruise() {
    let subaru = SubaruPreglobal::new(0);
    let mut payload = Payload::new();
    CRUISE_ENGAGED.insert(&mut payload, 1);
    let delta = subaru.decode_rx(&frame(MSG_CRUISE_CONTROL, &payload, 8)).unwrap();
    assert_eq!(delta.cruise_engaged, Some(true));
    assert_eq!(delta.acc_main_on, Some(false));
    assert_eq!(payload.0[6], 0x02);
}

#[test]
/// Moving is any non-zero bit above bit 12 in the wheel frame.
fn test_decode_wheel_speeds() {
    let subaru = SubaruPreglobal::new(0);
    let decode = |data: [u8; 8]| {
        let frame = CanFrame::on_bus(0, MSG_WHEEL_SPEEDS, &data).unwrap();
        subaru.decode_rx(&frame).unwrap().vehicle_moving
    };
    assert_eq!(decode([0; 8]), Some(false));
    assert_eq!(decode([0xFF, 0x0F, 0, 0, 0, 0, 0, 0]), Some(false));
    assert_eq!(decode([0, 0x10, 0, 0, 0, 0, 0, 0]), Some(true));
    assert_eq!(decode([0, 0, 0, 0, 0, 0, 0, 0x80]), Some(true));
}

#[test]
/// Brake uses byte 2 of a four-byte frame, throttle byte 0.
fn test_decode_pedals() {
    let subaru = SubaruPreglobal::new(0);
    let brake = CanFrame::on_bus(0, MSG_BRAKE_PEDAL, &[0xFF, 0xFF, 0x01, 0]).unwrap();
    assert_eq!(subaru.decode_rx(&brake).unwrap().brake_pressed, Some(true));
    let released = CanFrame::on_bus(0, MSG_BRAKE_PEDAL, &[0xFF, 0xFF, 0x00, 0xFF]).unwrap();
    assert_eq!(subaru.decode_rx(&released).unwrap().brake_pressed, Some(false));

    let throttle = CanFrame::on_bus(0, MSG_THROTTLE, &[1, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    assert_eq!(subaru.decode_rx(&throttle).unwrap().gas_pressed, Some(true));
}

#[test]
/// Nothing is decoded off the main bus.
fn test_decode_other_bus() {
    let subaru = SubaruPreglobal::new(0);
    assert_eq!(subaru.decode_rx(&driver_torque(10).with_bus(2)), None);
}

#[test]
/// LKAS torque is negated from the wire; distance frames need no check.
fn test_decode_lkas() {
    let subaru = SubaruPreglobal::new(0);
    assert_eq!(
        subaru.decode_tx(&lkas(-2047, true)),
        Some(TxCommand::Steer(SteeringCommand::new(-2047, true)))
    );
    assert_eq!(
        subaru.decode_tx(&lkas(300, false)),
        Some(TxCommand::Steer(SteeringCommand::new(300, false)))
    );
    let distance = frame(MSG_ES_DISTANCE, &Payload::new(), 8);
    assert_eq!(subaru.decode_tx(&distance), None);
}
