//! Subaru pre-global torque steering driven through the safety context.
mod helpers;

use helpers::{at, frame, packed, Ticker};
use korri_safety::core::FieldDescriptor;
use korri_safety::error::{SteeringViolation, TxDenial};
use korri_safety::infra::codec::bits::from_signed;
use korri_safety::modes::subaru_preglobal::PARAM_REVERSED_DRIVER_TORQUE;
use korri_safety::{CanFrame, SafetyContext, SafetyOptions};

const SUBARU_PREGLOBAL: u16 = 22;

const LKAS_TORQUE: FieldDescriptor = FieldDescriptor::little_endian(8, 13).signed();
const LKAS_REQUEST: FieldDescriptor = FieldDescriptor::bit(24);
const DRIVER_TORQUE: FieldDescriptor = FieldDescriptor::little_endian(29, 11).signed();

fn context(param: u16) -> SafetyContext {
    SafetyContext::init(SUBARU_PREGLOBAL, param, 0, SafetyOptions::default(), at(0)).unwrap()
}

/// ES_LKAS carrying `desired` in the engine's sign convention.
fn lkas(desired: i32, request: bool) -> CanFrame {
    packed(
        0,
        0x164,
        8,
        &[
            (LKAS_TORQUE, from_signed(-desired, 13)),
            (LKAS_REQUEST, request as u32),
        ],
    )
}

fn cruise(engaged: bool) -> CanFrame {
    frame(0, 0x144, &[0, 0, 0, 0, 0, 0, ((engaged as u8) << 1) | 1, 0])
}

fn driver_torque(torque: i32) -> CanFrame {
    packed(0, 0x371, 8, &[(DRIVER_TORQUE, from_signed(torque, 11))])
}

fn engaged(param: u16) -> (SafetyContext, Ticker) {
    let mut ctx = context(param);
    let mut clock = Ticker::new(0, 20);
    ctx.rx(&cruise(false), clock.next());
    ctx.rx(&cruise(true), clock.next());
    assert!(ctx.controls_allowed());
    assert!(ctx.state().acc_main_on());
    (ctx, clock)
}

/// Walk the command up to `target` one allowed step at a time.
fn ramp_to(ctx: &mut SafetyContext, clock: &mut Ticker, target: i32) {
    let step = if target >= 0 { 50 } else { -50 };
    let mut desired = 0;
    while desired != target {
        desired = if (target - desired).abs() < 50 {
            target
        } else {
            desired + step
        };
        assert!(ctx.tx(&lkas(desired, true), clock.next()), "ramp step {}", desired);
    }
}

#[test]
/// Any torque within the maximum is allowed when it stops changing.
fn test_steady_torque_within_max() {
    for target in [0, 500, 2047, -2047, -730] {
        let (mut ctx, mut clock) = engaged(0);
        ramp_to(&mut ctx, &mut clock, target);
        for _ in 0..20 {
            assert!(ctx.tx(&lkas(target, true), clock.next()));
        }
    }
}

#[test]
/// Magnitude above the maximum is denied even when reached by small steps.
fn test_torque_above_max_denied() {
    let (mut ctx, mut clock) = engaged(0);
    ramp_to(&mut ctx, &mut clock, 2047);
    assert_eq!(
        ctx.check_tx(&lkas(2048, true), clock.next()),
        Err(TxDenial::Steering(SteeringViolation::MaxExceeded))
    );
}

#[test]
/// From the same torque the allowed increase never exceeds the allowed decrease.
fn test_rate_asymmetry() {
    let (mut ctx, mut clock) = engaged(0);
    ramp_to(&mut ctx, &mut clock, 500);
    assert_eq!(
        ctx.check_tx(&lkas(551, true), clock.next()),
        Err(TxDenial::Steering(SteeringViolation::RateExceeded))
    );

    let (mut ctx, mut clock) = engaged(0);
    ramp_to(&mut ctx, &mut clock, 500);
    assert!(ctx.tx(&lkas(550, true), clock.next()));

    let (mut ctx, mut clock) = engaged(0);
    ramp_to(&mut ctx, &mut clock, 500);
    assert!(ctx.tx(&lkas(430, true), clock.next()));
    assert!(ctx.tx(&lkas(0, true), clock.next()));
}

#[test]
/// A denied command resets the reference, so the next step restarts from zero.
fn test_violation_resets_history() {
    let (mut ctx, mut clock) = engaged(0);
    ramp_to(&mut ctx, &mut clock, 300);
    assert!(!ctx.tx(&lkas(400, true), clock.next()));
    assert!(!ctx.tx(&lkas(300, true), clock.next()));
    assert!(ctx.tx(&lkas(50, true), clock.next()));
}

#[test]
/// Driver torque opposing the command forces it back toward zero.
fn test_driver_override() {
    let (mut ctx, mut clock) = engaged(0);
    ramp_to(&mut ctx, &mut clock, 1000);
    ctx.rx(&driver_torque(-200), clock.next());
    assert_eq!(
        ctx.check_tx(&lkas(1000, true), clock.next()),
        Err(TxDenial::Steering(SteeringViolation::RateExceeded))
    );

    let (mut ctx, mut clock) = engaged(0);
    ramp_to(&mut ctx, &mut clock, 1000);
    ctx.rx(&driver_torque(-200), clock.next());
    assert!(ctx.tx(&lkas(930, true), clock.next()));

    // Driver pushing the same way leaves the command alone.
    let (mut ctx, mut clock) = engaged(0);
    ramp_to(&mut ctx, &mut clock, 1000);
    ctx.rx(&driver_torque(200), clock.next());
    assert!(ctx.tx(&lkas(1000, true), clock.next()));
}

#[test]
/// Reversed sensor: the same raw reading becomes an opposing torque.
fn test_reversed_driver_torque() {
    let (mut ctx, mut clock) = engaged(PARAM_REVERSED_DRIVER_TORQUE);
    ramp_to(&mut ctx, &mut clock, 1000);
    ctx.rx(&driver_torque(200), clock.next());
    assert_eq!(ctx.state().torque_driver().latest(), Some(-200));
    assert!(!ctx.tx(&lkas(1000, true), clock.next()));
}

#[test]
/// Jumps larger than the real-time delta inside one window are denied.
fn test_real_time_delta() {
    let (mut ctx, _) = engaged(0);
    // 10 ms apart: 20 steps of 50 land well inside one 250 ms window.
    let mut clock = Ticker::new(100, 10);
    let mut denial = None;
    for step in 1..=20 {
        if let Err(err) = ctx.check_tx(&lkas(step * 50, true), clock.next()) {
            denial = Some((step * 50, err));
            break;
        }
    }
    assert_eq!(
        denial,
        Some((1000, TxDenial::Steering(SteeringViolation::RealTimeDeltaExceeded)))
    );
}

#[test]
/// Without controls only a zero torque passes.
fn test_torque_without_controls() {
    let mut ctx = context(0);
    assert!(ctx.tx(&lkas(0, false), at(10)));
    assert_eq!(
        ctx.check_tx(&lkas(10, true), at(20)),
        Err(TxDenial::Steering(SteeringViolation::NotAllowed))
    );
}

#[test]
/// Nonzero torque with the request bit cleared is denied.
fn test_torque_without_request() {
    let (mut ctx, mut clock) = engaged(0);
    assert_eq!(
        ctx.check_tx(&lkas(30, false), clock.next()),
        Err(TxDenial::Steering(SteeringViolation::InactiveCommand))
    );
    assert!(ctx.tx(&lkas(0, false), clock.next()));
}

#[test]
/// Gas, brake and cruise off each drop the engagement.
fn test_disengagement_sources() {
    let (mut ctx, mut clock) = engaged(0);
    ctx.rx(&frame(0, 0x140, &[1, 0, 0, 0, 0, 0, 0, 0]), clock.next());
    assert!(!ctx.controls_allowed());
    assert!(!ctx.tx(&lkas(20, true), clock.next()));

    let (mut ctx, mut clock) = engaged(0);
    ctx.rx(&frame(0, 0xD1, &[0, 0, 4, 0]), clock.next());
    assert!(ctx.state().brake_pressed());
    assert!(!ctx.controls_allowed());

    let (mut ctx, mut clock) = engaged(0);
    ctx.rx(&cruise(false), clock.next());
    assert!(!ctx.controls_allowed());
}

#[test]
/// ES_Distance is whitelisted without content checks; lengths must match.
fn test_distance_whitelist() {
    let mut ctx = context(0);
    assert!(ctx.tx(&frame(0, 0x161, &[0xFF; 8]), at(10)));
    assert_eq!(
        ctx.check_tx(&frame(0, 0x161, &[0; 4]), at(10)),
        Err(TxDenial::NotWhitelisted)
    );
    assert_eq!(
        ctx.check_tx(&frame(2, 0x164, &[0; 8]), at(10)),
        Err(TxDenial::NotWhitelisted)
    );
}
