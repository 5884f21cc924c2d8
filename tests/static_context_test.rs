//! Context living in a `'static` cell, the way firmware holds it.
mod helpers;

use helpers::{at, frame};
use korri_safety::{SafetyContext, SafetyModeId, SafetyOptions};
use static_cell::StaticCell;

static CONTEXT: StaticCell<SafetyContext> = StaticCell::new();

#[test]
/// Hooks work through a `&'static mut` and the no-output default denies all.
fn test_static_context() {
    let ctx: &'static mut SafetyContext = CONTEXT.init(
        SafetyContext::init(
            SafetyModeId::NoOutput.into(),
            0,
            0,
            SafetyOptions::default(),
            at(0),
        )
        .unwrap(),
    );

    assert!(ctx.rx(&frame(0, 0x123, &[1, 2, 3]), at(10)));
    assert!(!ctx.tx(&frame(0, 0x123, &[1, 2, 3]), at(20)));
    ctx.tick(at(5_000));
    assert!(!ctx.rx_checks_invalid());
    assert!(!ctx.controls_allowed());
    assert_eq!(ctx.hooks().id(), SafetyModeId::NoOutput);
}
