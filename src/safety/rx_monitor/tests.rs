//! Shape matching, alternative tracking, integrity scoring and staleness.
use super::*;
use crate::core::MessageSpec;

static RELAXED: [RxCheckSet; 2] = [
    RxCheckSet::single(MessageSpec::relaxed(0x2, 0, 5, 100)),
    RxCheckSet::pair(
        MessageSpec::relaxed(0x15c, 0, 8, 50),
        MessageSpec::relaxed(0x239, 0, 8, 50),
    ),
];

static COUNTED: [RxCheckSet; 1] =
    [RxCheckSet::single(MessageSpec::new(0x100, 0, 8, 100).with_max_counter(15))];

static COUNTED_BOTH_BUSES: [RxCheckSet; 1] = [RxCheckSet::pair(
    MessageSpec::new(0x100, 0, 8, 100).with_max_counter(15),
    MessageSpec::new(0x100, 1, 8, 100).with_max_counter(15),
)];

/// Counter in the low nibble of byte 7, checksum in byte 6 (sum of bytes 0..6),
/// quality flag bit 0 of byte 5.
struct Fields;

impl FrameIntegrity for Fields {
    fn counter(&self, frame: &CanFrame) -> Option<u8> {
        Some(frame.data.0[7] & 0x0F)
    }

    fn checksum(&self, frame: &CanFrame) -> Option<(u32, u32)> {
        let computed = frame.data.0[..6]
            .iter()
            .fold(0u8, |acc, byte| acc.wrapping_add(*byte));
        Some((frame.data.0[6] as u32, computed as u32))
    }

    fn quality_flag(&self, frame: &CanFrame) -> Option<bool> {
        Some(frame.data.0[5] & 1 == 1)
    }
}

fn frame(bus: u8, address: u32, len: usize) -> CanFrame {
    CanFrame::on_bus(bus, address, &[0u8; 8][..len]).unwrap()
}

/// Well-formed frame for `COUNTED`: quality ok, checksum matching.
fn counted(counter: u8) -> CanFrame {
    counted_on(0, counter)
}

fn counted_on(bus: u8, counter: u8) -> CanFrame {
    let mut data = [0u8; 8];
    data[5] = 1;
    data[6] = 1;
    data[7] = counter;
    CanFrame::on_bus(bus, 0x100, &data).unwrap()
}

fn at(ms: u64) -> Instant {
    Instant::from_millis(ms)
}

#[test]
/// Address, bus and length must all match.
fn test_shape_matching() {
    let mut monitor = RxMonitor::new(&RELAXED);
    assert_eq!(
        monitor.check(&frame(0, 0x2, 5), at(0), &()),
        RxVerdict::Valid { set: 0 }
    );
    assert_eq!(monitor.check(&frame(1, 0x2, 5), at(0), &()), RxVerdict::Untracked);
    assert_eq!(monitor.check(&frame(0, 0x2, 8), at(0), &()), RxVerdict::Untracked);
    assert_eq!(monitor.check(&frame(0, 0x3, 5), at(0), &()), RxVerdict::Untracked);
}

#[test]
/// Every alternative stays tracked; the last one seen is active.
fn test_every_alternative_tracked() {
    let mut monitor = RxMonitor::new(&RELAXED);
    assert_eq!(monitor.status(1).and_then(RxStatus::active), None);
    assert_eq!(
        monitor.check(&frame(0, 0x239, 8), at(0), &()),
        RxVerdict::Valid { set: 1 }
    );
    assert_eq!(monitor.status(1).and_then(RxStatus::active), Some(1));
    assert_eq!(
        monitor.check(&frame(0, 0x15c, 8), at(1), &()),
        RxVerdict::Valid { set: 1 }
    );
    assert_eq!(monitor.status(1).and_then(RxStatus::active), Some(0));
    assert!(monitor.status(2).is_none());
}

#[test]
/// Counters of two alternatives are followed separately.
fn test_counters_per_alternative() {
    let mut monitor = RxMonitor::new(&COUNTED_BOTH_BUSES);
    for counter in 0..4u8 {
        let t = counter as u64 * 10;
        assert!(monitor.check(&counted_on(0, counter), at(t), &Fields).is_valid());
        // Bus 1 counts down, every step after the first is wrong.
        assert!(monitor.check(&counted_on(1, 15 - counter), at(t + 5), &Fields).is_valid());
    }
    assert_eq!(monitor.status(0).map(RxStatus::wrong_counters), Some(3));

    // Interleaving never disturbed the bus 0 sequence.
    assert!(monitor.check(&counted_on(0, 4), at(40), &Fields).is_valid());
    assert_eq!(monitor.status(0).map(RxStatus::wrong_counters), Some(0));

    assert!(monitor.check(&counted_on(1, 11), at(45), &Fields).is_valid());
    assert_eq!(
        monitor.check(&counted_on(1, 10), at(50), &Fields),
        RxVerdict::Invalid {
            set: 0,
            fault: RxFault::Counter
        }
    );
}

#[test]
/// In-sequence counters keep the score at zero, including the wrap.
fn test_counter_sequence_with_wrap() {
    let mut monitor = RxMonitor::new(&COUNTED);
    for (step, counter) in (10..16).chain(0..4).enumerate() {
        let verdict = monitor.check(&counted(counter), at(step as u64 * 10), &Fields);
        assert_eq!(verdict, RxVerdict::Valid { set: 0 });
    }
    assert_eq!(monitor.status(0).map(RxStatus::wrong_counters), Some(0));
}

#[test]
/// Wrong counters accumulate up to the limit and recover one step at a time.
fn test_counter_score_saturates_and_recovers() {
    let mut monitor = RxMonitor::new(&COUNTED);
    monitor.check(&counted(0), at(0), &Fields);
    for step in 1..=MAX_WRONG_COUNTERS as u64 {
        // Repeating the same counter is always wrong.
        monitor.check(&counted(0), at(step), &Fields);
    }
    assert_eq!(
        monitor.check(&counted(0), at(10), &Fields),
        RxVerdict::Invalid {
            set: 0,
            fault: RxFault::Counter
        }
    );
    assert_eq!(
        monitor.status(0).map(RxStatus::wrong_counters),
        Some(MAX_WRONG_COUNTERS)
    );

    // One correct counter brings the score back under the limit.
    assert!(monitor.check(&counted(1), at(11), &Fields).is_valid());
    assert_eq!(
        monitor.status(0).map(RxStatus::wrong_counters),
        Some(MAX_WRONG_COUNTERS - 1)
    );
    assert!(monitor.check(&counted(2), at(12), &Fields).is_valid());
    assert_eq!(
        monitor.status(0).map(RxStatus::wrong_counters),
        Some(MAX_WRONG_COUNTERS - 2)
    );
}

#[test]
/// Bad checksum and bad quality flag invalidate the frame.
fn test_checksum_and_quality_faults() {
    let mut monitor = RxMonitor::new(&COUNTED);
    let mut data = [0u8; 8];
    data[5] = 1;
    data[6] = 2;
    let bad_checksum = CanFrame::on_bus(0, 0x100, &data).unwrap();
    assert_eq!(
        monitor.check(&bad_checksum, at(0), &Fields),
        RxVerdict::Invalid {
            set: 0,
            fault: RxFault::Checksum
        }
    );

    let mut monitor = RxMonitor::new(&COUNTED);
    let bad_quality = CanFrame::on_bus(0, 0x100, &[0u8; 8]).unwrap();
    assert_eq!(
        monitor.check(&bad_quality, at(0), &Fields),
        RxVerdict::Invalid {
            set: 0,
            fault: RxFault::QualityFlag
        }
    );
}

#[test]
/// Enabled checks without an extractor fail closed.
fn test_missing_extractors_fail_closed() {
    let mut monitor = RxMonitor::new(&COUNTED);
    assert!(!monitor.check(&counted(0), at(0), &()).is_valid());
    assert!(monitor.any_invalid());
}

#[test]
/// Threshold is ten periods, never below one second.
fn test_lag_threshold() {
    assert_eq!(lag_threshold(100), Duration::from_secs(1));
    assert_eq!(lag_threshold(5), Duration::from_secs(2));
    assert_eq!(lag_threshold(1), Duration::from_secs(10));
    assert_eq!(lag_threshold(0), MIN_LAG_THRESHOLD);
}

#[test]
/// Unseen sets go stale relative to start; a new frame clears the lag.
fn test_tick_staleness() {
    let mut monitor = RxMonitor::new(&RELAXED);
    assert!(!monitor.tick(at(1_000), at(0)));
    assert!(monitor.tick(at(1_001), at(0)));

    monitor.check(&frame(0, 0x2, 5), at(1_100), &());
    monitor.check(&frame(0, 0x15c, 8), at(1_100), &());
    assert!(!monitor.tick(at(1_200), at(0)));
    assert!(!monitor.any_invalid());

    assert!(monitor.tick(at(2_101), at(0)));
    assert_eq!(monitor.status(0).map(RxStatus::lagging), Some(true));
}
