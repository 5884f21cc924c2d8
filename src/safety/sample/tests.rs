//! Rolling window behavior: ordering, overwrite, min/max.
use super::*;

#[test]
/// Empty buffer answers nothing.
fn test_empty() {
    let buffer: SampleBuffer = SampleBuffer::new();
    assert!(buffer.is_empty());
    assert_eq!(buffer.latest(), None);
    assert_eq!(buffer.min(), None);
    assert_eq!(buffer.max(), None);
    assert_eq!(buffer.capacity(), MAX_SAMPLE_VALS);
}

#[test]
/// A single push yields one valid entry.
fn test_single_push() {
    let mut buffer: SampleBuffer<4> = SampleBuffer::new();
    buffer.push(-7);
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.latest(), Some(-7));
    assert_eq!(buffer.min(), Some(-7));
    assert_eq!(buffer.max(), Some(-7));
}

#[test]
/// Oldest values are overwritten first and the window stays ordered.
fn test_overwrite_oldest_first() {
    let mut buffer: SampleBuffer<3> = SampleBuffer::new();
    for value in 1..=5 {
        buffer.push(value);
    }
    let mut window = [0; 3];
    for (slot, value) in window.iter_mut().zip(buffer.window()) {
        *slot = value;
    }
    assert_eq!(window, [3, 4, 5]);
    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.latest(), Some(5));
    assert_eq!(buffer.min(), Some(3));
}

#[test]
/// Extremes only consider the window, not evicted values.
fn test_min_max_track_window() {
    let mut buffer: SampleBuffer<2> = SampleBuffer::new();
    buffer.push(100);
    buffer.push(-100);
    assert_eq!((buffer.min(), buffer.max()), (Some(-100), Some(100)));
    buffer.push(0);
    assert_eq!((buffer.min(), buffer.max()), (Some(-100), Some(0)));
    buffer.push(1);
    assert_eq!((buffer.min(), buffer.max()), (Some(0), Some(1)));
}

#[test]
/// Predicate over recent samples.
fn test_any() {
    let mut buffer: SampleBuffer<3> = SampleBuffer::new();
    buffer.push(10);
    buffer.push(20);
    assert!(buffer.any(|v| v > 15));
    assert!(!buffer.any(|v| v > 25));
    buffer.clear();
    assert!(!buffer.any(|_| true));
}
