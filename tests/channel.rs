// Channel read semantics against an in-process segment standing in for the producer.
mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::PayloadWriter;
use smipc_telemetry::Core::{CancelToken, MemorySegment};
use smipc_telemetry::IPC::Schema::{ImuSample, ReceiverPosition, ReceiverVelocity};
use smipc_telemetry::IPC::{segment_size, Channel, ChannelBuilder, OverrunPolicy, ProducerTime, ReadStatus};
use smipc_telemetry::{DecodeError, Decodable, Error};

fn velocity(sec: i64, nsec: i64, east: f32) -> Vec<u8> {
    PayloadWriter::header(ReceiverVelocity::PAYLOAD_SIZE as u64, sec, nsec)
        .f32(east)
        .f32(0.5)
        .f32(-0.25)
        .f32(0.0)
        .f32(100.0)
        .finish()
}

fn velocity_channel() -> (MemorySegment, Channel<ReceiverVelocity>) {
    let segment = MemorySegment::new(
        ReceiverVelocity::CHANNEL,
        segment_size(ReceiverVelocity::PAYLOAD_SIZE),
    );
    let channel = Channel::from_source(Box::new(segment.clone()));
    (segment, channel)
}

#[test]
fn test_unchanged_timestamp_is_idempotent() {
    let (segment, mut channel) = velocity_channel();
    segment.publish(&velocity(500, 0, 3.0));

    assert_eq!(channel.read().unwrap(), ReadStatus::NewSample);
    let first = channel.record().clone();

    assert_eq!(channel.read().unwrap(), ReadStatus::Unchanged);
    assert!(!channel.is_new_sample());
    assert_eq!(channel.record(), &first);
    assert_eq!(channel.last_read_time(), ProducerTime::new(500, 0));
}

#[test]
fn test_advancing_timestamp_is_new_once() {
    let (segment, mut channel) = velocity_channel();

    for step in 1..=5i64 {
        segment.publish(&velocity(1_000 + step, 0, step as f32));
        assert_eq!(channel.read().unwrap(), ReadStatus::NewSample);
        assert_eq!(channel.last_read_time(), ProducerTime::new(1_000 + step, 0));
        assert_eq!(channel.record().east, step as f32);

        assert_eq!(channel.read().unwrap(), ReadStatus::Unchanged);
    }
}

#[test]
fn test_nanosecond_advance_counts() {
    let (segment, mut channel) = velocity_channel();
    segment.publish(&velocity(10, 1, 1.0));
    channel.read().unwrap();
    segment.publish(&velocity(10, 2, 1.0));
    assert_eq!(channel.read().unwrap(), ReadStatus::NewSample);
}

#[test]
fn test_never_written_segment_is_not_new() {
    let (_segment, mut channel) = velocity_channel();
    assert_eq!(channel.read().unwrap(), ReadStatus::Unchanged);
    assert_eq!(channel.record(), &ReceiverVelocity::default());
    assert!(channel.last_update_time().is_zero());
}

#[test]
fn test_held_segment_times_out() {
    let (segment, _) = velocity_channel();
    let mut channel: Channel<ReceiverVelocity> = ChannelBuilder::new()
        .with_timeout(Duration::from_millis(20))
        .build_from_source(Box::new(segment.clone()));
    segment.publish(&velocity(7, 0, 9.0));
    channel.read().unwrap();

    let held = segment.hold();
    let started = Instant::now();
    let err = channel.read().unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert!(started.elapsed() < Duration::from_secs(2));
    drop(held);

    // the channel is still usable and kept its record
    assert!(channel.no_error());
    assert_eq!(channel.record().east, 9.0);
    assert_eq!(channel.read().unwrap(), ReadStatus::Unchanged);
}

#[test]
fn test_cancel_aborts_wait() {
    let (segment, _) = velocity_channel();
    let token = CancelToken::new();
    let mut channel: Channel<ReceiverVelocity> = ChannelBuilder::new()
        .with_timeout(Duration::from_secs(30))
        .with_cancel(token.clone())
        .build_from_source(Box::new(segment.clone()));

    let held = segment.hold();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        token.cancel();
    });

    let started = Instant::now();
    let err = channel.read().unwrap_err();
    assert!(matches!(err, Error::Cancelled { ref name } if name == "GPS_Velocity"));
    assert!(started.elapsed() < Duration::from_secs(5));
    drop(held);
    canceller.join().unwrap();
}

#[test]
fn test_detach_twice_then_read_is_noop() {
    let (segment, mut channel) = velocity_channel();
    segment.publish(&velocity(3, 0, 4.0));
    channel.read().unwrap();

    channel.detach();
    channel.detach();
    assert_eq!(channel.read().unwrap(), ReadStatus::Unavailable);
    assert_eq!(channel.record().east, 4.0);
}

#[test]
fn test_strict_overrun_keeps_trailing_fields() {
    // segment cut short: header plus the three f64 coordinates only
    let short = segment_size(24);
    let segment = MemorySegment::new("GPS_Position", short);
    let mut channel = Channel::<ReceiverPosition>::from_source(Box::new(segment.clone()));

    segment.publish(
        &PayloadWriter::header(36, 2, 0)
            .f64(0.7)
            .f64(-1.2)
            .f64(50.0)
            .finish(),
    );
    let err = channel.read().unwrap_err();
    assert_eq!(
        err.decode_error(),
        Some(&DecodeError::BufferOverrun {
            offset: 64,
            needed: 4,
            available: 0
        })
    );
    // decoded prefix is new, the rest keeps its previous (zero) values
    assert_eq!(channel.record().latitude, 0.7);
    assert_eq!(channel.record().altitude, 50.0);
    assert_eq!(channel.record().clock_bias, 0.0);
    assert!(!channel.record().valid);
}

#[test]
fn test_failed_decode_still_consumes_timestamp() {
    let segment = MemorySegment::new("GPS_Position", segment_size(24));
    let mut channel = Channel::<ReceiverPosition>::from_source(Box::new(segment.clone()));
    segment.publish(&PayloadWriter::header(36, 5, 0).f64(0.1).f64(0.2).f64(3.0).finish());

    assert!(channel.read().is_err());
    assert!(channel.is_new_sample());
    assert_eq!(channel.last_read_time(), ProducerTime::new(5, 0));

    // same timestamp: the decode still fails, but the sample was already seen
    let err = channel.read().unwrap_err();
    assert!(err.decode_error().is_some());
    assert!(!channel.is_new_sample());

    segment.publish(&PayloadWriter::header(36, 6, 0).f64(0.1).f64(0.2).f64(3.0).finish());
    assert!(channel.read().is_err());
    assert!(channel.is_new_sample());
}

#[test]
fn test_lenient_overrun_is_counted() {
    let segment = MemorySegment::new("IMU", segment_size(16));
    let mut channel: Channel<ImuSample> = ChannelBuilder::new()
        .with_policy(OverrunPolicy::Lenient)
        .build_from_source(Box::new(segment.clone()));
    segment.publish(&PayloadWriter::header(100, 9, 0).i64(9).i64(1).finish());

    assert_eq!(channel.read().unwrap(), ReadStatus::NewSample);
    assert_eq!(channel.record().read_time, ProducerTime::new(9, 1));
    assert_eq!(channel.record().acceleration, [0.0; 3]);
    assert!(!channel.record().success);
    // 10 f64 + success byte + reserved skip
    assert_eq!(channel.last_overruns(), 12);
}

#[test]
fn test_write_is_rejected() {
    let (_segment, mut channel) = velocity_channel();
    assert!(matches!(
        channel.write(&ReceiverVelocity::default()),
        Err(Error::WriteUnsupported { .. })
    ));
}

#[test]
fn test_shared_channel_across_threads() {
    let (segment, channel) = velocity_channel();
    segment.publish(&velocity(42, 0, 1.25));
    let shared = channel.into_shared();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            thread::spawn(move || shared.lock().read().unwrap())
        })
        .collect();
    let statuses: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(
        statuses.iter().filter(|s| **s == ReadStatus::NewSample).count(),
        1
    );
    assert_eq!(shared.lock().record().east, 1.25);
}
