// POSIX shared memory + named semaphore tests for Linux.
// Each test publishes its own segment through the test producer and unlinks it afterwards.
// Run with: cargo test --test shared_memory -- --nocapture
mod common;

#[cfg(target_os = "linux")]
mod linux_tests {
    use std::time::{Duration, Instant};

    use serial_test::serial;

    use super::common::{unique_name, PayloadWriter, TestProducer};
    use smipc_telemetry::Core::{attach_shared_memory, NamedSemaphore, PosixSegment, RawHandle, SegmentSource, WaitPolicy};
    use smipc_telemetry::IPC::Schema::{GgaFix, LogFilename, ReceiverVelocity};
    use smipc_telemetry::IPC::{segment_size, Channel, ChannelBuilder, ReadStatus};
    use smipc_telemetry::{Decodable, Error};

    #[test]
    #[serial]
    fn test_attach_nonexistent_segment() {
        let name = unique_name("absent");
        let mut channel = Channel::<GgaFix>::attach_named(&name);

        assert!(!channel.no_error());
        assert!(matches!(channel.error(), Some(Error::Attach { .. })));
        assert!(channel.error().unwrap().is_attach_error());

        // reads are safe no-ops returning the zeroed record
        assert_eq!(channel.read().unwrap(), ReadStatus::Unavailable);
        assert_eq!(channel.read().unwrap(), ReadStatus::Unavailable);
        assert_eq!(channel.record(), &GgaFix::default());
    }

    #[test]
    #[serial]
    fn test_attach_without_semaphore() {
        let name = unique_name("nosem");
        let _producer = TestProducer::create_without_semaphore(&name, segment_size(GgaFix::PAYLOAD_SIZE));

        let channel = Channel::<GgaFix>::attach_named(&name);
        assert!(!channel.no_error());
        assert!(matches!(channel.error(), Some(Error::Semaphore { name: n, .. }) if n == &format!("SEM_{name}")));
    }

    #[test]
    #[serial]
    fn test_attach_segment_too_small() {
        let name = unique_name("small");
        let _producer = TestProducer::create(&name, 32);

        let channel = Channel::<GgaFix>::attach_named(&name);
        assert!(matches!(
            channel.error(),
            Some(Error::SegmentTooSmall { expected: 106, actual: 32, .. })
        ));
    }

    #[test]
    #[serial]
    fn test_mapping_is_exact_size() {
        let name = unique_name("map");
        let _producer = TestProducer::create(&name, 4096);

        let shm = attach_shared_memory(&name, 140).unwrap();
        assert_eq!(shm.size(), 140);
        assert!(!shm.as_ptr().is_null());
        match shm.raw_handle() {
            RawHandle::Fd(fd) => assert!(fd > 0, "File descriptor should be positive"),
        }
    }

    #[test]
    #[serial]
    fn test_read_published_sample() {
        let name = unique_name("vel");
        let producer = TestProducer::create(&name, segment_size(ReceiverVelocity::PAYLOAD_SIZE));
        producer.write(
            &PayloadWriter::header(20, 1_700_000_000, 500)
                .f32(1.0)
                .f32(2.0)
                .f32(3.0)
                .f32(0.1)
                .f32(42.0)
                .finish(),
        );

        let mut channel = Channel::<ReceiverVelocity>::attach_named(&name);
        assert!(channel.no_error(), "{:?}", channel.error());
        assert_eq!(channel.read().unwrap(), ReadStatus::NewSample);
        assert_eq!(channel.record().north, 2.0);
        assert_eq!(channel.record().fix_time, 42.0);
        assert_eq!(channel.header().length, 20);
        assert_eq!(channel.read().unwrap(), ReadStatus::Unchanged);

        // the semaphore is back at 1 after each read
        assert_eq!(producer.semaphore_value(), 1);
    }

    #[test]
    #[serial]
    fn test_held_semaphore_is_unresponsive() {
        let name = unique_name("held");
        let producer = TestProducer::create(&name, segment_size(ReceiverVelocity::PAYLOAD_SIZE));
        let mut channel: Channel<ReceiverVelocity> = ChannelBuilder::new()
            .with_name(name.clone())
            .with_timeout(Duration::from_millis(30))
            .build();
        assert!(channel.no_error());

        let held = producer.hold();
        let started = Instant::now();
        let err = channel.read().unwrap_err();
        assert!(matches!(err, Error::ProducerUnresponsive { .. }), "{err}");
        assert!(started.elapsed() >= Duration::from_millis(30));
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(held);

        // nothing was posted on the producer's behalf
        assert_eq!(producer.semaphore_value(), 1);
        assert!(channel.read().is_ok());
    }

    #[test]
    #[serial]
    fn test_filename_over_posix() {
        let name = unique_name("file");
        let producer = TestProducer::create(&name, segment_size(LogFilename::PAYLOAD_SIZE));
        let text = b"log_0007.h5\0";
        producer.write(
            &PayloadWriter::header(512, 5, 0)
                .bytes(text)
                .zeros(512 - text.len())
                .finish(),
        );

        let mut channel = Channel::<LogFilename>::attach_named(&name);
        channel.read().unwrap();
        assert_eq!(channel.record().name, "log_0007.h5");
    }

    #[test]
    #[serial]
    fn test_detach_releases_resources() {
        let name = unique_name("detach");
        let producer = TestProducer::create(&name, segment_size(ReceiverVelocity::PAYLOAD_SIZE));

        let mut channel = Channel::<ReceiverVelocity>::attach_named(&name);
        assert!(channel.no_error());
        channel.detach();
        channel.detach();
        assert!(!channel.no_error());
        assert_eq!(channel.read().unwrap(), ReadStatus::Unavailable);
        assert_eq!(producer.semaphore_value(), 1);
    }

    #[test]
    #[serial]
    fn test_segment_copy_and_semaphore_open() {
        let name = unique_name("seg");
        let producer = TestProducer::create(&name, 48);
        producer.write(&[7u8; 48]);

        let segment = PosixSegment::attach(&name, 48).unwrap();
        assert_eq!(segment.name(), name);
        let mut dst = vec![0u8; 48];
        segment.copy_into(&mut dst, &WaitPolicy::default()).unwrap();
        assert_eq!(dst, vec![7u8; 48]);

        let sem = NamedSemaphore::open(&format!("SEM_{name}")).unwrap();
        assert!(sem.try_acquire().unwrap());
        assert!(!sem.try_acquire().unwrap());
        drop(sem);
        // closing a handle does not post; the producer still sees it taken
        assert_eq!(producer.semaphore_value(), 0);
    }
}
