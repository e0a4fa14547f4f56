//! Background polling: one worker thread per channel.
//!
//! Workers share a stop flag with the channels' [`CancelToken`](crate::Core::CancelToken),
//! so setting it both ends the polling loops and aborts any semaphore wait in
//! progress.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, StaleDataWarning};
use crate::IPC::channel::{Channel, ReadStatus};
use crate::IPC::layout::SegmentHeader;
use crate::IPC::Schema::Decodable;

/// Longest sleep between stop-flag checks while waiting out a poll interval.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(50);

/// A channel viewed without its record type, for the monitor and the CLI.
pub trait TelemetrySource: Send + Sync {
    fn name(&self) -> String;

    fn record_name(&self) -> &'static str;

    /// Read once.
    fn poll(&self) -> Result<ReadStatus>;

    /// The latest record, formatted.
    fn describe(&self) -> String;

    fn check_stale(&self, threshold: Duration) -> Option<StaleDataWarning>;

    fn header(&self) -> SegmentHeader;

    /// Wall-clock age of the producer's last update.
    fn data_age(&self) -> Duration;

    /// Attached and attach succeeded.
    fn is_available(&self) -> bool;

    /// The persistent attach error, formatted.
    fn attach_error(&self) -> Option<String>;

    fn detach(&self);
}

impl<T: Decodable> TelemetrySource for Mutex<Channel<T>> {
    fn name(&self) -> String {
        self.lock().name().to_string()
    }

    fn record_name(&self) -> &'static str {
        T::RECORD
    }

    fn poll(&self) -> Result<ReadStatus> {
        self.lock().read()
    }

    fn describe(&self) -> String {
        self.lock().record().to_string()
    }

    fn check_stale(&self, threshold: Duration) -> Option<StaleDataWarning> {
        self.lock().check_stale(threshold)
    }

    fn header(&self) -> SegmentHeader {
        *self.lock().header()
    }

    fn data_age(&self) -> Duration {
        self.lock().data_age()
    }

    fn is_available(&self) -> bool {
        self.lock().no_error()
    }

    fn attach_error(&self) -> Option<String> {
        self.lock().error().map(ToString::to_string)
    }

    fn detach(&self) {
        self.lock().detach();
    }
}

/// Per-worker counters, returned when the monitor is joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub channel: String,
    pub polls: u64,
    pub new_samples: u64,
    pub errors: u64,
    pub stale_warnings: u64,
}

/// Polling settings shared by every worker.
#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub stale_after: Duration,
}

/// Running worker threads.
pub struct Monitor {
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<WorkerReport>>,
}

impl Monitor {
    /// Spawn one worker per source. Sources in their error state are skipped.
    pub fn start(
        sources: Vec<Arc<dyn TelemetrySource>>,
        settings: MonitorSettings,
        stop: Arc<AtomicBool>,
    ) -> Result<Self> {
        let mut workers = Vec::with_capacity(sources.len());
        for source in sources {
            let name = source.name();
            if let Some(err) = source.attach_error() {
                warn!(channel = %name, error = %err, "not monitoring unavailable channel");
                continue;
            }

            let stop = Arc::clone(&stop);
            let handle = thread::Builder::new()
                .name(format!("monitor-{name}"))
                .spawn(move || run_worker(source, settings, stop))
                .map_err(Error::Io)?;
            workers.push(handle);
        }

        info!(workers = workers.len(), interval = ?settings.poll_interval, "monitor started");
        Ok(Self { stop, workers })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Set the stop flag and wait for every worker.
    pub fn stop(self) -> Vec<WorkerReport> {
        self.stop.store(true, Ordering::Release);
        self.join()
    }

    /// Wait for the workers to exit on their own (after the stop flag is set elsewhere).
    pub fn join(self) -> Vec<WorkerReport> {
        self.workers
            .into_iter()
            .filter_map(|handle| match handle.join() {
                Ok(report) => Some(report),
                Err(_) => {
                    warn!("monitor worker panicked");
                    None
                }
            })
            .collect()
    }
}

fn run_worker(
    source: Arc<dyn TelemetrySource>,
    settings: MonitorSettings,
    stop: Arc<AtomicBool>,
) -> WorkerReport {
    let mut report = WorkerReport {
        channel: source.name(),
        ..Default::default()
    };
    let mut stale = false;
    debug!(channel = %report.channel, record = source.record_name(), "worker started");

    while !stop.load(Ordering::Acquire) {
        let started = Instant::now();
        report.polls += 1;

        match source.poll() {
            Ok(ReadStatus::NewSample) => {
                report.new_samples += 1;
                stale = false;
                info!(channel = %report.channel, "{}", source.describe());
            }
            Ok(ReadStatus::Unchanged) => {
                // warn once per stale stretch
                match source.check_stale(settings.stale_after) {
                    Some(warning) if !stale => {
                        stale = true;
                        report.stale_warnings += 1;
                        warn!("{warning}");
                    }
                    Some(_) => {}
                    None => stale = false,
                }
            }
            Ok(ReadStatus::Unavailable) => {
                debug!(channel = %report.channel, "channel detached, worker exiting");
                break;
            }
            Err(Error::Cancelled { .. }) => break,
            Err(err) => {
                report.errors += 1;
                warn!(channel = %report.channel, error = %err, "read failed");
            }
        }

        sleep_until_next(started + settings.poll_interval, &stop);
    }

    debug!(channel = %report.channel, polls = report.polls, "worker stopped");
    report
}

fn sleep_until_next(deadline: Instant, stop: &AtomicBool) {
    loop {
        if stop.load(Ordering::Acquire) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(std::cmp::min(deadline - now, STOP_CHECK_SLICE));
    }
}
