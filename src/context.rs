//! Application context: every telemetry channel, attached once at startup
//! and handed to whoever needs it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::{Config, GgaLayout};
use crate::error::{Error, Result};
use crate::monitor::TelemetrySource;
use crate::Core::semaphore::CancelToken;
use crate::IPC::channel::SharedChannel;
use crate::IPC::Schema::{
    CommandBlock, CourseSpeed, Decodable, FixVelocity, GgaFix, ImuSample, LegacyGgaFix, LogFilename,
    ReceiverPosition, ReceiverStatus, ReceiverVelocity, SatelliteStatus,
};
use crate::IPC::{ChannelBuilder, ReadStatus};

/// The producer channels the reader knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Gga,
    Vtg,
    Gsa,
    Rmc,
    Imu,
    GpsPosition,
    GpsVelocity,
    GpsSolution,
    GpsFilename,
    GpsCommands,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 10] = [
        Self::Gga,
        Self::Vtg,
        Self::Gsa,
        Self::Rmc,
        Self::Imu,
        Self::GpsPosition,
        Self::GpsVelocity,
        Self::GpsSolution,
        Self::GpsFilename,
        Self::GpsCommands,
    ];

    /// Segment name the producer publishes under.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gga => GgaFix::CHANNEL,
            Self::Vtg => CourseSpeed::CHANNEL,
            Self::Gsa => SatelliteStatus::CHANNEL,
            Self::Rmc => FixVelocity::CHANNEL,
            Self::Imu => ImuSample::CHANNEL,
            Self::GpsPosition => ReceiverPosition::CHANNEL,
            Self::GpsVelocity => ReceiverVelocity::CHANNEL,
            Self::GpsSolution => ReceiverStatus::CHANNEL,
            Self::GpsFilename => LogFilename::CHANNEL,
            Self::GpsCommands => CommandBlock::CHANNEL,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChannelKind {
    type Err = Error;

    /// Segment names match case-insensitively, with or without a leading slash.
    fn from_str(s: &str) -> Result<Self> {
        let bare = s.trim().trim_start_matches('/');
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(bare))
            .ok_or_else(|| Error::UnknownChannel(s.to_string()))
    }
}

/// The GGA channel in whichever layout the producer writes.
#[derive(Clone)]
pub enum GgaChannel {
    Current(SharedChannel<GgaFix>),
    Legacy(SharedChannel<LegacyGgaFix>),
}

impl GgaChannel {
    /// The latest fix, if the channel is attached.
    pub fn fix(&self) -> Option<GgaFix> {
        match self {
            Self::Current(ch) => {
                let ch = ch.lock();
                ch.no_error().then(|| ch.record().clone())
            }
            Self::Legacy(ch) => {
                let ch = ch.lock();
                ch.no_error().then(|| ch.record().0.clone())
            }
        }
    }

    fn source(&self) -> Arc<dyn TelemetrySource> {
        match self {
            Self::Current(ch) => ch.clone(),
            Self::Legacy(ch) => ch.clone(),
        }
    }
}

/// Where a [`Position`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    /// TSIP receiver position record.
    Receiver,
    /// NMEA GGA fix.
    Gga,
    /// Configured fallback; no receiver is publishing a usable fix.
    Fallback,
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
    pub source: PositionSource,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6}, {:.6} @ {:.1} m ({:?})",
            self.latitude_deg, self.longitude_deg, self.altitude_m, self.source
        )
    }
}

/// Every telemetry channel, attached once.
///
/// Channels whose producer is not running stay in their error state; readers
/// of this context see zeroed records from them and position falls back to
/// the configured coordinate.
pub struct TelemetryContext {
    pub gga: GgaChannel,
    pub vtg: SharedChannel<CourseSpeed>,
    pub gsa: SharedChannel<SatelliteStatus>,
    pub rmc: SharedChannel<FixVelocity>,
    pub imu: SharedChannel<ImuSample>,
    pub position: SharedChannel<ReceiverPosition>,
    pub velocity: SharedChannel<ReceiverVelocity>,
    pub solution: SharedChannel<ReceiverStatus>,
    pub filename: SharedChannel<LogFilename>,
    pub commands: SharedChannel<CommandBlock>,
    fallback: Position,
    stale_after: Duration,
}

fn builder(config: &Config, cancel: &CancelToken) -> ChannelBuilder {
    ChannelBuilder::new()
        .with_timeout(config.read_timeout())
        .with_policy(config.read.overrun_policy)
        .with_cancel(cancel.clone())
}

fn shared<T: Decodable>(config: &Config, cancel: &CancelToken) -> SharedChannel<T> {
    builder(config, cancel).build::<T>().into_shared()
}

/// Attach a single channel without building a whole context.
pub fn attach_source(kind: ChannelKind, config: &Config, cancel: &CancelToken) -> Arc<dyn TelemetrySource> {
    match kind {
        ChannelKind::Gga => match config.read.gga_layout {
            GgaLayout::Current => shared::<GgaFix>(config, cancel),
            GgaLayout::Legacy => shared::<LegacyGgaFix>(config, cancel),
        },
        ChannelKind::Vtg => shared::<CourseSpeed>(config, cancel),
        ChannelKind::Gsa => shared::<SatelliteStatus>(config, cancel),
        ChannelKind::Rmc => shared::<FixVelocity>(config, cancel),
        ChannelKind::Imu => shared::<ImuSample>(config, cancel),
        ChannelKind::GpsPosition => shared::<ReceiverPosition>(config, cancel),
        ChannelKind::GpsVelocity => shared::<ReceiverVelocity>(config, cancel),
        ChannelKind::GpsSolution => shared::<ReceiverStatus>(config, cancel),
        ChannelKind::GpsFilename => shared::<LogFilename>(config, cancel),
        ChannelKind::GpsCommands => shared::<CommandBlock>(config, cancel),
    }
}

impl TelemetryContext {
    /// Attach every channel using the read settings in `config`.
    ///
    /// `cancel` aborts in-flight semaphore waits on all channels at once.
    pub fn attach(config: &Config, cancel: CancelToken) -> Self {
        let gga = match config.read.gga_layout {
            GgaLayout::Current => GgaChannel::Current(shared(config, &cancel)),
            GgaLayout::Legacy => GgaChannel::Legacy(shared(config, &cancel)),
        };

        let context = Self {
            gga,
            vtg: shared(config, &cancel),
            gsa: shared(config, &cancel),
            rmc: shared(config, &cancel),
            imu: shared(config, &cancel),
            position: shared(config, &cancel),
            velocity: shared(config, &cancel),
            solution: shared(config, &cancel),
            filename: shared(config, &cancel),
            commands: shared(config, &cancel),
            fallback: Position {
                latitude_deg: config.fallback.latitude_deg,
                longitude_deg: config.fallback.longitude_deg,
                altitude_m: config.fallback.altitude_m,
                source: PositionSource::Fallback,
            },
            stale_after: config.stale_after(),
        };

        let attached = ChannelKind::ALL
            .into_iter()
            .filter(|kind| context.source(*kind).is_available())
            .count();
        info!(attached, total = ChannelKind::ALL.len(), "telemetry context ready");
        context
    }

    /// Type-erased handle for one channel.
    pub fn source(&self, kind: ChannelKind) -> Arc<dyn TelemetrySource> {
        match kind {
            ChannelKind::Gga => self.gga.source(),
            ChannelKind::Vtg => self.vtg.clone(),
            ChannelKind::Gsa => self.gsa.clone(),
            ChannelKind::Rmc => self.rmc.clone(),
            ChannelKind::Imu => self.imu.clone(),
            ChannelKind::GpsPosition => self.position.clone(),
            ChannelKind::GpsVelocity => self.velocity.clone(),
            ChannelKind::GpsSolution => self.solution.clone(),
            ChannelKind::GpsFilename => self.filename.clone(),
            ChannelKind::GpsCommands => self.commands.clone(),
        }
    }

    /// Handles for the given channels, in order.
    pub fn sources(&self, kinds: &[ChannelKind]) -> Vec<Arc<dyn TelemetrySource>> {
        kinds.iter().map(|kind| self.source(*kind)).collect()
    }

    /// Read every attached channel once. Per-channel failures are logged and skipped.
    pub fn refresh_all(&self) -> usize {
        let mut fresh = 0;
        for kind in ChannelKind::ALL {
            match self.source(kind).poll() {
                Ok(ReadStatus::NewSample) => fresh += 1,
                Ok(_) => {}
                Err(err) => warn!(channel = %kind, error = %err, "read failed"),
            }
        }
        fresh
    }

    /// Current position: the receiver's fix if valid, else the GGA fix if it
    /// has one, else the configured fallback.
    pub fn position(&self) -> Position {
        {
            let ch = self.position.lock();
            let rec = ch.record();
            if ch.no_error() && rec.valid && !ch.last_update_time().is_zero() {
                return Position {
                    latitude_deg: rec.latitude.to_degrees(),
                    longitude_deg: rec.longitude.to_degrees(),
                    altitude_m: rec.altitude,
                    source: PositionSource::Receiver,
                };
            }
        }

        if let Some(fix) = self.gga.fix().filter(|fix| fix.fix_quality().has_fix()) {
            return Position {
                latitude_deg: fix.latitude_deg(),
                longitude_deg: fix.longitude_deg(),
                altitude_m: fix.altitude,
                source: PositionSource::Gga,
            };
        }

        self.fallback
    }

    pub fn fallback_position(&self) -> Position {
        self.fallback
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Detach every channel.
    pub fn detach_all(&self) {
        for kind in ChannelKind::ALL {
            self.source(kind).detach();
        }
    }
}
