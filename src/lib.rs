// Module naming follows project convention (Core = OS plumbing, IPC = wire protocol)
#[allow(non_snake_case)]
pub mod Core;
#[allow(non_snake_case)]
pub mod IPC;
#[allow(non_snake_case)]
pub mod Debug {
    pub mod StructDebug;
}

pub mod angle;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod monitor;

pub use config::Config;
pub use context::{ChannelKind, Position, TelemetryContext};
pub use error::{DecodeError, Error, Result, StaleDataWarning};
pub use logging::init_logging;
pub use IPC::{Channel, ChannelBuilder, Decodable, OverrunPolicy, ReadStatus, SharedChannel};
