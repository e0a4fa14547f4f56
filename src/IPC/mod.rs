// Consumer side of the producer's shared-memory telemetry channels

pub mod builder;
pub mod channel;
pub mod cursor;
pub mod freshness;
pub mod layout;
pub mod snapshot;
#[allow(non_snake_case)]
pub mod Schema;

pub use builder::ChannelBuilder;
pub use channel::{Channel, ReadStatus, SharedChannel};
pub use cursor::{Cursor, OverrunPolicy, Value, WireType};
pub use freshness::{Freshness, ProducerTime};
pub use layout::{segment_size, SegmentHeader, HEADER_SIZE, PAYLOAD_OFFSET};
pub use snapshot::Snapshot;
pub use Schema::{Decodable, FieldSpec, FieldType, SchemaInfo, SCHEMAS};
