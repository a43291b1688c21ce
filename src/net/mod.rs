//! Snapshot wire format and transport plumbing

pub mod protocol;
pub mod schema;
pub mod transport;

pub use protocol::{Frame, ProtocolError, StreamValue, ValueType};
pub use schema::{FieldKind, SchemaVersion, SnapshotRecord, SnapshotSchema};
pub use transport::{ChannelTransport, Transport};
