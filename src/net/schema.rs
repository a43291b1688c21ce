//! Versioned snapshot schema
//!
//! A snapshot is a flat, positional value sequence: the receiver only knows
//! what a value means from its index. The schema is therefore derived once
//! from an entity's capabilities and a version, and both sides walk the same
//! field list. Version 1 reproduces the legacy per-variant field orders
//! exactly; later versions only ever append fields.
//!
//! One-shot triggers are encoded as [`FieldKind::Event`] entries, separate
//! from continuous state. An event lost in transit is not redelivered.

use nalgebra::{UnitQuaternion, Vector3};
use uuid::Uuid;

use crate::config::Capabilities;
use crate::game::{EntityState, Event, EventSet};

use super::protocol::{Frame, ProtocolError, StreamValue, ValueType, MAX_FRAME_FIELDS};

/// Non-part fields in the widest layout: pose, blend, flags and both events
const MAX_FIXED_FIELDS: usize = 9;

/// Part rotations that still fit in one frame next to every other field
pub const MAX_PART_COUNT: usize = MAX_FRAME_FIELDS - MAX_FIXED_FIELDS;

/// Snapshot layout version carried in every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SchemaVersion {
    /// Legacy field orders, no jump event
    V1 = 1,
    /// V1 plus a trailing jump event
    V2 = 2,
}

impl TryFrom<u8> for SchemaVersion {
    type Error = ProtocolError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(SchemaVersion::V1),
            2 => Ok(SchemaVersion::V2),
            other => Err(ProtocolError::UnsupportedVersion(other)),
        }
    }
}

/// Meaning of one positional field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Position,
    Rotation,
    /// World rotation of a cosmetic part; 0 is the body model
    PartRotation(u8),
    BlendX,
    BlendY,
    Grounded,
    VerticalVelocity,
    Crouching,
    /// One-shot trigger, true only in the snapshot that captured it
    Event(Event),
}

impl FieldKind {
    pub fn value_type(self) -> ValueType {
        match self {
            FieldKind::Position => ValueType::Vec3,
            FieldKind::Rotation | FieldKind::PartRotation(_) => ValueType::Quat,
            FieldKind::BlendX | FieldKind::BlendY | FieldKind::VerticalVelocity => {
                ValueType::Float
            }
            FieldKind::Grounded | FieldKind::Crouching | FieldKind::Event(_) => ValueType::Bool,
        }
    }
}

/// Continuous state plus the events captured since the previous snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub state: EntityState,
    pub events: EventSet,
}

/// Field list shared by the writer and every reader of one entity
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotSchema {
    version: SchemaVersion,
    part_count: usize,
    fields: Vec<FieldKind>,
}

impl SnapshotSchema {
    pub fn new(version: SchemaVersion, caps: Capabilities) -> Self {
        let mut fields = vec![FieldKind::Position, FieldKind::Rotation];
        for part in 0..caps.part_count() {
            fields.push(FieldKind::PartRotation(part as u8));
        }
        fields.extend([FieldKind::BlendX, FieldKind::BlendY, FieldKind::Grounded]);
        if caps.replicates_vertical_velocity {
            fields.push(FieldKind::VerticalVelocity);
        }
        if caps.supports_crouch {
            fields.push(FieldKind::Crouching);
        }
        if caps.supports_attack {
            fields.push(FieldKind::Event(Event::Attack));
        }
        if version >= SchemaVersion::V2 {
            fields.push(FieldKind::Event(Event::Jump));
        }

        Self {
            version,
            part_count: caps.part_count(),
            fields,
        }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    /// Events this schema can carry; others never leave the authority
    pub fn carries(&self, event: Event) -> bool {
        self.fields.contains(&FieldKind::Event(event))
    }

    /// Write `record` as the positional value sequence
    pub fn encode(&self, record: &SnapshotRecord) -> Vec<StreamValue> {
        let state = &record.state;
        self.fields
            .iter()
            .map(|field| match *field {
                FieldKind::Position => StreamValue::Vec3(state.position),
                FieldKind::Rotation => StreamValue::Quat(state.rotation),
                FieldKind::PartRotation(index) => StreamValue::Quat(
                    state
                        .parts
                        .get(index as usize)
                        .copied()
                        .unwrap_or_else(UnitQuaternion::identity),
                ),
                FieldKind::BlendX => StreamValue::Float(state.blend.x),
                FieldKind::BlendY => StreamValue::Float(state.blend.y),
                FieldKind::Grounded => StreamValue::Bool(state.grounded),
                FieldKind::VerticalVelocity => StreamValue::Float(state.vertical_velocity),
                FieldKind::Crouching => StreamValue::Bool(state.crouching),
                FieldKind::Event(event) => StreamValue::Bool(record.events.contains(event)),
            })
            .collect()
    }

    /// Read a positional value sequence into a fresh record.
    ///
    /// Nothing is returned unless every field matches, so callers never see a
    /// partially applied snapshot.
    pub fn decode(&self, values: &[StreamValue]) -> Result<SnapshotRecord, ProtocolError> {
        if values.len() != self.fields.len() {
            return Err(ProtocolError::FieldCount {
                expected: self.fields.len(),
                found: values.len(),
            });
        }

        let mut state = EntityState::at_rest(
            Vector3::zeros(),
            UnitQuaternion::identity(),
            self.part_count,
        );
        let mut events = EventSet::default();

        for (index, (field, value)) in self.fields.iter().zip(values).enumerate() {
            match (*field, *value) {
                (FieldKind::Position, StreamValue::Vec3(v)) => state.position = v,
                (FieldKind::Rotation, StreamValue::Quat(q)) => state.rotation = q,
                (FieldKind::PartRotation(part), StreamValue::Quat(q)) => {
                    state.parts[part as usize] = q
                }
                (FieldKind::BlendX, StreamValue::Float(f)) => state.blend.x = f,
                (FieldKind::BlendY, StreamValue::Float(f)) => state.blend.y = f,
                (FieldKind::Grounded, StreamValue::Bool(b)) => state.grounded = b,
                (FieldKind::VerticalVelocity, StreamValue::Float(f)) => {
                    state.vertical_velocity = f
                }
                (FieldKind::Crouching, StreamValue::Bool(b)) => state.crouching = b,
                (FieldKind::Event(event), StreamValue::Bool(raised)) => {
                    if raised {
                        events.raise(event);
                    }
                }
                (field, value) => {
                    return Err(ProtocolError::FieldType {
                        index,
                        expected: field.value_type(),
                        found: value.value_type(),
                    })
                }
            }
        }

        Ok(SnapshotRecord { state, events })
    }

    /// Frame a record for the transport
    pub fn to_frame(&self, entity_id: Uuid, record: &SnapshotRecord) -> Frame {
        Frame {
            entity_id,
            version: self.version as u8,
            values: self.encode(record),
        }
    }

    /// Check the frame version, then decode its values
    pub fn from_frame(&self, frame: &Frame) -> Result<SnapshotRecord, ProtocolError> {
        if frame.version != self.version as u8 {
            return Err(ProtocolError::VersionMismatch {
                expected: self.version as u8,
                found: frame.version,
            });
        }
        self.decode(&frame.values)
    }
}
