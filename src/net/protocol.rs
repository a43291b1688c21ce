//! Wire value stream and frame definitions
//! These are the wire types exchanged between peers for every snapshot

use bytes::{Buf, BufMut, Bytes, BytesMut};
use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use uuid::Uuid;

const TAG_VEC3: u8 = 0x01;
const TAG_QUAT: u8 = 0x02;
const TAG_FLOAT: u8 = 0x03;
const TAG_BOOL: u8 = 0x04;

/// Upper bound on values in one frame; real schemas stay far below this
pub const MAX_FRAME_FIELDS: usize = 64;

/// Largest accepted deviation of a received rotation from unit length
pub const UNIT_NORM_TOLERANCE: f32 = 1.0e-3;

/// Entity id + version byte + field count
const HEADER_LEN: usize = 16 + 1 + 2;

/// Type of a single value in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Vec3,
    Quat,
    Float,
    Bool,
}

/// One positional value of a snapshot.
///
/// The stream is not self-describing beyond this tag; the meaning of each
/// value comes from its position in the schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StreamValue {
    Vec3(Vector3<f32>),
    Quat(UnitQuaternion<f32>),
    Float(f32),
    Bool(bool),
}

impl StreamValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            StreamValue::Vec3(_) => ValueType::Vec3,
            StreamValue::Quat(_) => ValueType::Quat,
            StreamValue::Float(_) => ValueType::Float,
            StreamValue::Bool(_) => ValueType::Bool,
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            StreamValue::Vec3(v) => v.iter().all(|c| c.is_finite()),
            StreamValue::Quat(q) => q.coords.iter().all(|c| c.is_finite()),
            StreamValue::Float(f) => f.is_finite(),
            StreamValue::Bool(_) => true,
        }
    }
}

/// A decoded snapshot frame for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub entity_id: Uuid,
    /// Raw schema version byte; checked against the receiver's schema
    pub version: u8,
    pub values: Vec<StreamValue>,
}

impl Frame {
    /// Serialize to the binary frame layout
    pub fn encode(&self) -> Bytes {
        debug_assert!(self.values.len() <= MAX_FRAME_FIELDS);
        let mut out = BytesMut::with_capacity(HEADER_LEN + self.values.len() * 17);
        out.put_slice(self.entity_id.as_bytes());
        out.put_u8(self.version);
        out.put_u16_le(self.values.len() as u16);

        for value in &self.values {
            match value {
                StreamValue::Vec3(v) => {
                    out.put_u8(TAG_VEC3);
                    out.put_f32_le(v.x);
                    out.put_f32_le(v.y);
                    out.put_f32_le(v.z);
                }
                StreamValue::Quat(q) => {
                    out.put_u8(TAG_QUAT);
                    out.put_f32_le(q.i);
                    out.put_f32_le(q.j);
                    out.put_f32_le(q.k);
                    out.put_f32_le(q.w);
                }
                StreamValue::Float(f) => {
                    out.put_u8(TAG_FLOAT);
                    out.put_f32_le(*f);
                }
                StreamValue::Bool(b) => {
                    out.put_u8(TAG_BOOL);
                    out.put_u8(u8::from(*b));
                }
            }
        }

        out.freeze()
    }

    /// Parse a binary frame; the whole buffer must be consumed
    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtocolError> {
        ensure(buf, HEADER_LEN)?;
        let mut id = [0u8; 16];
        buf.copy_to_slice(&mut id);
        let version = buf.get_u8();
        let count = buf.get_u16_le() as usize;
        if count > MAX_FRAME_FIELDS {
            return Err(ProtocolError::TooManyFields(count));
        }

        let mut values = Vec::with_capacity(count);
        for index in 0..count {
            ensure(buf, 1)?;
            let value = match buf.get_u8() {
                TAG_VEC3 => {
                    ensure(buf, 12)?;
                    StreamValue::Vec3(Vector3::new(
                        buf.get_f32_le(),
                        buf.get_f32_le(),
                        buf.get_f32_le(),
                    ))
                }
                TAG_QUAT => {
                    ensure(buf, 16)?;
                    let (x, y, z, w) = (
                        buf.get_f32_le(),
                        buf.get_f32_le(),
                        buf.get_f32_le(),
                        buf.get_f32_le(),
                    );
                    // Sent normalized; keep the exact bits instead of renormalizing.
                    StreamValue::Quat(UnitQuaternion::new_unchecked(Quaternion::new(w, x, y, z)))
                }
                TAG_FLOAT => {
                    ensure(buf, 4)?;
                    StreamValue::Float(buf.get_f32_le())
                }
                TAG_BOOL => {
                    ensure(buf, 1)?;
                    StreamValue::Bool(buf.get_u8() != 0)
                }
                tag => return Err(ProtocolError::UnknownTag(tag)),
            };
            if !value.is_finite() {
                return Err(ProtocolError::NonFinite { index });
            }
            if let StreamValue::Quat(q) = value {
                if (q.coords.norm() - 1.0).abs() > UNIT_NORM_TOLERANCE {
                    return Err(ProtocolError::NonUnitRotation { index });
                }
            }
            values.push(value);
        }

        if buf.has_remaining() {
            return Err(ProtocolError::TrailingBytes(buf.remaining()));
        }

        Ok(Self {
            entity_id: Uuid::from_bytes(id),
            version,
            values,
        })
    }
}

fn ensure(buf: &[u8], needed: usize) -> Result<(), ProtocolError> {
    if buf.remaining() < needed {
        return Err(ProtocolError::Truncated {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Snapshot protocol errors; the offending message is dropped
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Frame truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("Unknown value tag: {0:#04x}")]
    UnknownTag(u8),

    #[error("Frame declares {0} fields")]
    TooManyFields(usize),

    #[error("Frame has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("Non-finite value at field {index}")]
    NonFinite { index: usize },

    #[error("Rotation at field {index} is not unit length")]
    NonUnitRotation { index: usize },

    #[error("Unsupported schema version: {0}")]
    UnsupportedVersion(u8),

    #[error("Schema version mismatch: expected {expected}, got {found}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("Field count mismatch: expected {expected}, got {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("Field {index} has type {found:?}, expected {expected:?}")]
    FieldType {
        index: usize,
        expected: ValueType,
        found: ValueType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame {
            entity_id: Uuid::new_v4(),
            version: 1,
            values: vec![
                StreamValue::Vec3(Vector3::new(1.5, -0.25, 1.0e-7)),
                StreamValue::Quat(UnitQuaternion::from_euler_angles(0.1, 0.7, -0.3)),
                StreamValue::Float(-2.0),
                StreamValue::Bool(true),
            ],
        }
    }

    #[test]
    fn frame_bytes_preserve_every_value() {
        let frame = sample_frame();
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let bytes = sample_frame().encode();
        let err = Frame::decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { .. }));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = sample_frame().encode().to_vec();
        bytes.push(0);
        assert_eq!(
            Frame::decode(&bytes).unwrap_err(),
            ProtocolError::TrailingBytes(1)
        );
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut bytes = Frame {
            entity_id: Uuid::nil(),
            version: 1,
            values: vec![StreamValue::Bool(false)],
        }
        .encode()
        .to_vec();
        bytes[HEADER_LEN] = 0x7f;
        assert_eq!(
            Frame::decode(&bytes).unwrap_err(),
            ProtocolError::UnknownTag(0x7f)
        );
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let frame = Frame {
            entity_id: Uuid::nil(),
            version: 1,
            values: vec![StreamValue::Float(1.0), StreamValue::Float(f32::NAN)],
        };
        assert_eq!(
            Frame::decode(&frame.encode()).unwrap_err(),
            ProtocolError::NonFinite { index: 1 }
        );
    }

    #[test]
    fn non_unit_rotations_are_rejected() {
        let frame = Frame {
            entity_id: Uuid::nil(),
            version: 1,
            values: vec![
                StreamValue::Vec3(Vector3::zeros()),
                StreamValue::Quat(UnitQuaternion::identity()),
            ],
        };
        let mut bytes = frame.encode().to_vec();
        // Zero the xyzw payload that follows the quaternion tag.
        let quat_payload = HEADER_LEN + 13 + 1;
        bytes[quat_payload..quat_payload + 16].fill(0);

        assert_eq!(
            Frame::decode(&bytes).unwrap_err(),
            ProtocolError::NonUnitRotation { index: 1 }
        );
    }

    #[test]
    fn near_unit_rotation_keeps_exact_bits() {
        let raw = Quaternion::new(0.9999, 0.0, 0.0, 0.0);
        let frame = Frame {
            entity_id: Uuid::nil(),
            version: 1,
            values: vec![StreamValue::Quat(UnitQuaternion::new_unchecked(raw))],
        };
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded, frame);
    }
}
