//! Data object metadata
//!
//! The element describes each data object with a TLV container:
//!
//! ```text
//! 20 <len> { <tag> <len> <value> }*
//! ```
//!
//! Only the tags needed to judge writability are decoded; unknown tags are
//! skipped.

use std::fmt;

use thiserror::Error;

const CONTAINER_TAG: u8 = 0x20;
const TAG_LIFECYCLE: u8 = 0xC0;
const TAG_MAX_SIZE: u8 = 0xC4;
const TAG_USED_SIZE: u8 = 0xC5;
const TAG_CHANGE: u8 = 0xD0;
const TAG_READ: u8 = 0xD1;
const TAG_EXECUTE: u8 = 0xD3;
const TAG_OBJECT_TYPE: u8 = 0xE8;

/// Access condition attached to an operation on a data object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCondition {
    /// `ALW`
    Always,
    /// `NEV`
    Never,
    /// Any other encoded expression, kept verbatim
    Conditional(Vec<u8>),
}

impl AccessCondition {
    fn decode(value: &[u8]) -> Self {
        match value {
            [0x00] => AccessCondition::Always,
            [0xFF] => AccessCondition::Never,
            other => AccessCondition::Conditional(other.to_vec()),
        }
    }

    fn encode(&self) -> Vec<u8> {
        match self {
            AccessCondition::Always => vec![0x00],
            AccessCondition::Never => vec![0xFF],
            AccessCondition::Conditional(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for AccessCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessCondition::Always => f.write_str("ALW"),
            AccessCondition::Never => f.write_str("NEV"),
            AccessCondition::Conditional(raw) => write!(f, "COND({})", hex::encode(raw)),
        }
    }
}

/// Decoded view of a data object's metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMetadata {
    pub lifecycle_state: Option<u8>,
    pub max_size: Option<u16>,
    pub used_size: Option<u16>,
    pub change: Option<AccessCondition>,
    pub read: Option<AccessCondition>,
    pub execute: Option<AccessCondition>,
    pub object_type: Option<u8>,
}

impl SlotMetadata {
    pub fn decode(bytes: &[u8]) -> Result<Self, MetadataError> {
        let (&tag, rest) = bytes.split_first().ok_or(MetadataError::Empty)?;
        if tag != CONTAINER_TAG {
            return Err(MetadataError::UnexpectedTag { tag, offset: 0 });
        }
        let (&len, body) = rest.split_first().ok_or(MetadataError::Truncated { offset: 1 })?;
        let len = usize::from(len);
        if body.len() < len {
            return Err(MetadataError::Truncated { offset: 2 + body.len() });
        }

        let mut metadata = SlotMetadata::default();
        let body = &body[..len];
        let mut pos = 0;
        while pos < body.len() {
            let offset = 2 + pos;
            let tag = body[pos];
            let value_len = *body
                .get(pos + 1)
                .ok_or(MetadataError::Truncated { offset: offset + 1 })?;
            let start = pos + 2;
            let end = start + usize::from(value_len);
            let value = body
                .get(start..end)
                .ok_or(MetadataError::Truncated { offset: offset + 2 })?;

            match tag {
                TAG_LIFECYCLE => metadata.lifecycle_state = value.first().copied(),
                TAG_MAX_SIZE => metadata.max_size = Some(be_u16(value, offset)?),
                TAG_USED_SIZE => metadata.used_size = Some(be_u16(value, offset)?),
                TAG_CHANGE => metadata.change = Some(AccessCondition::decode(value)),
                TAG_READ => metadata.read = Some(AccessCondition::decode(value)),
                TAG_EXECUTE => metadata.execute = Some(AccessCondition::decode(value)),
                TAG_OBJECT_TYPE => metadata.object_type = value.first().copied(),
                _ => {}
            }
            pos = end;
        }

        Ok(metadata)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let mut push = |tag: u8, value: &[u8]| {
            body.push(tag);
            body.push(value.len() as u8);
            body.extend_from_slice(value);
        };

        if let Some(state) = self.lifecycle_state {
            push(TAG_LIFECYCLE, &[state]);
        }
        if let Some(size) = self.max_size {
            push(TAG_MAX_SIZE, &size.to_be_bytes());
        }
        if let Some(size) = self.used_size {
            push(TAG_USED_SIZE, &size.to_be_bytes());
        }
        if let Some(ac) = &self.change {
            push(TAG_CHANGE, &ac.encode());
        }
        if let Some(ac) = &self.read {
            push(TAG_READ, &ac.encode());
        }
        if let Some(ac) = &self.execute {
            push(TAG_EXECUTE, &ac.encode());
        }
        if let Some(kind) = self.object_type {
            push(TAG_OBJECT_TYPE, &[kind]);
        }

        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(CONTAINER_TAG);
        out.push(body.len() as u8);
        out.extend_from_slice(&body);
        out
    }

    /// Whether the change access condition forbids every write
    pub fn is_write_locked(&self) -> bool {
        matches!(self.change, Some(AccessCondition::Never))
    }
}

fn be_u16(value: &[u8], offset: usize) -> Result<u16, MetadataError> {
    match value {
        [lo] => Ok(u16::from(*lo)),
        [hi, lo] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(MetadataError::BadLength {
            offset,
            len: value.len(),
        }),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Metadata is empty")]
    Empty,

    #[error("Unexpected tag 0x{tag:02X} at offset {offset}")]
    UnexpectedTag { tag: u8, offset: usize },

    #[error("Metadata truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("Field at offset {offset} has invalid length {len}")]
    BadLength { offset: usize, len: usize },
}
