//! Object identifiers naming storage slots inside the secure element

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// 16-bit handle naming a data object (slot) inside the secure element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u16);

impl ObjectId {
    /// Factory-provisioned device identity certificate
    pub const FACTORY_CERTIFICATE: ObjectId = ObjectId(0xE0E0);

    /// First writable certificate slot, used for user provisioning
    pub const USER_CERTIFICATE: ObjectId = ObjectId(0xE0E1);

    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl From<u16> for ObjectId {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    /// Accepts `0xE0E1`, `0XE0E1` or bare `E0E1`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() || digits.len() > 4 {
            return Err(ObjectIdError::Invalid {
                input: s.to_string(),
            });
        }

        u16::from_str_radix(digits, 16)
            .map(Self)
            .map_err(|_| ObjectIdError::Invalid {
                input: s.to_string(),
            })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectIdError {
    #[error("'{input}' is not a 16-bit hexadecimal object identifier")]
    Invalid { input: String },
}
