use std::fmt;

/// 32-byte SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; Digest::LEN]);

impl Digest {
    pub const LEN: usize = 32;

    /// Length of the colon separated rendering: two hex characters per
    /// byte plus one separator between bytes
    pub const RENDERED_LEN: usize = Self::LEN * 3 - 1;

    pub const fn new(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Byte-for-byte comparison
    ///
    /// Not constant time. Only compare digests of public data with this.
    pub fn matches(&self, other: &Digest) -> bool {
        self.0 == other.0
    }

    /// Uppercase hex octets joined by colons, e.g. `AB:01:...:FF`
    pub fn to_fingerprint(&self) -> String {
        self.0
            .iter()
            .map(|byte| format!("{byte:02X}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(&self.0[..8]))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_fingerprint())
    }
}

impl From<[u8; Digest::LEN]> for Digest {
    fn from(bytes: [u8; Digest::LEN]) -> Self {
        Self(bytes)
    }
}
