use crate::error::DigestError;
use crate::model::Digest;

/// Capability to compute a 32-byte digest of arbitrary bytes
pub trait Hasher {
    /// Same input always yields the same digest
    fn digest(&self, data: &[u8]) -> Result<Digest, DigestError>;
}
