//! SHA-256 implementation of the [`Hasher`] port

use sha2::{Digest as _, Sha256};

use crate::error::DigestError;
use crate::model::Digest;
use crate::ports::Hasher;

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn digest(&self, data: &[u8]) -> Result<Digest, DigestError> {
        let output = Sha256::digest(data);
        let mut bytes = [0u8; Digest::LEN];
        bytes.copy_from_slice(&output);
        Ok(Digest::new(bytes))
    }
}
