//! Certificate reader
//!
//! Reads a stored certificate into the caller's working blob and reports its
//! size and SHA-256 fingerprint. Absence is signalled, never raised: a
//! failed read and a zero-length read are the same outcome.

use tracing::{info, warn};

use super::Transaction;
use crate::error::AttestError;
use crate::model::{CertificateBlob, Digest, ObjectId, WaitPolicy};
use crate::ports::{Hasher, TransactionFactory};

/// Outcome of reading a certificate slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateRead {
    /// `len` bytes were read; `fingerprint` is absent if hashing failed
    Present {
        len: usize,
        fingerprint: Option<Digest>,
    },
    /// The read failed or the slot is empty
    Empty,
}

impl CertificateRead {
    pub fn is_present(&self) -> bool {
        matches!(self, CertificateRead::Present { .. })
    }
}

pub struct CertificateReader<'a, F, H> {
    element: &'a F,
    hasher: &'a H,
    wait: WaitPolicy,
}

impl<'a, F, H> CertificateReader<'a, F, H>
where
    F: TransactionFactory,
    H: Hasher,
{
    pub fn new(element: &'a F, hasher: &'a H, wait: WaitPolicy) -> Self {
        Self {
            element,
            hasher,
            wait,
        }
    }

    /// Read the certificate stored at `oid` into `blob`
    ///
    /// `blob` is cleared first, so it never carries bytes from a previous
    /// read. `label` names the certificate in log lines.
    pub fn read_certificate(
        &self,
        oid: ObjectId,
        label: &str,
        blob: &mut CertificateBlob,
    ) -> CertificateRead {
        let result = blob.fill_with(|buf| {
            let mut tx = Transaction::create(self.element, self.wait)?;
            Ok::<_, AttestError>(tx.read_object(oid, buf)?)
        });

        let len = match result {
            Ok(len) if len > 0 => len,
            Ok(_) => {
                warn!("{} read failed or empty (slot {} holds no data)", label, oid);
                return CertificateRead::Empty;
            }
            Err(e) => {
                warn!("{} read failed or empty ({})", label, e);
                return CertificateRead::Empty;
            }
        };

        info!("{} size: {} bytes", label, len);
        let fingerprint = match self.hasher.digest(blob.as_bytes()) {
            Ok(digest) => {
                info!("{} SHA-256: {}", label, digest.to_fingerprint());
                Some(digest)
            }
            Err(e) => {
                warn!("Failed to compute {} fingerprint: {}", label, e);
                None
            }
        };

        CertificateRead::Present { len, fingerprint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::fake_element::{Behavior, FakeElement, Operation};
    use crate::adapters::Sha256Hasher;
    use crate::error::DigestError;
    use crate::model::ReturnCode;
    use std::time::Duration;

    const SLOT: ObjectId = ObjectId::new(0xE0E0);

    fn wait() -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_millis(100)),
        }
    }

    #[test]
    fn test_read_present_certificate() {
        let element = FakeElement::new().with_object(SLOT, vec![0x30; 600]);
        let reader = CertificateReader::new(&element, &Sha256Hasher, wait());
        let mut blob = CertificateBlob::new();

        let read = reader.read_certificate(SLOT, "Factory cert", &mut blob);

        match read {
            CertificateRead::Present { len, fingerprint } => {
                assert_eq!(len, 600);
                let rendered = fingerprint.expect("fingerprint").to_fingerprint();
                assert_eq!(rendered.len(), 95);
                assert!(rendered
                    .chars()
                    .all(|c| c == ':' || c.is_ascii_digit() || c.is_ascii_uppercase()));
            }
            CertificateRead::Empty => panic!("expected a certificate"),
        }
        assert_eq!(blob.len(), 600);
    }

    #[test]
    fn test_hash_failure_keeps_certificate() {
        struct BrokenHasher;
        impl Hasher for BrokenHasher {
            fn digest(&self, _data: &[u8]) -> Result<Digest, DigestError> {
                Err(DigestError::HashFailed {
                    reason: "engine offline".to_string(),
                })
            }
        }

        let element = FakeElement::new().with_object(SLOT, vec![0x30; 32]);
        let reader = CertificateReader::new(&element, &BrokenHasher, wait());
        let mut blob = CertificateBlob::new();

        assert_eq!(
            reader.read_certificate(SLOT, "Factory cert", &mut blob),
            CertificateRead::Present {
                len: 32,
                fingerprint: None
            }
        );
    }

    #[test]
    fn test_empty_slot_reads_as_empty() {
        let element = FakeElement::new().with_object(SLOT, Vec::new());
        let reader = CertificateReader::new(&element, &Sha256Hasher, wait());
        let mut blob = CertificateBlob::new();

        assert_eq!(
            reader.read_certificate(SLOT, "User cert", &mut blob),
            CertificateRead::Empty
        );
    }

    #[test]
    fn test_failures_read_as_empty() {
        let failing = FakeElement::new()
            .with_object(SLOT, vec![1; 10])
            .with_failure(Operation::ReadData, ReturnCode(0x8007));
        let exhausted = FakeElement::new()
            .with_object(SLOT, vec![1; 10])
            .with_handle_limit(0);
        let silent = FakeElement::new()
            .with_object(SLOT, vec![1; 10])
            .with_behavior(Behavior::NeverComplete);

        let mut blob = CertificateBlob::new();
        for element in [failing, exhausted, silent] {
            let reader = CertificateReader::new(&element, &Sha256Hasher, wait());
            assert!(!reader
                .read_certificate(SLOT, "Factory cert", &mut blob)
                .is_present());
            assert!(blob.is_empty());
        }
    }

    #[test]
    fn test_blob_reuse_clears_previous_certificate() {
        let other = ObjectId::new(0xE0E1);
        let element = FakeElement::new()
            .with_object(SLOT, vec![0xAA; 700])
            .with_object(other, vec![0xBB; 20]);
        let reader = CertificateReader::new(&element, &Sha256Hasher, wait());
        let mut blob = CertificateBlob::new();

        reader.read_certificate(SLOT, "Factory cert", &mut blob);
        reader.read_certificate(other, "User cert", &mut blob);

        assert_eq!(blob.as_bytes(), &[0xBB; 20][..]);
    }
}
