//! Certificate storage and structural parsing
//!
//! [`CertificateBlob`] is the fixed-capacity working buffer a certificate is
//! read into. [`Certificate`] is a structurally validated X.509 certificate
//! holding its raw DER encoding.

use std::fmt;

use x509_parser::parse_x509_certificate;
use x509_parser::pem::parse_x509_pem;

use crate::error::{CertificateError, TransactionError};

const PEM_PREAMBLE: &[u8] = b"-----BEGIN";

/// Fixed-capacity buffer holding a stored certificate (PEM or DER)
pub struct CertificateBlob {
    buf: Box<[u8; CertificateBlob::CAPACITY]>,
    len: usize,
}

impl CertificateBlob {
    pub const CAPACITY: usize = 2048;

    pub fn new() -> Self {
        Self {
            buf: Box::new([0u8; Self::CAPACITY]),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Zero the whole backing buffer and reset the length
    pub fn clear(&mut self) {
        self.buf.fill(0);
        self.len = 0;
    }

    /// Clear the blob, then let `read` fill the backing buffer
    ///
    /// `read` returns the number of valid bytes it produced. On error, or
    /// when `read` reports more bytes than the blob holds, the blob is left
    /// cleared.
    ///
    /// # Errors
    ///
    /// Whatever `read` returns, or `TransactionError::Overflow` if the
    /// reported length exceeds the capacity
    pub fn fill_with<E>(
        &mut self,
        read: impl FnOnce(&mut [u8]) -> Result<usize, E>,
    ) -> Result<usize, E>
    where
        E: From<TransactionError>,
    {
        self.clear();
        let len = read(&mut self.buf[..])?;
        if len > Self::CAPACITY {
            self.clear();
            return Err(TransactionError::Overflow {
                len,
                capacity: Self::CAPACITY,
            }
            .into());
        }
        self.len = len;
        Ok(len)
    }
}

impl Default for CertificateBlob {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CertificateBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBlob")
            .field("len", &self.len)
            .field("capacity", &Self::CAPACITY)
            .finish()
    }
}

/// Structurally valid X.509 certificate
#[derive(Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
}

impl Certificate {
    /// Decode PEM armor and parse the enclosed certificate
    pub fn from_pem(pem: &str) -> Result<Self, CertificateError> {
        Self::from_pem_bytes(pem.as_bytes())
    }

    /// Parse a DER encoded certificate
    ///
    /// Trailing bytes after the certificate are ignored; only the bytes that
    /// make up the certificate are kept.
    pub fn from_der(der: &[u8]) -> Result<Self, CertificateError> {
        if der.is_empty() {
            return Err(CertificateError::Empty);
        }

        let (rem, cert) = parse_x509_certificate(der).map_err(|e| CertificateError::X509 {
            reason: e.to_string(),
        })?;

        let raw_len = der.len() - rem.len();
        Ok(Self {
            der: der[..raw_len].to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
        })
    }

    /// Parse a certificate as stored in a slot, PEM or DER
    pub fn from_stored(bytes: &[u8]) -> Result<Self, CertificateError> {
        let start = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(bytes.len());
        let bytes = &bytes[start..];

        if bytes.starts_with(PEM_PREAMBLE) {
            Self::from_pem_bytes(bytes)
        } else {
            Self::from_der(bytes)
        }
    }

    fn from_pem_bytes(pem: &[u8]) -> Result<Self, CertificateError> {
        if pem.iter().all(|b| b.is_ascii_whitespace() || *b == 0) {
            return Err(CertificateError::Empty);
        }

        let (_, pem) = parse_x509_pem(pem).map_err(|e| CertificateError::Pem {
            reason: e.to_string(),
        })?;

        Self::from_der(&pem.contents)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("der_len", &self.der.len())
            .finish()
    }
}
