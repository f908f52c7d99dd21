//! Error types for se-attest
//!
//! This module defines the error hierarchy for all secure element and
//! certificate operations. Errors are organized per concern and use
//! thiserror for implementation.

use std::time::Duration;

use thiserror::Error;

use crate::model::{MetadataError, ObjectIdError, ReturnCode};

/// Result type alias for se-attest operations
///
/// This is a convenience alias for `Result<T, AttestError>`.
pub type AttestResult<T> = Result<T, AttestError>;

/// Top-level error type for all se-attest operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttestError {
    /// Secure element transaction errors
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Certificate parsing errors
    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// Hash primitive errors
    #[error("Digest error: {0}")]
    Digest(#[from] DigestError),

    /// Slot metadata decoding errors
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while driving a transaction against the secure element
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// No transaction handle could be allocated
    #[error("Failed to create transaction handle - element resource pool exhausted")]
    CreationFailed,

    /// The element refused to start the operation
    #[error("Element rejected the operation immediately ({code})")]
    Rejected { code: ReturnCode },

    /// The operation started but completed with a failure status
    #[error("Element operation failed ({code})")]
    Failed { code: ReturnCode },

    /// The element did not resolve the operation within the wait bound
    #[error("Element did not complete the operation within {waited:?}")]
    Timeout { waited: Duration },

    /// A second operation was started before the first one resolved
    #[error("A transaction is already outstanding on this handle")]
    InFlight,

    /// The response does not fit in the caller's buffer
    #[error("Response of {len} bytes exceeds buffer capacity of {capacity} bytes")]
    Overflow { len: usize, capacity: usize },
}

/// Certificate parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    /// No certificate bytes were supplied
    #[error("Certificate is empty")]
    Empty,

    /// PEM armor could not be decoded
    #[error("Invalid PEM encoding: {reason}")]
    Pem { reason: String },

    /// The DER body is not a structurally valid X.509 certificate
    #[error("Invalid X.509 certificate: {reason}")]
    X509 { reason: String },

    /// The encoded certificate does not fit in a slot
    #[error("Certificate of {len} bytes exceeds slot capacity of {capacity} bytes")]
    TooLarge { len: usize, capacity: usize },
}

/// Hash primitive errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The hash primitive reported a failure
    #[error("Hash computation failed: {reason}")]
    HashFailed { reason: String },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Object identifier could not be parsed
    #[error("Invalid object identifier: {0}")]
    InvalidObjectId(#[from] ObjectIdError),

    /// Polling without a pause between polls would spin the processor
    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,
}
