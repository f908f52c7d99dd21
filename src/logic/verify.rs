//! Read-back verification
//!
//! Parses what the user slot holds and compares its SHA-256 digest with the
//! digest of the certificate that was written.

use std::fmt;

use tracing::{info, warn};

use crate::error::{AttestError, CertificateError, DigestError};
use crate::model::{Certificate, Digest};
use crate::ports::Hasher;

/// Result of comparing a read-back certificate with the one written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Match,
    Mismatch,
    /// No comparison could be made
    Indeterminate(AttestError),
}

impl VerifyOutcome {
    /// Whether an indeterminate outcome came from the certificate parser
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            VerifyOutcome::Indeterminate(AttestError::Certificate(
                CertificateError::Pem { .. }
                    | CertificateError::X509 { .. }
                    | CertificateError::Empty
            ))
        )
    }
}

impl fmt::Display for VerifyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyOutcome::Match => f.write_str("match"),
            VerifyOutcome::Mismatch => f.write_str("mismatch"),
            VerifyOutcome::Indeterminate(e) => write!(f, "indeterminate ({e})"),
        }
    }
}

/// Parse `stored`, digest its DER encoding and compare with `intended`
///
/// Without an intended digest nothing is compared.
pub fn verify_read_back<H: Hasher>(
    hasher: &H,
    stored: &[u8],
    intended: Option<Digest>,
    label: &str,
) -> VerifyOutcome {
    let Some(intended) = intended else {
        warn!("{} verify: no digest of the written certificate", label);
        return VerifyOutcome::Indeterminate(
            DigestError::HashFailed {
                reason: "written certificate was never hashed".to_string(),
            }
            .into(),
        );
    };

    let certificate = match Certificate::from_stored(stored) {
        Ok(certificate) => certificate,
        Err(e) => {
            warn!("{} verify: parse failed ({})", label, e);
            return VerifyOutcome::Indeterminate(e.into());
        }
    };

    match hasher.digest(certificate.der()) {
        Ok(actual) if actual.matches(&intended) => {
            info!("{} verify: match", label);
            VerifyOutcome::Match
        }
        Ok(_) => {
            warn!("{} verify: mismatch", label);
            VerifyOutcome::Mismatch
        }
        Err(e) => {
            warn!("{} verify: SHA-256 failed ({})", label, e);
            VerifyOutcome::Indeterminate(e.into())
        }
    }
}
