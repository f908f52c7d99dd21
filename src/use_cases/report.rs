//! Structured outcome of an attestation run

use std::fmt;

use crate::error::AttestError;
use crate::logic::{CertificateRead, GateDecision, VerifyOutcome};
use crate::model::Digest;

/// Why a step did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Turned off in the configuration
    Disabled,
    /// No candidate certificate was supplied
    NoCandidate,
    /// The metadata gate did not permit the write
    GateDenied,
    /// The candidate certificate was rejected
    CandidateRejected,
    /// No write was issued in this run
    NoWrite,
    /// The read-back returned nothing to compare
    NothingReadBack,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::Disabled => "disabled",
            SkipReason::NoCandidate => "no candidate certificate",
            SkipReason::GateDenied => "metadata check failed",
            SkipReason::CandidateRejected => "candidate certificate rejected",
            SkipReason::NoWrite => "nothing written",
            SkipReason::NothingReadBack => "nothing read back",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    Done(T),
    Skipped(SkipReason),
    Failed(AttestError),
}

impl<T> StepOutcome<T> {
    pub fn done(&self) -> Option<&T> {
        match self {
            StepOutcome::Done(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped(_))
    }

    pub fn error(&self) -> Option<&AttestError> {
        match self {
            StepOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Candidate certificate accepted for provisioning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateSummary {
    pub subject: String,
    pub der_len: usize,
    /// Digest of the DER encoding; absent if hashing failed
    pub digest: Option<Digest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationReport {
    pub factory: CertificateRead,
    pub metadata: StepOutcome<GateDecision>,
    pub candidate: StepOutcome<CandidateSummary>,
    /// Number of bytes written to the user slot
    pub write: StepOutcome<usize>,
    pub read_back: StepOutcome<CertificateRead>,
    pub verify: StepOutcome<VerifyOutcome>,
}

impl AttestationReport {
    /// Everything that went wrong during the run, one line each
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !self.factory.is_present() {
            problems.push("factory certificate read failed or empty".to_string());
        }
        if let Some(e) = self.metadata.error() {
            problems.push(format!("metadata check: {e}"));
        }
        if let Some(e) = self.candidate.error() {
            problems.push(format!("candidate certificate: {e}"));
        }
        match &self.write {
            StepOutcome::Failed(e) => problems.push(format!("write: {e}")),
            StepOutcome::Skipped(SkipReason::GateDenied) => {
                problems.push("write skipped: metadata check failed".to_string())
            }
            _ => {}
        }
        match &self.read_back {
            StepOutcome::Failed(e) => problems.push(format!("read-back: {e}")),
            StepOutcome::Done(CertificateRead::Empty) => {
                problems.push("read-back failed or empty".to_string())
            }
            _ => {}
        }
        match &self.verify {
            StepOutcome::Failed(e) => problems.push(format!("verify: {e}")),
            StepOutcome::Done(VerifyOutcome::Match) => {}
            StepOutcome::Done(outcome) => problems.push(format!("verify: {outcome}")),
            StepOutcome::Skipped(_) => {}
        }

        problems
    }

    pub fn is_success(&self) -> bool {
        self.problems().is_empty()
    }
}
