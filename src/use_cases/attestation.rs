//! Attestation use case
//!
//! Reads the factory device certificate, then optionally provisions a
//! candidate certificate into the user slot and verifies it by reading it
//! back. Every step is logged and recorded in an [`AttestationReport`];
//! failures are confined to the step they happen in.

use tracing::{error, info, warn};

use super::report::{AttestationReport, CandidateSummary, SkipReason, StepOutcome};
use crate::error::{AttestResult, CertificateError};
use crate::logic::{
    verify_read_back, CertificateRead, CertificateReader, GateDecision, MetadataGate, Transaction,
    VerifyOutcome,
};
use crate::model::{AttestationConfig, Certificate, CertificateBlob, Digest, ObjectId};
use crate::ports::{ElementConnector, Hasher, TransactionFactory};

/// Connect to the element and run one attestation pass
///
/// # Arguments
///
/// * `connector` - Opens the secure element
/// * `hasher` - Digest primitive used for fingerprints and verification
/// * `config` - Slots and the optional provisioning steps to run
///
/// # Errors
///
/// Returns `ConfigError` for an unusable configuration and the connector's
/// error if the element cannot be reached. Failures of individual steps are
/// reported in the returned [`AttestationReport`].
pub fn run_attestation<C, H>(
    connector: &C,
    hasher: &H,
    config: &AttestationConfig,
) -> AttestResult<AttestationReport>
where
    C: ElementConnector,
    H: Hasher,
{
    config.validate()?;
    let element = connector.connect()?;
    let mut orchestrator = Orchestrator::new(&element, hasher, config);
    Ok(orchestrator.run())
}

/// Runs the attestation steps in order over one element
///
/// Owns the working certificate blob and the digest of the certificate
/// written in the current run. Both are reset at the start of every run.
pub struct Orchestrator<'a, F, H> {
    element: &'a F,
    hasher: &'a H,
    config: &'a AttestationConfig,
    working: CertificateBlob,
    intended: Option<Digest>,
    gate: Option<GateDecision>,
}

impl<'a, F, H> Orchestrator<'a, F, H>
where
    F: TransactionFactory,
    H: Hasher,
{
    pub fn new(element: &'a F, hasher: &'a H, config: &'a AttestationConfig) -> Self {
        Self {
            element,
            hasher,
            config,
            working: CertificateBlob::new(),
            intended: None,
            gate: None,
        }
    }

    pub fn run(&mut self) -> AttestationReport {
        self.working.clear();
        self.intended = None;
        self.gate = None;

        info!("[1] Device identity (Attestation)");
        let factory = self.read_factory();
        let metadata = self.check_metadata();
        let (candidate, certificate) = self.prepare_candidate();
        let write = match certificate {
            Some(certificate) => self.write_candidate(&certificate),
            None => StepOutcome::Skipped(write_skip_reason(&candidate)),
        };
        let (read_back, verify) = self.read_back_and_verify(&write);
        self.intended = None;

        AttestationReport {
            factory,
            metadata,
            candidate,
            write,
            read_back,
            verify,
        }
    }

    fn reader(&self) -> CertificateReader<'a, F, H> {
        CertificateReader::new(self.element, self.hasher, self.config.wait)
    }

    fn read_factory(&mut self) -> CertificateRead {
        let slot = self.config.factory_slot;
        info!("Certificate slot: {}", slot);
        self.reader()
            .read_certificate(slot, "Factory cert", &mut self.working)
    }

    fn check_metadata(&mut self) -> StepOutcome<GateDecision> {
        if !self.config.metadata_check_enabled {
            info!("User slot metadata check disabled");
            return StepOutcome::Skipped(SkipReason::Disabled);
        }

        let checked = MetadataGate::new(self.element, self.config.wait)
            .strict(self.config.strict_metadata)
            .check(self.config.user_slot, "User slot metadata");
        match checked {
            Ok(decision) => {
                self.gate = Some(decision);
                StepOutcome::Done(decision)
            }
            Err(e) => {
                self.gate = Some(GateDecision::NotPermitted);
                StepOutcome::Failed(e.into())
            }
        }
    }

    fn prepare_candidate(&mut self) -> (StepOutcome<CandidateSummary>, Option<Certificate>) {
        if !self.config.write_enabled {
            info!("User cert write disabled");
            return (StepOutcome::Skipped(SkipReason::Disabled), None);
        }

        if self.config.metadata_check_enabled && !self.gate.is_some_and(GateDecision::is_permitted)
        {
            warn!("User slot metadata check failed; skip write");
            return (StepOutcome::Skipped(SkipReason::GateDenied), None);
        }

        let Some(pem) = self.config.candidate() else {
            warn!("Candidate certificate PEM is empty. Skipping write.");
            return (StepOutcome::Skipped(SkipReason::NoCandidate), None);
        };

        let certificate = match Certificate::from_pem(pem) {
            Ok(certificate) => certificate,
            Err(e) => {
                error!("Failed to parse candidate certificate: {}", e);
                return (StepOutcome::Failed(e.into()), None);
            }
        };

        let der_len = certificate.der().len();
        if der_len > CertificateBlob::CAPACITY {
            let e = CertificateError::TooLarge {
                len: der_len,
                capacity: CertificateBlob::CAPACITY,
            };
            error!("Candidate certificate rejected: {}", e);
            return (StepOutcome::Failed(e.into()), None);
        }
        info!(
            "Candidate certificate: {} ({} bytes DER)",
            certificate.subject(),
            der_len
        );

        let digest = match self.hasher.digest(certificate.der()) {
            Ok(digest) => {
                info!("Candidate SHA-256: {}", digest.to_fingerprint());
                Some(digest)
            }
            Err(e) => {
                warn!("Failed to compute candidate fingerprint: {}", e);
                None
            }
        };
        self.intended = digest;

        let summary = CandidateSummary {
            subject: certificate.subject().to_string(),
            der_len,
            digest,
        };
        (StepOutcome::Done(summary), Some(certificate))
    }

    fn write_candidate(&self, certificate: &Certificate) -> StepOutcome<usize> {
        let slot = self.config.user_slot;
        match self.write(slot, certificate.der()) {
            Ok(()) => {
                info!("Wrote user certificate to slot {}", slot);
                StepOutcome::Done(certificate.der().len())
            }
            Err(e) => {
                error!("Failed to write user certificate to slot {}: {}", slot, e);
                StepOutcome::Failed(e)
            }
        }
    }

    fn write(&self, slot: ObjectId, der: &[u8]) -> AttestResult<()> {
        let mut tx = Transaction::create(self.element, self.config.wait)?;
        tx.write_object(slot, der)?;
        Ok(())
    }

    fn read_back_and_verify(
        &mut self,
        write: &StepOutcome<usize>,
    ) -> (StepOutcome<CertificateRead>, StepOutcome<VerifyOutcome>) {
        if !self.config.write_enabled {
            info!("User cert read skipped (write disabled)");
            return skipped_pair(SkipReason::Disabled);
        }
        if !self.config.verify_after_write {
            info!("User cert read-back disabled");
            return skipped_pair(SkipReason::Disabled);
        }
        if write.is_skipped() {
            info!("No user certificate written; skip read-back");
            return skipped_pair(SkipReason::NoWrite);
        }

        let read = self
            .reader()
            .read_certificate(self.config.user_slot, "User cert", &mut self.working);
        if !read.is_present() {
            return (
                StepOutcome::Done(read),
                StepOutcome::Skipped(SkipReason::NothingReadBack),
            );
        }

        let outcome = verify_read_back(
            self.hasher,
            self.working.as_bytes(),
            self.intended.take(),
            "User cert",
        );
        (StepOutcome::Done(read), StepOutcome::Done(outcome))
    }
}

fn skipped_pair(
    reason: SkipReason,
) -> (StepOutcome<CertificateRead>, StepOutcome<VerifyOutcome>) {
    (StepOutcome::Skipped(reason), StepOutcome::Skipped(reason))
}

fn write_skip_reason(candidate: &StepOutcome<CandidateSummary>) -> SkipReason {
    match candidate {
        StepOutcome::Skipped(reason) => *reason,
        _ => SkipReason::CandidateRejected,
    }
}
