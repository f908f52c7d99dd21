//! Public entry points
//!
//! Wires the use cases to the concrete adapters shipped with the crate.

use crate::adapters::{Sha256Hasher, CERTIFICATE_SLOT_SIZE};
use crate::error::AttestResult;
use crate::ports::ElementConnector;
use crate::use_cases::run_attestation;

pub use crate::adapters::SimulatedElement;
pub use crate::logic::{CertificateRead, GateDecision, VerifyOutcome};
pub use crate::model::*;
pub use crate::use_cases::{AttestationReport, CandidateSummary, SkipReason, StepOutcome};

/// Run one attestation pass against the element behind `connector`,
/// hashing with SHA-256
pub fn attest<C: ElementConnector>(
    connector: &C,
    config: &AttestationConfig,
) -> AttestResult<AttestationReport> {
    run_attestation(connector, &Sha256Hasher, config)
}

/// Simulated element laid out for `config`
///
/// The factory slot holds `factory_certificate` and is locked against
/// writes; the user slot starts out empty and writable.
pub fn simulated_element(
    config: &AttestationConfig,
    factory_certificate: Vec<u8>,
) -> SimulatedElement {
    SimulatedElement::new()
        .with_factory_certificate(config.factory_slot, factory_certificate)
        .with_writable_slot(config.user_slot, CERTIFICATE_SLOT_SIZE)
}
