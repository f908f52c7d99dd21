//! Use cases (orchestration)
//!
//! Use cases drive the logic layer over whichever element adapter they are
//! handed and turn the results into a report.

mod attestation;
mod report;

pub use attestation::{run_attestation, Orchestrator};
pub use report::{AttestationReport, CandidateSummary, SkipReason, StepOutcome};
