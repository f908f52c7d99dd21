mod gate;
mod reader;
mod transaction;
mod verify;

pub use gate::{GateDecision, MetadataGate};
pub use reader::{CertificateRead, CertificateReader};
pub use transaction::Transaction;
pub use verify::{verify_read_back, VerifyOutcome};
