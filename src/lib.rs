//! Device identity attestation and certificate provisioning for secure
//! elements.
//!
//! The crate reads the factory device certificate from a secure element,
//! optionally writes a user certificate into a writable slot after a
//! metadata pre-flight check, and verifies the write by reading it back and
//! comparing SHA-256 digests. Element commands are asynchronous and are
//! bridged to sequential calls with a bounded wait.

mod adapters;
pub mod api;
pub mod error;
mod logic;
pub mod model;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use error::{AttestError, AttestResult};

// Re-export public API
pub use api::{attest, simulated_element};
