//! Ports (traits) for secure element access and hashing
//!
//! These traits define the capabilities the attestation workflow needs.
//! They represent ports in hexagonal architecture - the core depends on
//! these abstractions, not on a concrete driver.

mod element;
mod hasher;

pub use element::{ElementConnector, ElementHandle, TransactionFactory};
pub use hasher::Hasher;
