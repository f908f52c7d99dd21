//! Adapters - concrete implementations of ports (traits)

mod sha256;
mod simulated_element;

#[cfg(test)]
pub mod fake_element;

pub use sha256::Sha256Hasher;
pub use simulated_element::{SimulatedElement, CERTIFICATE_SLOT_SIZE};
