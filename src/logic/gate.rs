//! Metadata gate
//!
//! Pre-flight read of a slot's metadata before provisioning. The gate fails
//! closed: any error reading the metadata denies the write. A `Permitted`
//! decision is advisory, the write itself can still fail.

use tracing::{info, warn};

use super::Transaction;
use crate::error::AttestResult;
use crate::model::{MetadataError, ObjectId, SlotMetadata, WaitPolicy};
use crate::ports::TransactionFactory;

/// Largest metadata response accepted from the element
pub const METADATA_CAPACITY: usize = 128;

/// Number of leading metadata bytes shown in the log
const DUMP_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Permitted,
    NotPermitted,
}

impl GateDecision {
    pub fn is_permitted(self) -> bool {
        self == GateDecision::Permitted
    }
}

pub struct MetadataGate<'a, F> {
    element: &'a F,
    wait: WaitPolicy,
    strict: bool,
}

impl<'a, F: TransactionFactory> MetadataGate<'a, F> {
    pub fn new(element: &'a F, wait: WaitPolicy) -> Self {
        Self {
            element,
            wait,
            strict: false,
        }
    }

    /// Also deny when the decoded change access condition is `NEV`, or when
    /// the metadata cannot be decoded
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Decide whether `oid` may be written
    ///
    /// # Errors
    ///
    /// In strict mode, returns the decode error when the metadata read back
    /// is not valid TLV. Outside strict mode such metadata is only logged.
    pub fn check(&self, oid: ObjectId, label: &str) -> Result<GateDecision, MetadataError> {
        let metadata = match self.read(oid) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("{}: read metadata failed ({})", label, e);
                return Ok(GateDecision::NotPermitted);
            }
        };

        info!("{} length: {} bytes", label, metadata.len());
        if !metadata.is_empty() {
            let shown = &metadata[..metadata.len().min(DUMP_LEN)];
            info!("{}: {}", label, hex::encode(shown));
        }

        match SlotMetadata::decode(&metadata) {
            Ok(decoded) => {
                info!(
                    "{}: lifecycle={:?} change={} read={} max_size={:?} used_size={:?}",
                    label,
                    decoded.lifecycle_state,
                    describe(&decoded.change),
                    describe(&decoded.read),
                    decoded.max_size,
                    decoded.used_size
                );
                if self.strict && decoded.is_write_locked() {
                    warn!("{}: change access condition is NEV", label);
                    return Ok(GateDecision::NotPermitted);
                }
            }
            Err(e) if self.strict => {
                warn!("{}: could not decode metadata ({})", label, e);
                return Err(e);
            }
            Err(e) => warn!("{}: could not decode metadata ({})", label, e),
        }

        Ok(GateDecision::Permitted)
    }

    fn read(&self, oid: ObjectId) -> AttestResult<Vec<u8>> {
        let mut tx = Transaction::create(self.element, self.wait)?;
        let mut buf = [0u8; METADATA_CAPACITY];
        let len = tx.read_metadata(oid, &mut buf)?;
        Ok(buf[..len].to_vec())
    }
}

fn describe<T: std::fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map_or_else(|| "-".to_string(), |v| v.to_string())
}
