//! Secure element capabilities
//!
//! The element executes every command asynchronously. A command is started
//! on an [`ElementHandle`] and its outcome is reported later through the
//! [`CompletionSink`] the handle was created with.

use crate::error::AttestResult;
use crate::model::{CompletionSink, ObjectId, ReturnCode};

/// Capability to bring up the element and obtain a session to it
pub trait ElementConnector {
    /// The connected element
    type Element: TransactionFactory;

    /// Initialise the element and its transport
    ///
    /// # Errors
    ///
    /// Returns an error if the element cannot be reached or initialised
    fn connect(&self) -> AttestResult<Self::Element>;
}

/// Capability to allocate transaction handles
pub trait TransactionFactory {
    /// Handle type; dropping it releases the handle back to the element
    type Handle: ElementHandle;

    /// Allocate a handle whose completions are reported to `sink`
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::CreationFailed` if no handle is available
    fn create_handle(&self, sink: CompletionSink) -> AttestResult<Self::Handle>;
}

/// Asynchronous command surface of one transaction handle
///
/// Every `begin_*` call either rejects the command immediately with a
/// return code, or accepts it and later resolves the handle's sink exactly
/// once. Callers arm the sink before calling `begin_*`.
pub trait ElementHandle {
    /// Start reading the payload of a data object
    ///
    /// `capacity` is the largest response the caller can accept.
    fn begin_read_data(&mut self, oid: ObjectId, capacity: usize) -> Result<(), ReturnCode>;

    /// Start reading the metadata of a data object
    fn begin_read_metadata(&mut self, oid: ObjectId, capacity: usize) -> Result<(), ReturnCode>;

    /// Start replacing the payload of a data object with `data`
    fn begin_write_data(&mut self, oid: ObjectId, data: &[u8]) -> Result<(), ReturnCode>;

    /// Response bytes of the last completed read
    ///
    /// Only meaningful once the sink reported success.
    fn take_response(&mut self) -> Vec<u8>;
}
