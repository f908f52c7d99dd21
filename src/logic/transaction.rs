//! Synchronous bridge over the element's asynchronous commands
//!
//! A [`Transaction`] owns one element handle and the sink that handle
//! reports to. Each command is issued with a `begin_*` call and resolved
//! with [`Transaction::await_completion`], which polls the sink and sleeps
//! one poll interval between polls. The handle is released when the
//! transaction is dropped, on every exit path.

use std::thread;
use std::time::Instant;

use tracing::{debug, warn};

use crate::error::{AttestResult, TransactionError};
use crate::model::{CompletionSink, ObjectId, ReturnCode, TransactionStatus, WaitPolicy};
use crate::ports::{ElementHandle, TransactionFactory};

pub struct Transaction<H: ElementHandle> {
    handle: H,
    sink: CompletionSink,
    wait: WaitPolicy,
    in_flight: bool,
}

impl<H: ElementHandle> Transaction<H> {
    /// Allocate a handle bound to a fresh completion sink
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::CreationFailed` (or whatever the factory
    /// reports) if no handle can be allocated
    pub fn create<F>(factory: &F, wait: WaitPolicy) -> AttestResult<Self>
    where
        F: TransactionFactory<Handle = H>,
    {
        let sink = CompletionSink::new();
        let handle = factory.create_handle(sink.clone())?;
        Ok(Self {
            handle,
            sink,
            wait,
            in_flight: false,
        })
    }

    pub fn status(&self) -> TransactionStatus {
        self.sink.status()
    }

    pub fn begin_read_object(
        &mut self,
        oid: ObjectId,
        capacity: usize,
    ) -> Result<(), TransactionError> {
        debug!("Begin read data object {}", oid);
        self.begin(|handle| handle.begin_read_data(oid, capacity))
    }

    pub fn begin_read_metadata(
        &mut self,
        oid: ObjectId,
        capacity: usize,
    ) -> Result<(), TransactionError> {
        debug!("Begin read metadata {}", oid);
        self.begin(|handle| handle.begin_read_metadata(oid, capacity))
    }

    pub fn begin_write_object(&mut self, oid: ObjectId, data: &[u8]) -> Result<(), TransactionError> {
        debug!("Begin write of {} bytes to {}", data.len(), oid);
        self.begin(|handle| handle.begin_write_data(oid, data))
    }

    fn begin(
        &mut self,
        start: impl FnOnce(&mut H) -> Result<(), ReturnCode>,
    ) -> Result<(), TransactionError> {
        if self.in_flight {
            return Err(TransactionError::InFlight);
        }

        self.sink.arm();
        if let Err(code) = start(&mut self.handle) {
            // Nothing was started, resolve the sink ourselves.
            self.sink.complete(TransactionStatus::Failure(code));
            return Err(TransactionError::Rejected { code });
        }

        self.in_flight = true;
        Ok(())
    }

    /// Wait until the outstanding command leaves `Busy`
    ///
    /// Sleeps `poll_interval` between polls. When the policy has a timeout
    /// and it expires, returns `TransactionError::Timeout` and the handle
    /// stays marked as in flight: the element may still complete the
    /// command, so no further command may be issued on this transaction.
    pub fn await_completion(&mut self) -> Result<(), TransactionError> {
        let started = Instant::now();
        loop {
            match self.status() {
                TransactionStatus::Busy => {}
                TransactionStatus::Success => {
                    self.in_flight = false;
                    return Ok(());
                }
                TransactionStatus::Failure(code) => {
                    self.in_flight = false;
                    return Err(TransactionError::Failed { code });
                }
            }

            if let Some(limit) = self.wait.timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    warn!("Element did not respond within {:?}", waited);
                    return Err(TransactionError::Timeout { waited });
                }
            }

            thread::sleep(self.wait.poll_interval);
        }
    }

    /// Read a data object into `out`, returning the number of bytes read
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::Overflow` if the element returned more
    /// bytes than `out` can hold; `out` is left untouched in that case.
    pub fn read_object(&mut self, oid: ObjectId, out: &mut [u8]) -> Result<usize, TransactionError> {
        self.begin_read_object(oid, out.len())?;
        self.await_completion()?;
        self.copy_response(out)
    }

    /// Read the metadata of a data object into `out`
    pub fn read_metadata(
        &mut self,
        oid: ObjectId,
        out: &mut [u8],
    ) -> Result<usize, TransactionError> {
        self.begin_read_metadata(oid, out.len())?;
        self.await_completion()?;
        self.copy_response(out)
    }

    pub fn write_object(&mut self, oid: ObjectId, data: &[u8]) -> Result<(), TransactionError> {
        self.begin_write_object(oid, data)?;
        self.await_completion()
    }

    fn copy_response(&mut self, out: &mut [u8]) -> Result<usize, TransactionError> {
        let response = self.handle.take_response();
        if response.len() > out.len() {
            return Err(TransactionError::Overflow {
                len: response.len(),
                capacity: out.len(),
            });
        }
        out[..response.len()].copy_from_slice(&response);
        Ok(response.len())
    }
}
