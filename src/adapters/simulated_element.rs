//! In-process simulation of a secure element
//!
//! Holds a table of data objects with their metadata, a finite pool of
//! transaction handles, and resolves accepted commands from a worker thread
//! after a configurable latency, the way a driver callback would.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{AttestResult, TransactionError};
use crate::model::{
    AccessCondition, CompletionSink, ObjectId, ReturnCode, SlotMetadata, TransactionStatus,
};
use crate::ports::{ElementConnector, ElementHandle, TransactionFactory};

const LIFECYCLE_OPERATIONAL: u8 = 0x07;

/// Maximum size of a certificate data object
pub const CERTIFICATE_SLOT_SIZE: u16 = 1728;

#[derive(Debug, Clone)]
struct DataObject {
    data: Vec<u8>,
    metadata: SlotMetadata,
}

#[derive(Debug)]
struct ElementState {
    objects: BTreeMap<ObjectId, DataObject>,
    open_handles: usize,
    handle_limit: usize,
}

/// Simulated secure element
///
/// Cloning yields another reference to the same element.
#[derive(Debug, Clone)]
pub struct SimulatedElement {
    state: Arc<Mutex<ElementState>>,
    latency: Duration,
}

impl SimulatedElement {
    pub const DEFAULT_HANDLE_LIMIT: usize = 4;
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(20);

    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ElementState {
                objects: BTreeMap::new(),
                open_handles: 0,
                handle_limit: Self::DEFAULT_HANDLE_LIMIT,
            })),
            latency: Self::DEFAULT_LATENCY,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ElementState> {
        lock_state(&self.state)
    }

    /// Add a read-only object, as provisioned at the factory
    pub fn with_factory_certificate(self, oid: ObjectId, certificate: Vec<u8>) -> Self {
        let metadata = SlotMetadata {
            lifecycle_state: Some(LIFECYCLE_OPERATIONAL),
            max_size: Some(CERTIFICATE_SLOT_SIZE),
            used_size: Some(saturating_size(certificate.len())),
            change: Some(AccessCondition::Never),
            read: Some(AccessCondition::Always),
            execute: Some(AccessCondition::Always),
            ..SlotMetadata::default()
        };
        self.with_object(oid, certificate, metadata)
    }

    /// Add an empty object anyone may write
    pub fn with_writable_slot(self, oid: ObjectId, max_size: u16) -> Self {
        let metadata = SlotMetadata {
            lifecycle_state: Some(LIFECYCLE_OPERATIONAL),
            max_size: Some(max_size),
            used_size: Some(0),
            change: Some(AccessCondition::Always),
            read: Some(AccessCondition::Always),
            execute: Some(AccessCondition::Always),
            ..SlotMetadata::default()
        };
        self.with_object(oid, Vec::new(), metadata)
    }

    pub fn with_object(self, oid: ObjectId, data: Vec<u8>, metadata: SlotMetadata) -> Self {
        self.lock().objects.insert(oid, DataObject { data, metadata });
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_handle_limit(self, limit: usize) -> Self {
        self.lock().handle_limit = limit;
        self
    }

    /// Current payload of a data object
    pub fn object(&self, oid: ObjectId) -> Option<Vec<u8>> {
        self.lock().objects.get(&oid).map(|object| object.data.clone())
    }
}

impl Default for SimulatedElement {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata size fields are 16 bits wide
fn saturating_size(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

fn lock_state(state: &Mutex<ElementState>) -> MutexGuard<'_, ElementState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ElementConnector for SimulatedElement {
    type Element = SimulatedElement;

    fn connect(&self) -> AttestResult<Self::Element> {
        let objects = self.lock().objects.len();
        info!("Simulated element ready with {} data objects", objects);
        Ok(self.clone())
    }
}

impl TransactionFactory for SimulatedElement {
    type Handle = SimulatedHandle;

    fn create_handle(&self, sink: CompletionSink) -> AttestResult<Self::Handle> {
        let mut state = self.lock();
        if state.open_handles >= state.handle_limit {
            return Err(TransactionError::CreationFailed.into());
        }
        state.open_handles += 1;
        debug!("Handle allocated ({} open)", state.open_handles);

        Ok(SimulatedHandle {
            state: Arc::clone(&self.state),
            sink,
            latency: self.latency,
            pending: Arc::new(AtomicBool::new(false)),
            response: Vec::new(),
        })
    }
}

/// Transaction handle on a [`SimulatedElement`]
#[derive(Debug)]
pub struct SimulatedHandle {
    state: Arc<Mutex<ElementState>>,
    sink: CompletionSink,
    latency: Duration,
    /// Set while a worker thread still owes a completion
    pending: Arc<AtomicBool>,
    response: Vec<u8>,
}

impl SimulatedHandle {
    fn dispatch(&self, status: TransactionStatus) {
        if self.latency.is_zero() {
            self.sink.complete(status);
            return;
        }

        let sink = self.sink.clone();
        let latency = self.latency;
        let pending = Arc::clone(&self.pending);
        pending.store(true, Ordering::Release);
        thread::spawn(move || {
            thread::sleep(latency);
            pending.store(false, Ordering::Release);
            sink.complete(status);
        });
    }

    fn ensure_idle(&self) -> Result<(), ReturnCode> {
        if self.pending.load(Ordering::Acquire) {
            return Err(ReturnCode::INSTANCE_IN_USE);
        }
        Ok(())
    }

    fn settle(&mut self, result: Result<Vec<u8>, ReturnCode>) {
        let status = match result {
            Ok(response) => {
                self.response = response;
                TransactionStatus::Success
            }
            Err(code) => TransactionStatus::Failure(code),
        };
        self.dispatch(status);
    }
}

impl ElementHandle for SimulatedHandle {
    fn begin_read_data(&mut self, oid: ObjectId, capacity: usize) -> Result<(), ReturnCode> {
        self.ensure_idle()?;
        let result = {
            let state = lock_state(&self.state);
            match state.objects.get(&oid) {
                None => Err(ReturnCode::INVALID_OBJECT_ID),
                Some(object) if object.metadata.read == Some(AccessCondition::Never) => {
                    Err(ReturnCode::ACCESS_CONDITION_NOT_SATISFIED)
                }
                Some(object) if object.data.len() > capacity => {
                    Err(ReturnCode::DATA_OBJECT_BOUNDARY_EXCEEDED)
                }
                Some(object) => Ok(object.data.clone()),
            }
        };
        self.settle(result);
        Ok(())
    }

    fn begin_read_metadata(&mut self, oid: ObjectId, capacity: usize) -> Result<(), ReturnCode> {
        self.ensure_idle()?;
        let result = {
            let state = lock_state(&self.state);
            match state.objects.get(&oid) {
                None => Err(ReturnCode::INVALID_OBJECT_ID),
                Some(object) => {
                    let encoded = object.metadata.encode();
                    if encoded.len() > capacity {
                        Err(ReturnCode::DATA_OBJECT_BOUNDARY_EXCEEDED)
                    } else {
                        Ok(encoded)
                    }
                }
            }
        };
        self.settle(result);
        Ok(())
    }

    fn begin_write_data(&mut self, oid: ObjectId, data: &[u8]) -> Result<(), ReturnCode> {
        self.ensure_idle()?;
        let result = {
            let mut state = lock_state(&self.state);
            match state.objects.get_mut(&oid) {
                None => Err(ReturnCode::INVALID_OBJECT_ID),
                Some(object) if object.metadata.is_write_locked() => {
                    Err(ReturnCode::ACCESS_CONDITION_NOT_SATISFIED)
                }
                Some(object)
                    if object
                        .metadata
                        .max_size
                        .is_some_and(|max| data.len() > usize::from(max)) =>
                {
                    Err(ReturnCode::DATA_OBJECT_BOUNDARY_EXCEEDED)
                }
                Some(object) => {
                    object.data = data.to_vec();
                    object.metadata.used_size = Some(saturating_size(data.len()));
                    Ok(Vec::new())
                }
            }
        };
        self.settle(result);
        Ok(())
    }

    fn take_response(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.response)
    }
}

impl Drop for SimulatedHandle {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        state.open_handles = state.open_handles.saturating_sub(1);
        debug!("Handle released ({} open)", state.open_handles);
    }
}
