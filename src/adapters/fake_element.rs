//! Scriptable in-memory element for unit tests
//!
//! Records every write it is asked to perform so tests can assert on the
//! exact commands the core issued.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use crate::error::{AttestResult, TransactionError};
use crate::model::{
    AccessCondition, CompletionSink, ObjectId, ReturnCode, SlotMetadata, TransactionStatus,
};
use crate::ports::{ElementConnector, ElementHandle, TransactionFactory};

/// How the fake resolves accepted commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Resolve inside the `begin_*` call
    Immediate,
    /// Resolve from another thread after the delay
    Delayed(Duration),
    /// Accept and never resolve
    NeverComplete,
    /// Refuse every command up front
    Reject(ReturnCode),
    /// Return read responses even when they exceed the caller's capacity
    IgnoreCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadData,
    ReadMetadata,
    WriteData,
}

#[derive(Debug)]
struct FakeState {
    objects: HashMap<ObjectId, Vec<u8>>,
    metadata: HashMap<ObjectId, Vec<u8>>,
    failures: HashMap<Operation, ReturnCode>,
    writes: Vec<(ObjectId, Vec<u8>)>,
    write_substitute: Option<Vec<u8>>,
    behavior: Behavior,
    handle_limit: usize,
    open_handles: usize,
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    state: Arc<Mutex<FakeState>>,
}

impl FakeElement {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                objects: HashMap::new(),
                metadata: HashMap::new(),
                failures: HashMap::new(),
                writes: Vec::new(),
                write_substitute: None,
                behavior: Behavior::Immediate,
                handle_limit: usize::MAX,
                open_handles: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn with_object(self, oid: ObjectId, data: Vec<u8>) -> Self {
        self.lock().objects.insert(oid, data);
        self
    }

    pub fn with_metadata(self, oid: ObjectId, metadata: Vec<u8>) -> Self {
        self.lock().metadata.insert(oid, metadata);
        self
    }

    pub fn with_behavior(self, behavior: Behavior) -> Self {
        self.lock().behavior = behavior;
        self
    }

    pub fn with_handle_limit(self, limit: usize) -> Self {
        self.lock().handle_limit = limit;
        self
    }

    /// Complete every `operation` with `Failure(code)`
    pub fn with_failure(self, operation: Operation, code: ReturnCode) -> Self {
        self.lock().failures.insert(operation, code);
        self
    }

    /// Store `data` instead of whatever is written
    pub fn with_write_substitute(self, data: Vec<u8>) -> Self {
        self.lock().write_substitute = Some(data);
        self
    }

    pub fn writes(&self) -> Vec<(ObjectId, Vec<u8>)> {
        self.lock().writes.clone()
    }

    pub fn stored(&self, oid: ObjectId) -> Option<Vec<u8>> {
        self.lock().objects.get(&oid).cloned()
    }

    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }
}

impl Default for FakeElement {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionFactory for FakeElement {
    type Handle = FakeHandle;

    fn create_handle(&self, sink: CompletionSink) -> AttestResult<Self::Handle> {
        let mut state = self.lock();
        if state.open_handles >= state.handle_limit {
            return Err(TransactionError::CreationFailed.into());
        }
        state.open_handles += 1;
        Ok(FakeHandle {
            state: Arc::clone(&self.state),
            sink,
            response: Vec::new(),
        })
    }
}

pub struct FakeConnector {
    pub element: Option<FakeElement>,
}

impl ElementConnector for FakeConnector {
    type Element = FakeElement;

    fn connect(&self) -> AttestResult<Self::Element> {
        self.element.clone().ok_or_else(|| {
            TransactionError::Failed {
                code: ReturnCode(0x0102),
            }
            .into()
        })
    }
}

pub struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
    sink: CompletionSink,
    response: Vec<u8>,
}

impl FakeHandle {
    fn run(
        &mut self,
        operation: Operation,
        execute: impl FnOnce(&mut FakeState) -> Result<Vec<u8>, ReturnCode>,
    ) -> Result<(), ReturnCode> {
        let mut state = self.state.lock().unwrap();
        if let Behavior::Reject(code) = state.behavior {
            return Err(code);
        }

        let failure = state.failures.get(&operation).copied();
        let status = match failure {
            Some(code) => TransactionStatus::Failure(code),
            None => match execute(&mut *state) {
                Ok(response) => {
                    self.response = response;
                    TransactionStatus::Success
                }
                Err(code) => TransactionStatus::Failure(code),
            },
        };

        match state.behavior {
            Behavior::NeverComplete => {}
            Behavior::Delayed(delay) => {
                let sink = self.sink.clone();
                thread::spawn(move || {
                    thread::sleep(delay);
                    sink.complete(status);
                });
            }
            _ => {
                self.sink.complete(status);
            }
        }
        Ok(())
    }
}

fn default_metadata() -> Vec<u8> {
    SlotMetadata {
        lifecycle_state: Some(0x07),
        change: Some(AccessCondition::Always),
        read: Some(AccessCondition::Always),
        ..SlotMetadata::default()
    }
    .encode()
}

impl ElementHandle for FakeHandle {
    fn begin_read_data(&mut self, oid: ObjectId, capacity: usize) -> Result<(), ReturnCode> {
        self.run(Operation::ReadData, |state| {
            let data = state
                .objects
                .get(&oid)
                .cloned()
                .ok_or(ReturnCode::INVALID_OBJECT_ID)?;
            if data.len() > capacity && state.behavior != Behavior::IgnoreCapacity {
                return Err(ReturnCode::DATA_OBJECT_BOUNDARY_EXCEEDED);
            }
            Ok(data)
        })
    }

    fn begin_read_metadata(&mut self, oid: ObjectId, capacity: usize) -> Result<(), ReturnCode> {
        self.run(Operation::ReadMetadata, |state| {
            let metadata = match state.metadata.get(&oid) {
                Some(raw) => raw.clone(),
                None if state.objects.contains_key(&oid) => default_metadata(),
                None => return Err(ReturnCode::INVALID_OBJECT_ID),
            };
            if metadata.len() > capacity && state.behavior != Behavior::IgnoreCapacity {
                return Err(ReturnCode::DATA_OBJECT_BOUNDARY_EXCEEDED);
            }
            Ok(metadata)
        })
    }

    fn begin_write_data(&mut self, oid: ObjectId, data: &[u8]) -> Result<(), ReturnCode> {
        self.state.lock().unwrap().writes.push((oid, data.to_vec()));
        self.run(Operation::WriteData, |state| {
            let locked = state
                .metadata
                .get(&oid)
                .and_then(|raw| SlotMetadata::decode(raw).ok())
                .is_some_and(|metadata| metadata.is_write_locked());
            if locked {
                return Err(ReturnCode::ACCESS_CONDITION_NOT_SATISFIED);
            }
            let stored = state
                .write_substitute
                .clone()
                .unwrap_or_else(|| data.to_vec());
            state.objects.insert(oid, stored);
            Ok(Vec::new())
        })
    }

    fn take_response(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.response)
    }
}

impl Drop for FakeHandle {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open_handles -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract_tests_for;
    use crate::ports::contract_tests::element_contract;

    contract_tests_for!(
        fake_element_contract,
        make = || FakeElement::new()
            .with_object(element_contract::WRITABLE_SLOT, Vec::new())
            .with_object(element_contract::LOCKED_SLOT, b"factory".to_vec())
            .with_metadata(element_contract::LOCKED_SLOT, element_contract::locked_metadata()),
        tests = {
            test_write_then_read_round_trip => element_contract::test_write_then_read_round_trip,
            test_read_unknown_object_fails => element_contract::test_read_unknown_object_fails,
            test_read_metadata_is_tlv => element_contract::test_read_metadata_is_tlv,
            test_write_to_locked_slot_fails => element_contract::test_write_to_locked_slot_fails,
            test_handles_are_released => element_contract::test_handles_are_released,
        }
    );

    #[test]
    fn test_writes_are_recorded() {
        let element = FakeElement::new();
        let mut handle = element.create_handle(CompletionSink::new()).unwrap();
        handle
            .begin_write_data(ObjectId::USER_CERTIFICATE, b"abc")
            .unwrap();

        assert_eq!(
            element.writes(),
            vec![(ObjectId::USER_CERTIFICATE, b"abc".to_vec())]
        );
    }

    #[test]
    fn test_scripted_failure() {
        let element = FakeElement::new()
            .with_object(ObjectId::USER_CERTIFICATE, Vec::new())
            .with_failure(Operation::ReadMetadata, ReturnCode(0x8005));
        let sink = CompletionSink::new();
        let mut handle = element.create_handle(sink.clone()).unwrap();

        sink.arm();
        handle
            .begin_read_metadata(ObjectId::USER_CERTIFICATE, 128)
            .unwrap();
        assert_eq!(sink.status(), TransactionStatus::Failure(ReturnCode(0x8005)));
    }
}
