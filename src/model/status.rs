//! Transaction status and the completion sink shared with the element
//!
//! The element reports the outcome of an asynchronous command by writing
//! into a [`CompletionSink`]. The sink is a single atomic cell so the
//! completing context (driver callback, worker thread) never blocks the
//! poller.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// 16-bit return code reported by the element or its host library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReturnCode(pub u16);

impl ReturnCode {
    /// Object identifier does not name a data object
    pub const INVALID_OBJECT_ID: ReturnCode = ReturnCode(0x8001);

    /// Access conditions of the data object are not satisfied
    pub const ACCESS_CONDITION_NOT_SATISFIED: ReturnCode = ReturnCode(0x8007);

    /// Write exceeds the maximum size of the data object
    pub const DATA_OBJECT_BOUNDARY_EXCEEDED: ReturnCode = ReturnCode(0x8008);

    /// Handle already has an operation outstanding
    pub const INSTANCE_IN_USE: ReturnCode = ReturnCode(0x0107);

    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Outcome of one asynchronous element operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Busy,
    Success,
    Failure(ReturnCode),
}

impl TransactionStatus {
    const BUSY: u32 = 0x0001_0000;
    const SUCCESS: u32 = 0x0002_0000;
    const FAILURE: u32 = 0x0003_0000;
    const TAG_MASK: u32 = 0xFFFF_0000;

    fn encode(self) -> u32 {
        match self {
            TransactionStatus::Busy => Self::BUSY,
            TransactionStatus::Success => Self::SUCCESS,
            TransactionStatus::Failure(code) => Self::FAILURE | u32::from(code.0),
        }
    }

    fn decode(raw: u32) -> Self {
        match raw & Self::TAG_MASK {
            Self::BUSY => TransactionStatus::Busy,
            Self::FAILURE => TransactionStatus::Failure(ReturnCode((raw & 0xFFFF) as u16)),
            _ => TransactionStatus::Success,
        }
    }

    pub fn is_busy(self) -> bool {
        matches!(self, TransactionStatus::Busy)
    }
}

/// Completion signal shared between a transaction and the element
///
/// A fresh sink reports `Success`: nothing is outstanding. [`arm`] moves it
/// to `Busy` before an operation is issued, and [`complete`] resolves it
/// exactly once.
///
/// [`arm`]: CompletionSink::arm
/// [`complete`]: CompletionSink::complete
#[derive(Debug, Clone)]
pub struct CompletionSink(Arc<AtomicU32>);

impl CompletionSink {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU32::new(TransactionStatus::Success.encode())))
    }

    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::decode(self.0.load(Ordering::Acquire))
    }

    /// Mark an operation as outstanding
    pub fn arm(&self) {
        self.0
            .store(TransactionStatus::Busy.encode(), Ordering::Release);
    }

    /// Resolve the outstanding operation
    ///
    /// Returns `false` and leaves the sink untouched when nothing is
    /// outstanding, so a late or duplicated completion can never move a
    /// resolved status backward or overwrite it.
    pub fn complete(&self, status: TransactionStatus) -> bool {
        if status.is_busy() {
            return false;
        }
        self.0
            .compare_exchange(
                TransactionStatus::Busy.encode(),
                status.encode(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for CompletionSink {
    fn default() -> Self {
        Self::new()
    }
}
