mod certificate;
mod config;
mod digest;
mod metadata;
mod object_id;
mod status;

pub use certificate::{Certificate, CertificateBlob};
pub use config::{AttestationConfig, WaitPolicy};
pub use digest::Digest;
pub use metadata::{AccessCondition, MetadataError, SlotMetadata};
pub use object_id::{ObjectId, ObjectIdError};
pub use status::{CompletionSink, ReturnCode, TransactionStatus};
