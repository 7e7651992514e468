mod document;
pub mod ingress;
mod objects;
mod snapshot;

pub use document::{CertificateEntry, SnapshotDocument, SnapshotDocumentError};
pub use objects::{ObjectKey, ObjectKeyError, SecretId, ServiceId};
pub use snapshot::{CertificateStore, InMemorySnapshot, InMemorySnapshotBuilder, Snapshot};
