//! Sharing a gateway with resources the compiler does not own.
//!
//! Prohibited and managed target custom resources describe which hosts and paths belong to
//! someone else. Ingress paths aimed at such targets are pruned before compilation, and the
//! deployed resources serving them are carried over into the emitted configuration.

mod existing;
mod ingress;
mod merge;
mod targets;

pub use existing::{ExistingResourceError, retained_resources};
pub use ingress::prune_ingress;
pub use merge::merge;
pub use targets::{Target, TargetPath, TargetPolicy};
