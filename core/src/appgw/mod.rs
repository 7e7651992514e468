//! The Application Gateway configuration document the compiler emits.
//!
//! Every resource is a [`Resource`] carrying a name, a fully qualified id, an etag and a
//! kind-specific property block. Resources reference each other through [`SubResource`] ids only.

mod identifier;
mod resources;

pub use identifier::*;
pub use resources::*;
