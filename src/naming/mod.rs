//! Hierarchical naming directory shared by every component of an application.

pub mod directory;
pub mod node;
pub mod uri;
pub mod value;

pub use directory::{CallbackResolver, NamingDirectory, MAX_REFERENCE_HOPS};
pub use node::{Binding, CallbackTarget, DeferredCallback, NamingNode};
pub use uri::{NamingUri, DEFAULT_SCHEME};
pub use value::{Component, Value};
