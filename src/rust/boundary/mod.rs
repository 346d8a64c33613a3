//! Adapter between the classifier and a JVM host.
//!
//! Everything the host owns is addressed through generation-checked handles;
//! the `jni` module only translates arguments, results and errors.

mod config;
mod handles;
mod jni;
mod reflection;
mod registry;

pub use config::{BoundaryConfig, FatalPolicy};
pub use handles::{HandleError, HandleTable};
pub use reflection::{KeywordClass, KEYWORD_CLASS};
pub use registry::{BoundaryError, Registry};
