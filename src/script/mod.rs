//! The script contract: lifecycle phases, environment variables, the result
//! envelope and a single invocation that ties them together.

pub mod invocation;
pub mod lifecycle;
pub mod result;

pub use invocation::ScriptInvocation;
pub use lifecycle::{Lifecycle, UnknownLifecycle};
pub use result::{META_KEY, ResultMetadata, ScriptResult, extract_metadata};
