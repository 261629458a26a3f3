pub mod base;
pub mod builtin;
pub mod registry;

pub use base::{Action, ActionArgs, ActionResult, ActionSpec, CallConvention, LocatorUse, ParamSpec};
pub use builtin::builtin_registry;
pub use registry::{ActionFuture, ActionRegistry};
