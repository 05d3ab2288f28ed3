//! Tether testkit - in-memory collaborators for exercising the bridge
//!
//! [`FakeScript`] is a small JS-like value heap, [`FakeRuntime`] a managed
//! runtime with a flat object table and closure-backed methods, and
//! [`FakeFrame`] a call frame over script arguments. None of them aim to be
//! faithful engines; they are just precise enough to observe what the bridge
//! asks of its collaborators.

mod frame;
mod runtime;
mod script;

pub use frame::FakeFrame;
pub use runtime::{Builtins, FakeObject, FakeRuntime, NativeFn, ObjectBody, HEADER_SIZE};
pub use script::{FakeScript, JsValue};
