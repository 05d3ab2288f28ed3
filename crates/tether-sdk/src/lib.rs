//! Tether SDK - collaborator ABI for the managed-runtime/script bridge
//!
//! This crate holds the types shared between the bridge engine and the two
//! sides it connects: opaque handles, native storage shapes, metadata
//! descriptors, and the traits the embedding implements for its script engine
//! ([`ScriptEnv`], [`CallFrame`]) and managed runtime ([`ManagedRuntime`]).
//!
//! The engine itself lives in `tether-engine`.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod storage;
pub mod types;
pub mod value;

pub use context::{CallFrame, ManagedRuntime, NativeException, ObjectLayout, ScriptEnv};
pub use error::{BridgeError, BridgeResult, CallOutcome};
pub use storage::{ArgSlot, BufferRegion, FieldAddress, FieldBase, NativeStorage, ValueBox};
pub use types::{
    FieldDescriptor, MethodDescriptor, MethodDescriptorBuilder, MethodShape, MethodWrapper,
    ParameterDescriptor, PointerWidth, PrimitiveTag, SynthesizedMethod, TypeDescriptor, TypeKind,
};
pub use value::{ClassRef, FunctionPtr, ObjectRef, PersistentRef, ScriptObjectId, ScriptValue};
