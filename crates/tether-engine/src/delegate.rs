//! Delegate bridge
//!
//! Turns native function pointers and script functions into managed delegate
//! instances. One [`SynthesizedMethod`] is built per delegate invoke shape and
//! reused for every delegate of that shape.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tether_sdk::{
    BridgeResult, ClassRef, FunctionPtr, MethodShape, ObjectRef, ScriptValue, SynthesizedMethod,
};

use crate::bridge::Session;

/// Synthesized invoke records keyed by invoke shape
#[derive(Default)]
pub struct DelegateCache {
    methods: Mutex<FxHashMap<usize, Arc<SynthesizedMethod>>>,
}

impl DelegateCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `shape`, built from `shape` and `entry` on first use
    pub fn synthesize(&self, shape: MethodShape, entry: FunctionPtr) -> Arc<SynthesizedMethod> {
        let mut methods = self.methods.lock();
        methods
            .entry(shape.key)
            .or_insert_with(|| {
                tracing::debug!(shape = %shape.name, key = shape.key, "synthesized delegate method");
                Arc::new(SynthesizedMethod { shape, entry })
            })
            .clone()
    }

    /// Number of cached shapes
    pub fn len(&self) -> usize {
        self.methods.lock().len()
    }

    /// No cached shapes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Session<'_> {
    /// Wrap a native function pointer in a delegate of type `delegate` bound
    /// to `target`
    pub fn wrap_function_pointer(
        &self,
        entry: FunctionPtr,
        delegate: ClassRef,
        target: Option<ObjectRef>,
    ) -> ObjectRef {
        let shape = self.rt.delegate_invoke_shape(delegate);
        self.construct_delegate(shape, entry, delegate, target)
    }

    fn construct_delegate(
        &self,
        shape: MethodShape,
        entry: FunctionPtr,
        delegate: ClassRef,
        target: Option<ObjectRef>,
    ) -> ObjectRef {
        let method = self.bridge.delegates().synthesize(shape, entry);
        self.rt.construct_delegate(delegate, target, entry, &method)
    }

    /// Delegate of type `delegate` that calls the script function `func`.
    ///
    /// The delegate's target is the persistent wrapper of `func`. `None` when
    /// the code generator has no trampoline for the type, or the invoke shape
    /// is static and cannot carry a target.
    pub fn delegate_from_function(
        &self,
        func: ScriptValue,
        delegate: ClassRef,
    ) -> BridgeResult<Option<ObjectRef>> {
        let Some(entry) = self.env.function_entry(func, delegate) else {
            tracing::debug!(?delegate, "no trampoline for delegate type");
            return Ok(None);
        };
        let shape = self.rt.delegate_invoke_shape(delegate);
        if shape.is_static {
            tracing::debug!(shape = %shape.name, "static invoke shape cannot bind a script function");
            return Ok(None);
        }
        let target = self.persistent_for(func)?;
        Ok(Some(self.construct_delegate(shape, entry, delegate, target)))
    }
}
