//! Overload dispatch and script-facing callbacks
//!
//! `dispatch_*` return a [`CallOutcome`]; the `*_callback` entry points
//! translate that outcome into the frame's return value or thrown error.

use std::sync::Arc;

use tether_sdk::{
    BridgeError, BridgeResult, CallFrame, CallOutcome, FieldDescriptor, MethodWrapper,
    NativeStorage, ScriptValue, TypeDescriptor, ValueBox,
};

use crate::bridge::Session;

/// Constructors of one class
#[derive(Debug, Clone)]
pub struct ConstructorSet {
    /// Class being constructed
    pub class: Arc<TypeDescriptor>,
    /// Overloads, in registration order
    pub candidates: Vec<MethodWrapper>,
}

impl Session<'_> {
    /// Pick the first overload whose arguments match and invoke it.
    ///
    /// A lone candidate with no defaulted or variadic parameters is invoked
    /// without matching unless `always_check_arguments` is set.
    pub fn dispatch_method(&self, overloads: &[MethodWrapper], frame: &dyn CallFrame) -> CallOutcome {
        CallOutcome::from_result(self.dispatch(overloads, frame, None))
    }

    /// [`dispatch_method`](Self::dispatch_method), reporting the outcome to
    /// `frame`
    pub fn method_callback(&self, overloads: &[MethodWrapper], frame: &mut dyn CallFrame) {
        let outcome = self.dispatch_method(overloads, frame);
        self.report(outcome, frame);
    }

    /// Allocate an instance of `ctors.class`, run the first matching
    /// constructor on it, and return the new storage. The storage is bound to
    /// the frame's `this` only when the constructor succeeds.
    pub fn construct(&self, ctors: &ConstructorSet, frame: &dyn CallFrame) -> BridgeResult<NativeStorage> {
        if ctors.candidates.is_empty() {
            return Err(BridgeError::NoConstructor);
        }
        let class = ctors.class.as_ref();
        let storage = if class.is_value_type() {
            NativeStorage::Boxed(ValueBox::zeroed(class.size))
        } else {
            NativeStorage::Object(self.rt.alloc_object(class.class))
        };
        self.dispatch(&ctors.candidates, frame, Some(&storage))?;
        self.env.bind_native(frame.this(), class.class, storage.clone());
        tracing::trace!(class = %class.name, "constructed native instance");
        Ok(storage)
    }

    /// [`construct`](Self::construct), reporting failures to `frame`
    pub fn constructor_callback(&self, ctors: &ConstructorSet, frame: &mut dyn CallFrame) -> Option<NativeStorage> {
        match self.construct(ctors, frame) {
            Ok(storage) => Some(storage),
            Err(err) => {
                frame.throw_error(&err.to_string());
                None
            }
        }
    }

    /// Field getter entry point: reads from the frame's holder
    pub fn getter_callback(&self, field: &FieldDescriptor, frame: &mut dyn CallFrame) {
        match self.get_field(field, frame.holder()) {
            Ok(val) => frame.set_return(val),
            Err(err) => frame.throw_error(&err.to_string()),
        }
    }

    /// Field setter entry point: writes argument 0 into the frame's holder
    pub fn setter_callback(&self, field: &FieldDescriptor, frame: &mut dyn CallFrame) {
        let val = frame.arg(0);
        if let Err(err) = self.set_field(field, frame.holder(), val) {
            frame.throw_error(&err.to_string());
        }
    }

    fn dispatch(
        &self,
        overloads: &[MethodWrapper],
        frame: &dyn CallFrame,
        receiver: Option<&NativeStorage>,
    ) -> BridgeResult<Option<ScriptValue>> {
        let check = overloads.len() > 1 || self.bridge.config().options.always_check_arguments;
        for wrapper in overloads {
            let method = wrapper.method.as_ref();
            if (check || method.optional_count() > 0 || method.has_variadic()) && !self.matches(method, frame) {
                continue;
            }
            tracing::debug!(method = %method.name, declaring = %method.declaring.name, "dispatching");
            let own_receiver;
            let receiver = match receiver {
                Some(storage) => Some(storage),
                None if !method.is_static => {
                    own_receiver = self.env.native_object(frame.holder());
                    own_receiver.as_ref()
                }
                None => None,
            };
            return self.invoke(wrapper, frame, receiver);
        }
        tracing::debug!(candidates = overloads.len(), "no overload matched");
        Err(BridgeError::ArgumentMismatch)
    }

    fn report(&self, outcome: CallOutcome, frame: &mut dyn CallFrame) {
        match outcome {
            CallOutcome::Returned(Some(val)) => frame.set_return(val),
            CallOutcome::Returned(None) => {}
            failed => {
                if let Some(message) = failed.error_message() {
                    frame.throw_error(&message);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::config::{BridgeConfig, BridgeOptions};
    use tether_sdk::{ManagedRuntime, MethodDescriptor, ParameterDescriptor, ScriptEnv};
    use tether_testkit::{FakeFrame, FakeRuntime, FakeScript, JsValue};

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(BridgeConfig::default()))
    }

    #[test]
    fn test_construct_without_candidates() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let counter = rt.define_class("Counter", None, 4);
        let ctors = ConstructorSet {
            class: counter,
            candidates: Vec::new(),
        };
        let this = env.new_object();
        let frame = FakeFrame::new(&env, vec![]).with_this(this);
        assert!(matches!(s.construct(&ctors, &frame), Err(BridgeError::NoConstructor)));
        assert_eq!(rt.object_count(), 0);
        assert!(env.native_object(this).is_none());
    }

    #[test]
    fn test_value_type_receiver_starts_zeroed() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let point = rt.define_struct("Point", 8);
        let ctor = MethodDescriptor::builder(".ctor", point.clone(), b.void.clone()).build();
        let entry = rt.register_method(|_, receiver, _| {
            assert!(matches!(receiver, Some(NativeStorage::Boxed(p)) if p.snapshot() == vec![0; 8]));
            Ok(None)
        });
        let ctors = ConstructorSet {
            class: point.clone(),
            candidates: vec![MethodWrapper::new(ctor, entry)],
        };
        let this = env.new_object();
        let frame = FakeFrame::new(&env, vec![]).with_this(this);
        let storage = s.construct(&ctors, &frame).unwrap();
        assert!(storage.owns_payload());
        assert_eq!(env.native_object_class(this), Some(point.class));
    }

    #[test]
    fn test_method_callback_reports_outcome() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let answer = MethodDescriptor::builder("Answer", b.object.clone(), b.i4.clone())
            .static_method()
            .build();
        let i4 = b.i4.class;
        let entry = rt.register_method(move |rt, _, _| Ok(Some(rt.box_value(i4, &42i32.to_le_bytes()))));
        let overloads = [MethodWrapper::new(answer, entry)];

        let mut frame = FakeFrame::new(&env, vec![]);
        s.method_callback(&overloads, &mut frame);
        assert_eq!(env.value(frame.returned.unwrap()), JsValue::Int(42));
        assert!(frame.error.is_none());

        let mut frame = FakeFrame::new(&env, vec![]);
        s.method_callback(&[], &mut frame);
        assert!(frame.returned.is_none());
        assert_eq!(frame.error.as_deref(), Some("invalid arguments"));
    }

    #[test]
    fn test_forced_check_rejects_single_candidate() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let options = BridgeOptions {
            always_check_arguments: true,
            ..BridgeOptions::default()
        };
        let bridge = Bridge::new(Arc::new(BridgeConfig::new(options)));
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let square = MethodDescriptor::builder("Square", b.object.clone(), b.void.clone())
            .param(ParameterDescriptor::new("x", b.r8.clone()))
            .static_method()
            .build();
        let overloads = [MethodWrapper::new(square, rt.register_method(|_, _, _| Ok(None)))];

        let frame = FakeFrame::new(&env, vec![env.create_string("2")]);
        assert_eq!(s.dispatch_method(&overloads, &frame), CallOutcome::ArgumentMismatch);
        assert!(rt.calls().is_empty());
        let frame = FakeFrame::new(&env, vec![env.create_double(2.0)]);
        assert_eq!(s.dispatch_method(&overloads, &frame), CallOutcome::Returned(None));
    }
}
