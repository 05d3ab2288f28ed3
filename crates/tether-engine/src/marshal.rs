//! Reflection marshaller
//!
//! Builds native argument slots from script arguments, invokes the method,
//! writes by-reference results back into their script holders and converts
//! the return value.

use tether_sdk::{
    ArgSlot, BridgeError, BridgeResult, CallFrame, MethodDescriptor, MethodWrapper,
    NativeException, NativeStorage, ParameterDescriptor, ScriptValue, TypeKind,
};

use crate::bridge::Session;

/// Description used when an exception's own `ToString()` throws
pub const UNKNOWN_EXCEPTION: &str = "unknown native exception";

impl Session<'_> {
    /// Marshal `frame`'s arguments for `wrapper`, invoke it on `receiver` and
    /// convert the result. `Ok(None)` for a `void` method.
    pub fn invoke(
        &self,
        wrapper: &MethodWrapper,
        frame: &dyn CallFrame,
        receiver: Option<&NativeStorage>,
    ) -> BridgeResult<Option<ScriptValue>> {
        let method = wrapper.method.as_ref();
        let mut args = self.marshal_arguments(method, frame)?;

        tracing::trace!(method = %method.name, args = args.len(), "invoking native method");
        let returned = self
            .rt
            .invoke(method, wrapper.entry, receiver, &mut args)
            .map_err(|NativeException(exception)| {
                let message = self
                    .rt
                    .describe_exception(exception)
                    .unwrap_or_else(|_| UNKNOWN_EXCEPTION.to_string());
                tracing::debug!(method = %method.name, %message, "native method raised");
                BridgeError::NativeFault(message)
            })?;

        self.write_back(method, frame, &args)?;

        if method.return_type.is_void() {
            return Ok(None);
        }
        self.to_script(&method.return_type, returned).map(Some)
    }

    fn marshal_arguments(&self, method: &MethodDescriptor, frame: &dyn CallFrame) -> BridgeResult<Vec<ArgSlot>> {
        let start = method.first_script_param();
        let mut args = Vec::with_capacity(method.params.len());
        if method.is_extension {
            args.push(self.extension_receiver(method, frame));
        }
        for (index, param) in method.params.iter().enumerate().skip(start) {
            let js_index = index - start;
            let slot = if param.is_variadic && index + 1 == method.params.len() {
                self.pack_variadic(param, frame, js_index)?
            } else {
                self.marshal_argument(method, index, param, frame.arg(js_index))?
            };
            args.push(slot);
        }
        Ok(args)
    }

    fn extension_receiver(&self, method: &MethodDescriptor, frame: &dyn CallFrame) -> ArgSlot {
        let storage = self.env.native_object(frame.holder());
        match (method.params.first(), storage) {
            (Some(param), Some(storage)) if param.ty.is_value_type() => {
                ArgSlot::Value(self.payload_of(&storage, param.ty.size))
            }
            (_, storage) => ArgSlot::Object(storage.and_then(|s| s.as_object())),
        }
    }

    fn marshal_argument(
        &self,
        method: &MethodDescriptor,
        index: usize,
        param: &ParameterDescriptor,
        val: ScriptValue,
    ) -> BridgeResult<ArgSlot> {
        let ty = param.ty.as_ref();
        let defaulted = param.has_default && self.env.is_undefined(val);

        if ty.is_value_type() {
            if ty.kind == TypeKind::Nullable {
                let source = if param.by_ref { self.unwrap_ref(val) } else { Some(val) };
                return Ok(ArgSlot::Value(self.read_nullable(source, ty)?));
            }
            if param.by_ref {
                let payload = self.read_value_type(self.unwrap_ref(val), ty)?;
                return Ok(ArgSlot::Value(payload.unwrap_or_else(|| vec![0; ty.size])));
            }
            if defaulted {
                return Ok(self
                    .rt
                    .default_argument(method, index)
                    .unwrap_or_else(|| ArgSlot::Value(vec![0; ty.size])));
            }
            let payload = self.read_value_type(Some(val), ty)?;
            return Ok(ArgSlot::Value(payload.unwrap_or_else(|| vec![0; ty.size])));
        }

        if param.by_ref {
            let Some(inner) = self.unwrap_ref(val) else {
                return Ok(ArgSlot::Object(None));
            };
            let current = match (self.env.native_object(inner), self.env.native_object_class(inner)) {
                (Some(storage), Some(class)) if self.rt.is_assignable_from(ty.class, class) => {
                    storage.as_object()
                }
                (Some(_), _) => None,
                (None, _) if ty.is_any_object() => self.to_native(ty, inner)?,
                (None, _) => None,
            };
            return Ok(ArgSlot::Object(current));
        }

        if ty.kind == TypeKind::Pointer {
            let pointee = ty.element().ok_or_else(|| {
                BridgeError::InvalidOperation(format!("{} has no pointee type", ty.name))
            })?;
            let payload = self.read_value_type(self.unwrap_ref(val), pointee)?;
            return Ok(ArgSlot::Pointer(payload));
        }

        if defaulted {
            return Ok(self
                .rt
                .default_argument(method, index)
                .unwrap_or(ArgSlot::Object(None)));
        }
        Ok(ArgSlot::Object(self.to_native(ty, val)?))
    }

    fn pack_variadic(&self, param: &ParameterDescriptor, frame: &dyn CallFrame, js_start: usize) -> BridgeResult<ArgSlot> {
        let element = param.ty.element().ok_or_else(|| {
            BridgeError::InvalidOperation(format!("{} has no element type", param.ty.name))
        })?;
        let len = frame.arg_count().saturating_sub(js_start);
        let array = self.rt.new_array(param.ty.class, len);
        for i in 0..len {
            let val = frame.arg(js_start + i);
            if element.is_value_type() {
                let payload = self
                    .read_value_type(Some(val), element)?
                    .unwrap_or_else(|| vec![0; element.size]);
                self.rt.array_set_value(array, i, &payload);
            } else {
                self.rt.array_set_ref(array, i, self.to_native(element, val)?);
            }
        }
        Ok(ArgSlot::Object(Some(array)))
    }

    fn write_back(&self, method: &MethodDescriptor, frame: &dyn CallFrame, args: &[ArgSlot]) -> BridgeResult<()> {
        let start = method.first_script_param();
        for (index, param) in method.params.iter().enumerate().skip(start) {
            let Some(slot) = args.get(index) else {
                break;
            };
            let holder = frame.arg(index - start);
            let out = match slot {
                ArgSlot::Value(bytes) if param.by_ref => self.write_value_type(bytes, &param.ty)?,
                ArgSlot::Object(obj) if param.by_ref => self.to_script(&param.ty, *obj)?,
                ArgSlot::Pointer(Some(bytes)) => match param.ty.element() {
                    Some(pointee) => self.write_value_type(bytes, pointee)?,
                    None => continue,
                },
                _ => continue,
            };
            self.set_ref(holder, out);
        }
        Ok(())
    }

    /// Slot 0 of a by-reference holder
    pub(crate) fn unwrap_ref(&self, holder: ScriptValue) -> Option<ScriptValue> {
        if self.env.is_object(holder) {
            Some(self.env.get_property(holder, 0))
        } else {
            None
        }
    }

    fn set_ref(&self, holder: ScriptValue, val: ScriptValue) {
        if self.env.is_object(holder) {
            self.env.set_property(holder, 0, val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::config::BridgeConfig;
    use std::sync::Arc;
    use tether_sdk::{ManagedRuntime, ScriptEnv, ValueBox};
    use tether_testkit::{FakeFrame, FakeRuntime, FakeScript, JsValue};

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(BridgeConfig::default()))
    }

    #[test]
    fn test_unwrap_ref() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);

        assert!(s.unwrap_ref(env.create_int32(1)).is_none());
        let cell = env.new_array(&[env.create_string("a")]);
        let inner = s.unwrap_ref(cell).unwrap();
        assert_eq!(env.value(inner), JsValue::Str("a".into()));
        let empty = env.new_array(&[]);
        assert_eq!(env.value(s.unwrap_ref(empty).unwrap()), JsValue::Undefined);
    }

    #[test]
    fn test_write_back_skips_by_value_slots() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let point = rt.define_struct("Point", 4);
        let method = MethodDescriptor::builder("Move", b.object.clone(), b.void.clone())
            .param(ParameterDescriptor::new("p", point.clone()))
            .param(ParameterDescriptor::new("n", b.i4.clone()).by_ref())
            .static_method()
            .build();
        let entry = rt.register_method(|_, _, args| {
            args[0] = ArgSlot::Value(vec![9; 4]);
            args[1] = ArgSlot::Value(6i32.to_le_bytes().to_vec());
            Ok(None)
        });

        let payload = ValueBox::new(vec![1, 0, 0, 0]);
        let proxy = env.create_native_object(point.class, NativeStorage::Boxed(payload.clone()));
        let cell = env.new_array(&[env.create_int32(0)]);
        let frame = FakeFrame::new(&env, vec![proxy, cell]);
        let returned = s.invoke(&MethodWrapper::new(method, entry), &frame, None).unwrap();

        assert!(returned.is_none());
        assert_eq!(payload.snapshot(), vec![1, 0, 0, 0]);
        assert_eq!(env.value(env.get_property(proxy, 0)), JsValue::Undefined);
        assert_eq!(env.value(env.get_property(cell, 0)), JsValue::Int(6));
    }

    #[test]
    fn test_exception_description() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let method = MethodDescriptor::builder("Fail", b.object.clone(), b.i4.clone())
            .static_method()
            .build();
        let described = rt.register_method(|rt, _, _| Err(rt.new_exception(Some("IOException: gone"))));
        let opaque = rt.register_method(|rt, _, _| Err(rt.new_exception(None)));
        let frame = FakeFrame::new(&env, vec![]);

        assert_eq!(
            s.invoke(&MethodWrapper::new(method.clone(), described), &frame, None),
            Err(BridgeError::NativeFault("IOException: gone".into()))
        );
        assert_eq!(
            s.invoke(&MethodWrapper::new(method, opaque), &frame, None),
            Err(BridgeError::NativeFault(UNKNOWN_EXCEPTION.into()))
        );
    }

    #[test]
    fn test_missing_default_is_zero_filled() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let method = MethodDescriptor::builder("Pad", b.object.clone(), b.i4.clone())
            .param(ParameterDescriptor::new("width", b.i4.clone()).with_default())
            .static_method()
            .build();
        let entry = rt.register_method(|rt, _, args| {
            assert_eq!(args[0], ArgSlot::Value(vec![0; 4]));
            Ok(Some(rt.box_value(rt.builtins().i4.class, &1i32.to_le_bytes())))
        });
        let frame = FakeFrame::new(&env, vec![]);
        let returned = s.invoke(&MethodWrapper::new(method, entry), &frame, None).unwrap();
        assert_eq!(env.value(returned.unwrap()), JsValue::Int(1));
    }
}
