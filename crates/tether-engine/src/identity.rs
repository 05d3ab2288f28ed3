//! Object identity bridge
//!
//! Converts managed object references to script values and back, with the
//! special cases for primitives, strings, sentinel types, value types and
//! plain script objects.

use tether_sdk::{
    BridgeResult, NativeStorage, ObjectRef, PrimitiveTag, ScriptValue, TypeDescriptor,
    ValueBox,
};

use crate::bridge::{fit, Session};
use crate::persistent::PersistentObjectInfo;
use crate::resolve::{self, Effective};

/// Scalar probe order for arguments typed as "any object"
const ANY_OBJECT_PROBES: [PrimitiveTag; 7] = [
    PrimitiveTag::String,
    PrimitiveTag::R8,
    PrimitiveTag::I4,
    PrimitiveTag::U4,
    PrimitiveTag::I8,
    PrimitiveTag::U8,
    PrimitiveTag::Boolean,
];

impl Session<'_> {
    // ========================================================================
    // Native → script
    // ========================================================================

    /// Convert a managed reference to a script value, guided by the declared
    /// `target` type.
    pub fn to_script(&self, target: &TypeDescriptor, obj: Option<ObjectRef>) -> BridgeResult<ScriptValue> {
        if target.is_void() {
            return Ok(self.env.create_undefined());
        }
        let Some(obj) = obj else {
            return Ok(self.env.create_null());
        };
        let target = resolve::boxed_target(target, self.bridge.config().options.max_type_redirects)?;

        let runtime_ty = self.rt.type_of(obj);
        let primitive_ty = if target.is_any_object() {
            runtime_ty.as_ref()
        } else {
            target
        };
        if let Some(val) = self.translate_primitive(primitive_ty, obj) {
            return Ok(val);
        }
        if let Some(val) = self.translate_builtin(&runtime_ty, obj) {
            return Ok(val);
        }
        if runtime_ty.is_value_type() {
            let payload = fit(self.rt.unbox(obj), runtime_ty.size);
            return Ok(self
                .env
                .create_native_object(runtime_ty.class, NativeStorage::Boxed(ValueBox::new(payload))));
        }
        Ok(self
            .env
            .create_native_object(runtime_ty.class, NativeStorage::Object(obj)))
    }

    fn translate_primitive(&self, ty: &TypeDescriptor, obj: ObjectRef) -> Option<ScriptValue> {
        match ty.primitive_tag()? {
            PrimitiveTag::String => {
                let units = self.rt.string_chars(obj)?;
                Some(self.env.create_string(&String::from_utf16_lossy(&units)))
            }
            tag => self.codec().encode_bytes(self.env, tag, &self.rt.unbox(obj)),
        }
    }

    fn translate_builtin(&self, runtime_ty: &TypeDescriptor, obj: ObjectRef) -> Option<ScriptValue> {
        let sentinels = self.sentinels();
        let class = Some(runtime_ty.class);
        if class == sentinels.persistent_object_opt() {
            let handle = self.bridge.persistent().handle_for(obj)?;
            return Some(self.env.resolve(handle));
        }
        if class == sentinels.binary_buffer_opt() {
            let region = self.rt.binary_buffer_region(obj)?;
            return Some(self.env.create_binary(region));
        }
        None
    }

    // ========================================================================
    // Script → native
    // ========================================================================

    /// Convert a script value to a managed reference of `target` type.
    ///
    /// `Ok(None)` is both "null" and "not convertible"; argument matching has
    /// already filtered the latter on checked paths.
    pub fn to_native(&self, target: &TypeDescriptor, val: ScriptValue) -> BridgeResult<Option<ObjectRef>> {
        if target.is_void() {
            return Ok(None);
        }
        match self.effective(target)? {
            Effective::Primitive(PrimitiveTag::String) => Ok(self
                .env
                .get_string(val)
                .map(|s| self.rt.new_string(&s.encode_utf16().collect::<Vec<_>>()))),
            Effective::Primitive(tag) => {
                let Some(scalar) = self.codec().decode_unchecked(self.env, tag, val) else {
                    return Ok(None);
                };
                Ok(Some(self.rt.box_value(target.class, &fit(scalar.to_bytes(), target.size))))
            }
            Effective::Value => {
                let Some(class) = self.env.native_object_class(val) else {
                    return Ok(None);
                };
                if !self.rt.is_assignable_from(target.class, class) {
                    return Ok(None);
                }
                let Some(storage) = self.env.native_object(val) else {
                    return Ok(None);
                };
                let payload = self.payload_of(&storage, target.size);
                Ok(Some(self.rt.box_value(target.class, &payload)))
            }
            Effective::Reference => self.reference_to_native(target, val),
        }
    }

    fn reference_to_native(&self, target: &TypeDescriptor, val: ScriptValue) -> BridgeResult<Option<ObjectRef>> {
        let env = self.env;
        let sentinels = self.sentinels();
        let any = target.is_any_object();

        if env.is_function(val) {
            if self.rt.is_delegate(target.class) {
                return self.delegate_from_function(val, target.class);
            }
            return Ok(None);
        }

        if let (Some(storage), Some(class)) = (env.native_object(val), env.native_object_class(val)) {
            if any {
                if let Some(typed) = sentinels.typed_value_opt() {
                    if self.rt.is_assignable_from(typed, class) {
                        if let Some(inner) = self.rt.typed_value_target(&storage) {
                            return Ok(inner);
                        }
                    }
                }
            }
            if !self.rt.is_assignable_from(target.class, class) {
                return Ok(None);
            }
            if self.rt.is_value_type(class) {
                let size = self.rt.describe_class(class).size;
                let payload = self.payload_of(&storage, size);
                return Ok(Some(self.rt.box_value(class, &payload)));
            }
            return Ok(storage.as_object());
        }

        if env.is_binary(val) && (any || Some(target.class) == sentinels.binary_buffer_opt()) {
            let class = sentinels.binary_buffer()?;
            let bytes = env.get_binary(val).unwrap_or_default();
            return Ok(Some(self.rt.new_binary_buffer(class, &bytes)));
        }

        if env.is_object(val) && (any || Some(target.class) == sentinels.persistent_object_opt()) {
            return self.persistent_for(val);
        }

        if any {
            for tag in ANY_OBJECT_PROBES {
                if self.codec().accepts(env, tag, val) {
                    let ty = self.rt.primitive_type(tag);
                    return self.to_native(&ty, val);
                }
            }
        }
        Ok(None)
    }

    /// Native wrapper paired with a plain script object, created on first use
    pub fn persistent_for(&self, val: ScriptValue) -> BridgeResult<Option<ObjectRef>> {
        let class = self.sentinels().persistent_object()?;
        let Some(id) = self.env.object_identity(val) else {
            return Ok(None);
        };
        let table = self.bridge.persistent();
        if let Some(native) = table.native_for(id) {
            return Ok(Some(native));
        }
        let native = self.rt.new_persistent_object(class);
        let handle = self.env.retain(val);
        let paired = table.pair(id, PersistentObjectInfo { native, handle });
        if paired.native != native {
            self.env.release(handle);
        }
        tracing::trace!(?id, native = ?paired.native, "paired script object");
        Ok(Some(paired.native))
    }

    /// A native wrapper was finalized by the managed collector: forget its
    /// pairing and release the retained script object
    pub fn on_native_finalized(&self, obj: ObjectRef) {
        if let Some(info) = self.bridge.persistent().remove_native(obj) {
            tracing::trace!(native = ?obj, "released persistent script object");
            self.env.release(info.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::config::BridgeConfig;
    use std::sync::Arc;
    use tether_sdk::{BridgeError, ManagedRuntime, ScriptEnv};
    use tether_testkit::{FakeRuntime, FakeScript, JsValue};

    fn bridge(rt: &FakeRuntime) -> Bridge {
        let b = rt.builtins();
        let config = BridgeConfig::default()
            .with_sentinels(
                b.persistent_object.class,
                b.binary_buffer.class,
                Some(b.typed_value.class),
            )
            .unwrap();
        Bridge::new(Arc::new(config))
    }

    #[test]
    fn test_void_and_null() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let obj = rt.new_str("x");
        assert_eq!(env.value(s.to_script(&b.void, Some(obj)).unwrap()), JsValue::Undefined);
        assert_eq!(env.value(s.to_script(&b.string, None).unwrap()), JsValue::Null);
    }

    #[test]
    fn test_boxed_primitive_under_object_target() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let boxed = rt.box_value(b.i4.class, &42i32.to_le_bytes());
        assert_eq!(env.value(s.to_script(&b.object, Some(boxed)).unwrap()), JsValue::Int(42));
        let text = rt.new_str("hey");
        assert_eq!(
            env.value(s.to_script(&b.object, Some(text)).unwrap()),
            JsValue::Str("hey".into())
        );
    }

    #[test]
    fn test_enum_target_uses_underlying() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let color = rt.define_enum("Color", &rt.builtins().u1);
        let boxed = rt.box_value(color.class, &[3]);
        assert_eq!(env.value(s.to_script(&color, Some(boxed)).unwrap()), JsValue::Int(3));
    }

    #[test]
    fn test_wrapper_chain_is_bounded() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let inner = rt.define_enum("Inner", &rt.builtins().u1);
        let outer = rt.define_enum("Outer", &inner);
        let maybe = rt.define_nullable(&outer);
        let boxed = rt.box_value(inner.class, &[3]);

        let strict = Bridge::new(Arc::new(BridgeConfig::new(crate::config::BridgeOptions {
            max_type_redirects: 1,
            ..Default::default()
        })));
        let s = strict.session(&rt, &env);
        assert!(matches!(
            s.to_script(&maybe, Some(boxed)),
            Err(BridgeError::RedirectLimit { limit: 1, .. })
        ));

        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        assert_eq!(env.value(s.to_script(&maybe, Some(boxed)).unwrap()), JsValue::Int(3));
    }

    #[test]
    fn test_value_type_is_copied_into_owned_proxy() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let point = rt.define_struct("Point", 8);
        let boxed = rt.box_value(point.class, &[1, 0, 0, 0, 2, 0, 0, 0]);
        let val = s.to_script(&rt.builtins().object, Some(boxed)).unwrap();
        assert_eq!(env.native_object_class(val), Some(point.class));
        match env.native_object(val) {
            Some(NativeStorage::Boxed(payload)) => {
                assert_eq!(payload.snapshot(), vec![1, 0, 0, 0, 2, 0, 0, 0])
            }
            other => panic!("expected owned payload, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_proxy_roundtrip() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let animal = rt.define_class("Animal", None, 0);
        let dog = rt.define_class("Dog", Some(&animal), 0);
        let obj = rt.alloc_object(dog.class);

        let val = s.to_script(&animal, Some(obj)).unwrap();
        assert_eq!(env.native_object_class(val), Some(dog.class));
        assert_eq!(s.to_native(&animal, val).unwrap(), Some(obj));
        assert_eq!(s.to_native(&dog, val).unwrap(), Some(obj));

        let cat = rt.define_class("Cat", Some(&animal), 0);
        assert_eq!(s.to_native(&cat, val).unwrap(), None);
    }

    #[test]
    fn test_any_object_probe_order() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();

        let obj = s.to_native(&b.object, env.create_string("hi")).unwrap().unwrap();
        assert_eq!(rt.string(obj).as_deref(), Some("hi"));

        let obj = s.to_native(&b.object, env.create_int32(3)).unwrap().unwrap();
        assert_eq!(rt.object(obj).unwrap().class, b.r8.class);
        assert_eq!(rt.boxed(obj), Some(3.0f64.to_le_bytes().to_vec()));

        let obj = s.to_native(&b.object, env.create_boolean(true)).unwrap().unwrap();
        assert_eq!(rt.object(obj).unwrap().class, b.boolean.class);

        assert_eq!(s.to_native(&b.object, env.create_undefined()).unwrap(), None);
    }

    #[test]
    fn test_plain_object_is_paired_once() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();

        let js = env.new_object();
        let first = s.to_native(&b.object, js).unwrap().unwrap();
        let second = s.to_native(&b.persistent_object, js).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(env.live_handles(), 1);

        let back = s.to_script(&b.object, Some(first)).unwrap();
        assert!(env.same_object(back, js));

        s.on_native_finalized(first);
        assert_eq!(env.live_handles(), 0);
        assert!(bridge.persistent().is_empty());
    }

    #[test]
    fn test_binary_buffers() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();

        let js = env.new_binary(&[1, 2, 3]);
        let obj = s.to_native(&b.object, js).unwrap().unwrap();
        let back = s.to_script(&b.binary_buffer, Some(obj)).unwrap();
        assert_eq!(
            env.value(back),
            JsValue::BinaryView(rt.binary_buffer_region(obj).unwrap())
        );
    }

    #[test]
    fn test_binary_without_sentinel_is_misconfiguration() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = Bridge::new(Arc::new(BridgeConfig::default()));
        let s = bridge.session(&rt, &env);
        let js = env.new_binary(&[1]);
        assert!(matches!(
            s.to_native(&rt.builtins().object, js),
            Err(BridgeError::Misconfiguration(_))
        ));
    }

    #[test]
    fn test_typed_value_unwraps_for_object_targets() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();

        let inner = rt.new_str("wrapped");
        let wrapper = rt.new_typed_value(Some(inner));
        let val = env.create_native_object(b.typed_value.class, NativeStorage::Object(wrapper));
        assert_eq!(s.to_native(&b.object, val).unwrap(), Some(inner));
        assert_eq!(s.to_native(&b.typed_value, val).unwrap(), Some(wrapper));
    }

    #[test]
    fn test_primitive_targets_box() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge(&rt);
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();

        let obj = s.to_native(&b.i2, env.create_int32(70_000)).unwrap().unwrap();
        assert_eq!(rt.boxed(obj), Some(4464i16.to_le_bytes().to_vec()));
        let obj = s.to_native(&b.string, env.create_string("s")).unwrap().unwrap();
        assert_eq!(rt.string(obj).as_deref(), Some("s"));
        assert_eq!(s.to_native(&b.string, env.create_int32(1)).unwrap(), None);
    }
}
