//! Value-type transcoder
//!
//! Reads script values into raw value-type payloads and writes payloads back
//! out. Nullable types carry one validity byte after the wrapped payload.

use tether_sdk::{
    BridgeError, BridgeResult, NativeStorage, ScriptValue, TypeDescriptor, TypeKind, ValueBox,
};

use crate::bridge::{fit, Session};

impl Session<'_> {
    /// Payload of `ty` read from `val`.
    ///
    /// A native proxy of an assignable class contributes its payload; anything
    /// else must decode through `ty`'s primitive tag. `None` when neither
    /// applies (including a missing `val`).
    pub fn read_value_type(
        &self,
        val: Option<ScriptValue>,
        ty: &TypeDescriptor,
    ) -> BridgeResult<Option<Vec<u8>>> {
        let Some(val) = val else {
            return Ok(None);
        };
        if ty.kind == TypeKind::Nullable {
            return self.read_nullable(Some(val), ty).map(Some);
        }
        if self.env.is_object(val) {
            if let (Some(storage), Some(class)) =
                (self.env.native_object(val), self.env.native_object_class(val))
            {
                if !self.rt.is_assignable_from(ty.class, class) {
                    return Ok(None);
                }
                return Ok(Some(self.payload_of(&storage, ty.size)));
            }
        }
        let Some(tag) = self.primitive_tag(ty)? else {
            return Ok(None);
        };
        Ok(self
            .codec()
            .decode(self.env, tag, val)
            .map(|scalar| fit(scalar.to_bytes(), ty.size)))
    }

    /// Nullable block (`wrapped` payload + validity byte) read from `val`.
    ///
    /// A value that does not convert yields validity 0 and a zeroed payload.
    pub fn read_nullable(
        &self,
        val: Option<ScriptValue>,
        ty: &TypeDescriptor,
    ) -> BridgeResult<Vec<u8>> {
        let wrapped = nullable_inner(ty)?;
        let mut block = vec![0; wrapped.size + 1];
        if let Some(payload) = self.read_value_type(val, wrapped)? {
            block[..wrapped.size].copy_from_slice(&payload);
            block[wrapped.size] = 1;
        }
        Ok(block)
    }

    /// Script value for a payload of `ty`.
    ///
    /// Primitive payloads (after enum/generic redirection) become script
    /// scalars; a nullable with validity 0 becomes `null`; anything else
    /// becomes a proxy owning a copy of the payload.
    pub fn write_value_type(&self, bytes: &[u8], ty: &TypeDescriptor) -> BridgeResult<ScriptValue> {
        if ty.kind == TypeKind::Nullable {
            let wrapped = nullable_inner(ty)?;
            return match bytes.get(wrapped.size) {
                Some(&valid) if valid != 0 => self.write_value_type(&bytes[..wrapped.size], wrapped),
                _ => Ok(self.env.create_null()),
            };
        }
        if let Some(tag) = self.primitive_tag(ty)? {
            if let Some(val) = self.codec().encode_bytes(self.env, tag, bytes) {
                return Ok(val);
            }
        }
        let payload = fit(bytes.to_vec(), ty.size);
        Ok(self
            .env
            .create_native_object(ty.class, NativeStorage::Boxed(ValueBox::new(payload))))
    }
}

fn nullable_inner(ty: &TypeDescriptor) -> BridgeResult<&TypeDescriptor> {
    ty.element().map(|w| w.as_ref()).ok_or_else(|| {
        BridgeError::InvalidOperation(format!("{} has no wrapped type", ty.name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::Bridge;
    use crate::config::BridgeConfig;
    use std::sync::Arc;
    use tether_sdk::{ManagedRuntime, ScriptEnv};
    use tether_testkit::{FakeRuntime, FakeScript, JsValue};

    fn bridge() -> Bridge {
        Bridge::new(Arc::new(BridgeConfig::default()))
    }

    #[test]
    fn test_primitive_payload() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let bytes = s.read_value_type(Some(env.create_int32(-2)), &b.i4).unwrap();
        assert_eq!(bytes, Some((-2i32).to_le_bytes().to_vec()));
        assert_eq!(s.read_value_type(Some(env.create_string("x")), &b.i4).unwrap(), None);
        assert_eq!(s.read_value_type(None, &b.i4).unwrap(), None);
    }

    #[test]
    fn test_enum_and_generic_redirect() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let color = rt.define_enum("Color", &b.u2);
        let bytes = s.read_value_type(Some(env.create_uint32(9)), &color).unwrap();
        assert_eq!(bytes, Some(vec![9, 0]));

        let wrapped = rt.define_generic("Id<int>", &b.i4);
        let bytes = s.read_value_type(Some(env.create_int32(5)), &wrapped).unwrap();
        assert_eq!(bytes, Some(vec![5, 0, 0, 0]));
    }

    #[test]
    fn test_struct_from_proxy() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let point = rt.define_struct("Point", 4);
        let size = rt.define_struct("Size", 4);
        let val = env.create_native_object(point.class, NativeStorage::Boxed(ValueBox::new(vec![1, 2, 3, 4])));
        assert_eq!(s.read_value_type(Some(val), &point).unwrap(), Some(vec![1, 2, 3, 4]));
        assert_eq!(s.read_value_type(Some(val), &size).unwrap(), None);
        assert_eq!(s.read_value_type(Some(env.new_object()), &point).unwrap(), None);
    }

    #[test]
    fn test_nullable_roundtrip() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let b = rt.builtins();
        let maybe = rt.define_nullable(&b.i4);

        let block = s.read_nullable(Some(env.create_int32(7)), &maybe).unwrap();
        assert_eq!(block, vec![7, 0, 0, 0, 1]);
        assert_eq!(env.value(s.write_value_type(&block, &maybe).unwrap()), JsValue::Int(7));

        let block = s.read_nullable(Some(env.create_undefined()), &maybe).unwrap();
        assert_eq!(block, vec![0, 0, 0, 0, 0]);
        assert_eq!(env.value(s.write_value_type(&block, &maybe).unwrap()), JsValue::Null);
    }

    #[test]
    fn test_struct_written_as_owned_copy() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let point = rt.define_struct("Point", 4);
        let val = s.write_value_type(&[4, 3, 2, 1], &point).unwrap();
        assert_eq!(env.native_object_class(val), Some(point.class));
        let storage = env.native_object(val).unwrap();
        assert!(storage.owns_payload());
        assert_eq!(s.payload_of(&storage, 4), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_struct_from_boxed_object_proxy() {
        let rt = FakeRuntime::new();
        let env = FakeScript::new();
        let bridge = bridge();
        let s = bridge.session(&rt, &env);
        let point = rt.define_struct("Point", 2);
        let boxed = rt.box_value(point.class, &[8, 9]);
        let val = env.create_native_object(point.class, NativeStorage::Object(boxed));
        assert_eq!(s.read_value_type(Some(val), &point).unwrap(), Some(vec![8, 9]));
    }
}
