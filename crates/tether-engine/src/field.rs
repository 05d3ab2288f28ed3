//! Field accessors

use tether_sdk::{
    BridgeError, BridgeResult, FieldAddress, FieldBase, FieldDescriptor, NativeStorage,
    ScriptValue, TypeKind, ValueBox,
};

use crate::bridge::Session;

impl Session<'_> {
    fn field_address(&self, field: &FieldDescriptor, holder: ScriptValue) -> BridgeResult<FieldAddress> {
        if field.is_static {
            return Ok(FieldAddress {
                base: FieldBase::Static(field.owner),
                offset: field.offset,
            });
        }
        let layout = self.rt.layout();
        match self.env.native_object(holder) {
            Some(NativeStorage::Object(obj)) => Ok(FieldAddress {
                base: FieldBase::Object(obj),
                offset: field.offset,
            }),
            Some(NativeStorage::Boxed(payload)) => Ok(FieldAddress {
                base: FieldBase::Boxed(payload),
                offset: layout.payload_offset(field.offset),
            }),
            Some(NativeStorage::Field(outer)) => Ok(FieldAddress {
                base: outer.base,
                offset: outer.offset + layout.payload_offset(field.offset),
            }),
            None => Err(BridgeError::InvalidOperation(format!(
                "field {} accessed on a non-native receiver",
                field.name
            ))),
        }
    }

    /// Read `field` of `holder` (ignored for static fields).
    ///
    /// Value-type fields that are not primitives come back as a proxy
    /// aliasing the live field, so mutations through it reach the owner.
    /// Static primitive-like fields and non-addressable statics are copied.
    pub fn get_field(&self, field: &FieldDescriptor, holder: ScriptValue) -> BridgeResult<ScriptValue> {
        let at = self.field_address(field, holder)?;
        let ty = field.ty.as_ref();
        if !ty.is_value_type() {
            let obj = self.load_ref(&at);
            return self.to_script(ty, obj);
        }

        if ty.kind == TypeKind::Nullable || self.primitive_tag(ty)?.is_some() {
            let bytes = self.load(&at, ty.size);
            return self.write_value_type(&bytes, ty);
        }

        let materialize = field.is_static && !self.rt.is_addressable(&at);
        let storage = if materialize {
            NativeStorage::Boxed(ValueBox::new(self.load(&at, ty.size)))
        } else {
            NativeStorage::Field(at)
        };
        Ok(self.env.create_native_object(ty.class, storage))
    }

    /// Write `val` into `field` of `holder` (ignored for static fields)
    pub fn set_field(&self, field: &FieldDescriptor, holder: ScriptValue, val: ScriptValue) -> BridgeResult<()> {
        let at = self.field_address(field, holder)?;
        let ty = field.ty.as_ref();
        if ty.is_value_type() {
            let bytes = match self.read_value_type(Some(val), ty)? {
                Some(bytes) => bytes,
                None => vec![0; ty.size],
            };
            self.store(&at, &bytes);
        } else {
            let obj = self.to_native(ty, val)?;
            self.store_ref(&at, obj);
        }
        Ok(())
    }
}
