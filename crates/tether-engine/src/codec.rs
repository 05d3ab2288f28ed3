//! Primitive codec
//!
//! Converts between script scalars and fixed-layout native primitive storage,
//! keyed by [`PrimitiveTag`]. Narrowing truncates like a native cast; there is
//! no range check.

use tether_sdk::{PointerWidth, PrimitiveTag, ScriptEnv, ScriptValue};

/// A decoded native primitive
#[derive(Debug, Clone, PartialEq)]
pub enum NativeScalar {
    /// `bool`
    Boolean(bool),
    /// UTF-16 code unit
    Char(u16),
    /// `i8`
    I1(i8),
    /// `u8`
    U1(u8),
    /// `i16`
    I2(i16),
    /// `u16`
    U2(u16),
    /// `i32`
    I4(i32),
    /// `u32`
    U4(u32),
    /// `i64`
    I8(i64),
    /// `u64`
    U8(u64),
    /// `f32`
    R4(f32),
    /// `f64`
    R8(f64),
    /// Managed string contents in UTF-16
    String(Vec<u16>),
}

impl NativeScalar {
    /// Native little-endian payload. Strings have no inline payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            NativeScalar::Boolean(b) => vec![u8::from(*b)],
            NativeScalar::Char(c) => c.to_le_bytes().to_vec(),
            NativeScalar::I1(v) => v.to_le_bytes().to_vec(),
            NativeScalar::U1(v) => vec![*v],
            NativeScalar::I2(v) => v.to_le_bytes().to_vec(),
            NativeScalar::U2(v) => v.to_le_bytes().to_vec(),
            NativeScalar::I4(v) => v.to_le_bytes().to_vec(),
            NativeScalar::U4(v) => v.to_le_bytes().to_vec(),
            NativeScalar::I8(v) => v.to_le_bytes().to_vec(),
            NativeScalar::U8(v) => v.to_le_bytes().to_vec(),
            NativeScalar::R4(v) => v.to_le_bytes().to_vec(),
            NativeScalar::R8(v) => v.to_le_bytes().to_vec(),
            NativeScalar::String(_) => Vec::new(),
        }
    }

    /// Read a payload back. `None` for `String` or a short payload.
    pub fn from_bytes(tag: PrimitiveTag, width: PointerWidth, bytes: &[u8]) -> Option<Self> {
        fn arr<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
            bytes.get(..N)?.try_into().ok()
        }
        Some(match tag.normalize(width) {
            PrimitiveTag::Boolean => NativeScalar::Boolean(*bytes.first()? != 0),
            PrimitiveTag::Char => NativeScalar::Char(u16::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::I1 => NativeScalar::I1(i8::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::U1 => NativeScalar::U1(*bytes.first()?),
            PrimitiveTag::I2 => NativeScalar::I2(i16::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::U2 => NativeScalar::U2(u16::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::I4 => NativeScalar::I4(i32::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::U4 => NativeScalar::U4(u32::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::I8 => NativeScalar::I8(i64::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::U8 => NativeScalar::U8(u64::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::R4 => NativeScalar::R4(f32::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::R8 => NativeScalar::R8(f64::from_le_bytes(arr(bytes)?)),
            PrimitiveTag::String | PrimitiveTag::IntPtr | PrimitiveTag::UIntPtr => return None,
        })
    }
}

/// Script predicate a tag requires
fn accepts(env: &dyn ScriptEnv, tag: PrimitiveTag, val: ScriptValue) -> bool {
    match tag {
        PrimitiveTag::I1 | PrimitiveTag::I2 | PrimitiveTag::I4 => env.is_int32(val),
        PrimitiveTag::Boolean => env.is_boolean(val),
        PrimitiveTag::U1 | PrimitiveTag::U2 | PrimitiveTag::Char | PrimitiveTag::U4 => {
            env.is_uint32(val)
        }
        PrimitiveTag::I8 => env.is_int64(val),
        PrimitiveTag::U8 => env.is_uint64(val),
        PrimitiveTag::R4 | PrimitiveTag::R8 => env.is_double(val),
        PrimitiveTag::String => env.is_string(val),
        PrimitiveTag::IntPtr | PrimitiveTag::UIntPtr => false,
    }
}

/// Tag-driven scalar conversion
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveCodec {
    width: PointerWidth,
}

impl PrimitiveCodec {
    /// Codec for the given pointer width
    pub fn new(width: PointerWidth) -> Self {
        Self { width }
    }

    /// Pointer width in effect
    pub fn width(&self) -> PointerWidth {
        self.width
    }

    /// Whether `val` satisfies the script predicate `tag` requires
    pub fn accepts(&self, env: &dyn ScriptEnv, tag: PrimitiveTag, val: ScriptValue) -> bool {
        accepts(env, tag.normalize(self.width), val)
    }

    /// Checked decode: `None` when the script value does not satisfy the
    /// tag's predicate.
    pub fn decode(
        &self,
        env: &dyn ScriptEnv,
        tag: PrimitiveTag,
        val: ScriptValue,
    ) -> Option<NativeScalar> {
        let tag = tag.normalize(self.width);
        if !accepts(env, tag, val) {
            return None;
        }
        self.decode_unchecked(env, tag, val)
    }

    /// Coercing decode for paths where compatibility was already established.
    ///
    /// Only `String` can fail, when the engine cannot produce string contents.
    pub fn decode_unchecked(
        &self,
        env: &dyn ScriptEnv,
        tag: PrimitiveTag,
        val: ScriptValue,
    ) -> Option<NativeScalar> {
        Some(match tag.normalize(self.width) {
            PrimitiveTag::Boolean => NativeScalar::Boolean(env.get_bool(val)),
            PrimitiveTag::Char => NativeScalar::Char(env.get_uint32(val) as u16),
            PrimitiveTag::I1 => NativeScalar::I1(env.get_int32(val) as i8),
            PrimitiveTag::U1 => NativeScalar::U1(env.get_uint32(val) as u8),
            PrimitiveTag::I2 => NativeScalar::I2(env.get_int32(val) as i16),
            PrimitiveTag::U2 => NativeScalar::U2(env.get_uint32(val) as u16),
            PrimitiveTag::I4 => NativeScalar::I4(env.get_int32(val)),
            PrimitiveTag::U4 => NativeScalar::U4(env.get_uint32(val)),
            PrimitiveTag::I8 => NativeScalar::I8(env.get_int64(val)),
            PrimitiveTag::U8 => NativeScalar::U8(env.get_uint64(val)),
            PrimitiveTag::R4 => NativeScalar::R4(env.get_double(val) as f32),
            PrimitiveTag::R8 => NativeScalar::R8(env.get_double(val)),
            PrimitiveTag::String => {
                NativeScalar::String(env.get_string(val)?.encode_utf16().collect())
            }
            PrimitiveTag::IntPtr | PrimitiveTag::UIntPtr => unreachable!("normalized above"),
        })
    }

    /// Native scalar → script value
    pub fn encode(&self, env: &dyn ScriptEnv, scalar: &NativeScalar) -> ScriptValue {
        match scalar {
            NativeScalar::Boolean(b) => env.create_boolean(*b),
            NativeScalar::Char(c) => env.create_uint32(u32::from(*c)),
            NativeScalar::I1(v) => env.create_int32(i32::from(*v)),
            NativeScalar::U1(v) => env.create_uint32(u32::from(*v)),
            NativeScalar::I2(v) => env.create_int32(i32::from(*v)),
            NativeScalar::U2(v) => env.create_uint32(u32::from(*v)),
            NativeScalar::I4(v) => env.create_int32(*v),
            NativeScalar::U4(v) => env.create_uint32(*v),
            NativeScalar::I8(v) => env.create_int64(*v),
            NativeScalar::U8(v) => env.create_uint64(*v),
            NativeScalar::R4(v) => env.create_double(f64::from(*v)),
            NativeScalar::R8(v) => env.create_double(*v),
            NativeScalar::String(units) => env.create_string(&String::from_utf16_lossy(units)),
        }
    }

    /// Decode a native payload of `tag` and encode it for script
    pub fn encode_bytes(
        &self,
        env: &dyn ScriptEnv,
        tag: PrimitiveTag,
        bytes: &[u8],
    ) -> Option<ScriptValue> {
        NativeScalar::from_bytes(tag, self.width, bytes).map(|s| self.encode(env, &s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_testkit::{FakeScript, JsValue};

    #[test]
    fn test_narrowing_truncates() {
        let env = FakeScript::new();
        let codec = PrimitiveCodec::default();
        let v = env.create_uint32(300);
        assert_eq!(codec.decode(&env, PrimitiveTag::U1, v), Some(NativeScalar::U1(44)));

        let v = env.create_int32(-129);
        assert_eq!(codec.decode(&env, PrimitiveTag::I1, v), Some(NativeScalar::I1(127)));

        let v = env.create_uint32(70_000);
        assert_eq!(codec.decode(&env, PrimitiveTag::U2, v), Some(NativeScalar::U2(4464)));
    }

    #[test]
    fn test_roundtrip_in_range() {
        let env = FakeScript::new();
        let codec = PrimitiveCodec::default();
        let cases = [
            (PrimitiveTag::I1, env.create_int32(-5)),
            (PrimitiveTag::U2, env.create_uint32(65_535)),
            (PrimitiveTag::I4, env.create_int32(i32::MIN)),
            (PrimitiveTag::U4, env.create_uint32(u32::MAX)),
            (PrimitiveTag::I8, env.create_int64(-(1 << 40))),
            (PrimitiveTag::U8, env.create_uint64(1 << 50)),
            (PrimitiveTag::R8, env.create_double(2.5)),
            (PrimitiveTag::Boolean, env.create_boolean(true)),
            (PrimitiveTag::Char, env.create_uint32(0x263a)),
        ];
        for (tag, input) in cases {
            let scalar = codec.decode(&env, tag, input).unwrap();
            let bytes = scalar.to_bytes();
            let back = codec.encode_bytes(&env, tag, &bytes).unwrap();
            assert_eq!(env.value(back), env.value(input), "tag {:?}", tag);
        }
    }

    #[test]
    fn test_float_narrowing() {
        let env = FakeScript::new();
        let codec = PrimitiveCodec::default();
        let v = env.create_double(0.1);
        let scalar = codec.decode(&env, PrimitiveTag::R4, v).unwrap();
        assert_eq!(scalar, NativeScalar::R4(0.1f32));
    }

    #[test]
    fn test_string_transcoding() {
        let env = FakeScript::new();
        let codec = PrimitiveCodec::default();
        let v = env.create_string("héllo ☃");
        let scalar = codec.decode(&env, PrimitiveTag::String, v).unwrap();
        assert_eq!(scalar, NativeScalar::String("héllo ☃".encode_utf16().collect()));
        let back = codec.encode(&env, &scalar);
        assert_eq!(env.value(back), JsValue::Str("héllo ☃".into()));
    }

    #[test]
    fn test_predicate_mismatch_is_no_match() {
        let env = FakeScript::new();
        let codec = PrimitiveCodec::default();
        let s = env.create_string("x");
        assert_eq!(codec.decode(&env, PrimitiveTag::R8, s), None);
        let b = env.create_boolean(true);
        assert_eq!(codec.decode(&env, PrimitiveTag::U1, b), None);
        let neg = env.create_int32(-1);
        assert_eq!(codec.decode(&env, PrimitiveTag::U4, neg), None);
    }

    #[test]
    fn test_pointer_width() {
        let env = FakeScript::new();
        let narrow = PrimitiveCodec::new(PointerWidth::Bits32);
        let wide = PrimitiveCodec::new(PointerWidth::Bits64);
        let v = env.create_int32(7);
        assert_eq!(narrow.decode(&env, PrimitiveTag::IntPtr, v), Some(NativeScalar::I4(7)));
        assert_eq!(wide.decode(&env, PrimitiveTag::IntPtr, v), Some(NativeScalar::I8(7)));
    }

    #[test]
    fn test_char_encodes_unsigned() {
        let env = FakeScript::new();
        let codec = PrimitiveCodec::default();
        let v = codec.encode(&env, &NativeScalar::Char(65));
        assert!(env.is_uint32(v));
        assert_eq!(env.get_uint32(v), 65);
    }
}
