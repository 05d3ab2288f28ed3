//! In-memory script engine

use std::cell::RefCell;
use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tether_sdk::{
    BufferRegion, ClassRef, FunctionPtr, NativeStorage, PersistentRef, ScriptEnv,
    ScriptObjectId, ScriptValue,
};

/// Observable shape of a script value.
///
/// All integer constructors produce `Int`, so `create_int32(5)` and
/// `create_int64(5)` compare equal, like numbers do in script.
#[derive(Debug, Clone, PartialEq)]
pub enum JsValue {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Integer number
    Int(i128),
    /// Floating-point number
    Double(f64),
    /// String
    Str(String),
    /// Script-owned binary buffer
    Binary(Vec<u8>),
    /// Binary view over native memory
    BinaryView(BufferRegion),
    /// Plain object or native proxy, by object id
    Object(u64),
    /// Function, by object id
    Function(u64),
}

#[derive(Default)]
struct ObjectSlot {
    props: BTreeMap<u32, ScriptValue>,
    native: Option<(ClassRef, NativeStorage)>,
}

#[derive(Default)]
struct ScriptHeap {
    values: Vec<JsValue>,
    objects: Vec<ObjectSlot>,
    handles: BTreeMap<u64, ScriptValue>,
    next_handle: u64,
    entries: FxHashMap<ClassRef, FunctionPtr>,
}

impl ScriptHeap {
    fn push(&mut self, value: JsValue) -> ScriptValue {
        self.values.push(value);
        ScriptValue::from_bits(self.values.len() as u64 - 1)
    }

    fn get(&self, val: ScriptValue) -> JsValue {
        self.values
            .get(val.to_bits() as usize)
            .cloned()
            .unwrap_or(JsValue::Undefined)
    }

    fn object_id(&self, val: ScriptValue) -> Option<u64> {
        match self.get(val) {
            JsValue::Object(id) | JsValue::Function(id) => Some(id),
            _ => None,
        }
    }

    fn new_object(&mut self, function: bool) -> ScriptValue {
        self.objects.push(ObjectSlot::default());
        let id = self.objects.len() as u64 - 1;
        if function {
            self.push(JsValue::Function(id))
        } else {
            self.push(JsValue::Object(id))
        }
    }

    fn slot(&self, val: ScriptValue) -> Option<&ObjectSlot> {
        let id = self.object_id(val)?;
        self.objects.get(id as usize)
    }

    fn slot_mut(&mut self, val: ScriptValue) -> Option<&mut ObjectSlot> {
        let id = self.object_id(val)?;
        self.objects.get_mut(id as usize)
    }
}

/// In-memory [`ScriptEnv`]. Every constructor call yields a fresh handle.
#[derive(Default)]
pub struct FakeScript {
    heap: RefCell<ScriptHeap>,
}

impl FakeScript {
    /// Empty heap
    pub fn new() -> Self {
        Self::default()
    }

    /// Observable shape of `val`
    pub fn value(&self, val: ScriptValue) -> JsValue {
        self.heap.borrow().get(val)
    }

    /// New plain object
    pub fn new_object(&self) -> ScriptValue {
        self.heap.borrow_mut().new_object(false)
    }

    /// New array-like object holding `items` at indices `0..`
    pub fn new_array(&self, items: &[ScriptValue]) -> ScriptValue {
        let obj = self.new_object();
        for (i, item) in items.iter().enumerate() {
            self.set_property(obj, i as u32, *item);
        }
        obj
    }

    /// New function object
    pub fn new_function(&self) -> ScriptValue {
        self.heap.borrow_mut().new_object(true)
    }

    /// New script-owned binary buffer
    pub fn new_binary(&self, bytes: &[u8]) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Binary(bytes.to_vec()))
    }

    /// Install the trampoline handed out for functions bridged to `delegate`
    pub fn set_function_entry(&self, delegate: ClassRef, entry: FunctionPtr) {
        self.heap.borrow_mut().entries.insert(delegate, entry);
    }

    /// Number of retained handles not yet released
    pub fn live_handles(&self) -> usize {
        self.heap.borrow().handles.len()
    }

    /// Same script object (not merely the same handle)
    pub fn same_object(&self, a: ScriptValue, b: ScriptValue) -> bool {
        let heap = self.heap.borrow();
        match (heap.object_id(a), heap.object_id(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn int(&self, val: ScriptValue) -> Option<i128> {
        match self.value(val) {
            JsValue::Int(i) => Some(i),
            JsValue::Double(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i128),
            _ => None,
        }
    }

    fn number(&self, val: ScriptValue) -> f64 {
        match self.value(val) {
            JsValue::Int(i) => i as f64,
            JsValue::Double(f) => f,
            JsValue::Bool(b) => f64::from(u8::from(b)),
            JsValue::Null => 0.0,
            _ => f64::NAN,
        }
    }

    fn integer(&self, val: ScriptValue) -> i128 {
        match self.value(val) {
            JsValue::Int(i) => i,
            _ => {
                let f = self.number(val);
                if f.is_finite() {
                    f as i128
                } else {
                    0
                }
            }
        }
    }
}

impl ScriptEnv for FakeScript {
    fn is_undefined(&self, val: ScriptValue) -> bool {
        self.value(val) == JsValue::Undefined
    }

    fn is_null(&self, val: ScriptValue) -> bool {
        self.value(val) == JsValue::Null
    }

    fn is_boolean(&self, val: ScriptValue) -> bool {
        matches!(self.value(val), JsValue::Bool(_))
    }

    fn is_int32(&self, val: ScriptValue) -> bool {
        self.int(val)
            .map(|i| i32::try_from(i).is_ok())
            .unwrap_or(false)
    }

    fn is_uint32(&self, val: ScriptValue) -> bool {
        self.int(val)
            .map(|i| u32::try_from(i).is_ok())
            .unwrap_or(false)
    }

    fn is_int64(&self, val: ScriptValue) -> bool {
        match self.value(val) {
            JsValue::Int(i) => i64::try_from(i).is_ok(),
            _ => false,
        }
    }

    fn is_uint64(&self, val: ScriptValue) -> bool {
        match self.value(val) {
            JsValue::Int(i) => u64::try_from(i).is_ok(),
            _ => false,
        }
    }

    fn is_double(&self, val: ScriptValue) -> bool {
        matches!(self.value(val), JsValue::Int(_) | JsValue::Double(_))
    }

    fn is_string(&self, val: ScriptValue) -> bool {
        matches!(self.value(val), JsValue::Str(_))
    }

    fn is_object(&self, val: ScriptValue) -> bool {
        matches!(
            self.value(val),
            JsValue::Object(_) | JsValue::Function(_) | JsValue::Binary(_) | JsValue::BinaryView(_)
        )
    }

    fn is_function(&self, val: ScriptValue) -> bool {
        matches!(self.value(val), JsValue::Function(_))
    }

    fn is_binary(&self, val: ScriptValue) -> bool {
        matches!(self.value(val), JsValue::Binary(_) | JsValue::BinaryView(_))
    }

    fn get_bool(&self, val: ScriptValue) -> bool {
        match self.value(val) {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Bool(b) => b,
            JsValue::Int(i) => i != 0,
            JsValue::Double(f) => f != 0.0 && !f.is_nan(),
            JsValue::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    fn get_int32(&self, val: ScriptValue) -> i32 {
        self.integer(val) as i32
    }

    fn get_uint32(&self, val: ScriptValue) -> u32 {
        self.integer(val) as u32
    }

    fn get_int64(&self, val: ScriptValue) -> i64 {
        self.integer(val) as i64
    }

    fn get_uint64(&self, val: ScriptValue) -> u64 {
        self.integer(val) as u64
    }

    fn get_double(&self, val: ScriptValue) -> f64 {
        self.number(val)
    }

    fn get_string(&self, val: ScriptValue) -> Option<String> {
        match self.value(val) {
            JsValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn get_binary(&self, val: ScriptValue) -> Option<Vec<u8>> {
        match self.value(val) {
            JsValue::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    fn create_undefined(&self) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Undefined)
    }

    fn create_null(&self) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Null)
    }

    fn create_boolean(&self, b: bool) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Bool(b))
    }

    fn create_int32(&self, i: i32) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Int(i128::from(i)))
    }

    fn create_uint32(&self, u: u32) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Int(i128::from(u)))
    }

    fn create_int64(&self, i: i64) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Int(i128::from(i)))
    }

    fn create_uint64(&self, u: u64) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Int(i128::from(u)))
    }

    fn create_double(&self, f: f64) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Double(f))
    }

    fn create_string(&self, s: &str) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::Str(s.to_owned()))
    }

    fn create_binary(&self, region: BufferRegion) -> ScriptValue {
        self.heap.borrow_mut().push(JsValue::BinaryView(region))
    }

    fn create_native_object(&self, class: ClassRef, storage: NativeStorage) -> ScriptValue {
        let mut heap = self.heap.borrow_mut();
        let obj = heap.new_object(false);
        if let Some(slot) = heap.slot_mut(obj) {
            slot.native = Some((class, storage));
        }
        obj
    }

    fn native_object(&self, val: ScriptValue) -> Option<NativeStorage> {
        let heap = self.heap.borrow();
        heap.slot(val)?.native.as_ref().map(|(_, s)| s.clone())
    }

    fn native_object_class(&self, val: ScriptValue) -> Option<ClassRef> {
        let heap = self.heap.borrow();
        heap.slot(val)?.native.as_ref().map(|(c, _)| *c)
    }

    fn bind_native(&self, this: ScriptValue, class: ClassRef, storage: NativeStorage) {
        if let Some(slot) = self.heap.borrow_mut().slot_mut(this) {
            slot.native = Some((class, storage));
        }
    }

    fn get_property(&self, val: ScriptValue, index: u32) -> ScriptValue {
        let found = {
            let heap = self.heap.borrow();
            heap.slot(val).and_then(|s| s.props.get(&index).copied())
        };
        found.unwrap_or_else(|| self.create_undefined())
    }

    fn set_property(&self, val: ScriptValue, index: u32, item: ScriptValue) {
        if let Some(slot) = self.heap.borrow_mut().slot_mut(val) {
            slot.props.insert(index, item);
        }
    }

    fn object_identity(&self, val: ScriptValue) -> Option<ScriptObjectId> {
        self.heap.borrow().object_id(val).map(ScriptObjectId)
    }

    fn retain(&self, val: ScriptValue) -> PersistentRef {
        let mut heap = self.heap.borrow_mut();
        heap.next_handle += 1;
        let id = heap.next_handle;
        heap.handles.insert(id, val);
        PersistentRef(id)
    }

    fn resolve(&self, handle: PersistentRef) -> ScriptValue {
        let found = self.heap.borrow().handles.get(&handle.0).copied();
        found.unwrap_or_else(|| self.create_undefined())
    }

    fn release(&self, handle: PersistentRef) {
        self.heap.borrow_mut().handles.remove(&handle.0);
    }

    fn function_entry(&self, func: ScriptValue, delegate: ClassRef) -> Option<FunctionPtr> {
        if !self.is_function(func) {
            return None;
        }
        self.heap.borrow().entries.get(&delegate).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_predicates() {
        let env = FakeScript::new();
        let neg = env.create_int32(-1);
        assert!(env.is_int32(neg));
        assert!(!env.is_uint32(neg));
        assert_eq!(env.get_uint32(neg), u32::MAX);

        let big = env.create_uint64(u64::MAX);
        assert!(env.is_uint64(big));
        assert!(!env.is_int64(big));
        assert!(env.is_double(big));
    }

    #[test]
    fn test_properties_and_identity() {
        let env = FakeScript::new();
        let one = env.create_int32(1);
        let arr = env.new_array(&[one]);
        assert_eq!(env.value(env.get_property(arr, 0)), JsValue::Int(1));
        assert!(env.is_undefined(env.get_property(arr, 1)));
        assert!(env.object_identity(arr).is_some());
        assert!(env.object_identity(one).is_none());
    }

    #[test]
    fn test_retain_release() {
        let env = FakeScript::new();
        let obj = env.new_object();
        let handle = env.retain(obj);
        assert_eq!(env.live_handles(), 1);
        assert!(env.same_object(env.resolve(handle), obj));
        env.release(handle);
        assert_eq!(env.live_handles(), 0);
    }
}
