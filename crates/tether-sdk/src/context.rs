//! Collaborator traits
//!
//! The engine talks to the script engine through [`ScriptEnv`] and to the
//! managed runtime through [`ManagedRuntime`]. Embeddings provide the concrete
//! implementations; the engine only sees `&dyn` trait objects.

use crate::storage::{ArgSlot, BufferRegion, FieldAddress, NativeStorage};
use crate::types::{MethodDescriptor, MethodShape, PrimitiveTag, SynthesizedMethod, TypeDescriptor};
use crate::value::{
    ClassRef, FunctionPtr, ObjectRef, PersistentRef, ScriptObjectId, ScriptValue,
};
use std::sync::Arc;

// ============================================================================
// Script side
// ============================================================================

/// Script-engine value API.
///
/// Accessors coerce: asking for an `i32` of a value that is not one returns
/// whatever the engine's coercion yields. Callers that need a strict answer
/// test the matching `is_*` predicate first.
pub trait ScriptEnv {
    // ========================================================================
    // Type predicates
    // ========================================================================

    /// `undefined` (also used for "argument not supplied")
    fn is_undefined(&self, val: ScriptValue) -> bool;
    /// `null`
    fn is_null(&self, val: ScriptValue) -> bool;
    /// Boolean
    fn is_boolean(&self, val: ScriptValue) -> bool;
    /// Integer representable as `i32`
    fn is_int32(&self, val: ScriptValue) -> bool;
    /// Integer representable as `u32`
    fn is_uint32(&self, val: ScriptValue) -> bool;
    /// Integer representable as `i64`
    fn is_int64(&self, val: ScriptValue) -> bool;
    /// Integer representable as `u64`
    fn is_uint64(&self, val: ScriptValue) -> bool;
    /// Number
    fn is_double(&self, val: ScriptValue) -> bool;
    /// String
    fn is_string(&self, val: ScriptValue) -> bool;
    /// Object (including functions, binaries and native proxies)
    fn is_object(&self, val: ScriptValue) -> bool;
    /// Callable
    fn is_function(&self, val: ScriptValue) -> bool;
    /// Binary buffer
    fn is_binary(&self, val: ScriptValue) -> bool;

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Read as boolean
    fn get_bool(&self, val: ScriptValue) -> bool;
    /// Read as `i32`
    fn get_int32(&self, val: ScriptValue) -> i32;
    /// Read as `u32`
    fn get_uint32(&self, val: ScriptValue) -> u32;
    /// Read as `i64`
    fn get_int64(&self, val: ScriptValue) -> i64;
    /// Read as `u64`
    fn get_uint64(&self, val: ScriptValue) -> u64;
    /// Read as `f64`
    fn get_double(&self, val: ScriptValue) -> f64;
    /// Read string contents as UTF-8
    fn get_string(&self, val: ScriptValue) -> Option<String>;
    /// Copy binary contents
    fn get_binary(&self, val: ScriptValue) -> Option<Vec<u8>>;

    // ========================================================================
    // Constructors
    // ========================================================================

    /// `undefined`
    fn create_undefined(&self) -> ScriptValue;
    /// `null`
    fn create_null(&self) -> ScriptValue;
    /// Boolean
    fn create_boolean(&self, b: bool) -> ScriptValue;
    /// Signed 32-bit integer
    fn create_int32(&self, i: i32) -> ScriptValue;
    /// Unsigned 32-bit integer
    fn create_uint32(&self, u: u32) -> ScriptValue;
    /// Signed 64-bit integer
    fn create_int64(&self, i: i64) -> ScriptValue;
    /// Unsigned 64-bit integer
    fn create_uint64(&self, u: u64) -> ScriptValue;
    /// Number
    fn create_double(&self, f: f64) -> ScriptValue;
    /// String from UTF-8
    fn create_string(&self, s: &str) -> ScriptValue;
    /// Binary view over native bytes, without copying
    fn create_binary(&self, region: BufferRegion) -> ScriptValue;

    // ========================================================================
    // Native-object proxies
    // ========================================================================

    /// Wrap native storage in a script proxy tagged with `class`.
    ///
    /// `storage.owns_payload()` tells the engine whether to free the payload
    /// when the proxy is released.
    fn create_native_object(&self, class: ClassRef, storage: NativeStorage) -> ScriptValue;

    /// Storage behind a native-object proxy
    fn native_object(&self, val: ScriptValue) -> Option<NativeStorage>;

    /// Type id tagged on a native-object proxy
    fn native_object_class(&self, val: ScriptValue) -> Option<ClassRef>;

    /// Attach freshly constructed native storage to a script `this`
    fn bind_native(&self, this: ScriptValue, class: ClassRef, storage: NativeStorage);

    // ========================================================================
    // Indexed properties
    // ========================================================================

    /// `val[index]`
    fn get_property(&self, val: ScriptValue, index: u32) -> ScriptValue;
    /// `val[index] = item`
    fn set_property(&self, val: ScriptValue, index: u32, item: ScriptValue);

    // ========================================================================
    // Persistent handles
    // ========================================================================

    /// Stable identity of a script object
    fn object_identity(&self, val: ScriptValue) -> Option<ScriptObjectId>;
    /// Keep a script object alive across calls
    fn retain(&self, val: ScriptValue) -> PersistentRef;
    /// Current value of a retained handle
    fn resolve(&self, handle: PersistentRef) -> ScriptValue;
    /// Drop a retained handle
    fn release(&self, handle: PersistentRef);

    // ========================================================================
    // Delegates
    // ========================================================================

    /// Native trampoline that forwards a delegate of `delegate` type to a
    /// script function (produced by the external code generator)
    fn function_entry(&self, func: ScriptValue, delegate: ClassRef) -> Option<FunctionPtr>;
}

/// An in-flight script → native call
pub trait CallFrame {
    /// Number of script arguments
    fn arg_count(&self) -> usize;
    /// Argument `index`; `undefined` when out of range
    fn arg(&self, index: usize) -> ScriptValue;
    /// The object the member was looked up on
    fn holder(&self) -> ScriptValue;
    /// `this` of a constructor call
    fn this(&self) -> ScriptValue;
    /// Supply the call's result
    fn set_return(&mut self, val: ScriptValue);
    /// Raise a script error with `message`
    fn throw_error(&mut self, message: &str);
}

// ============================================================================
// Native side
// ============================================================================

/// Managed object header layout.
///
/// Field offsets in metadata count from the object base, which sits
/// `header_size()` bytes before a boxed value's payload.
pub trait ObjectLayout {
    /// Bytes of object header before the payload
    fn header_size(&self) -> usize;

    /// Payload-relative offset of a field declared at `offset`
    fn payload_offset(&self, offset: usize) -> usize {
        offset.saturating_sub(self.header_size())
    }
}

/// A managed exception object caught at the invoke boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeException(pub ObjectRef);

/// Managed runtime reflection, allocation and invocation API.
pub trait ManagedRuntime {
    /// Object header layout
    fn layout(&self) -> &dyn ObjectLayout;

    // ========================================================================
    // Type queries
    // ========================================================================

    /// `target` is assignable from `source`
    fn is_assignable_from(&self, target: ClassRef, source: ClassRef) -> bool;
    /// `class` is a concrete delegate type (not the delegate base classes)
    fn is_delegate(&self, class: ClassRef) -> bool;
    /// `class` is a value type
    fn is_value_type(&self, class: ClassRef) -> bool;
    /// Runtime type of an object
    fn type_of(&self, obj: ObjectRef) -> Arc<TypeDescriptor>;
    /// Descriptor of a class (e.g. the type id tagged on a script proxy)
    fn describe_class(&self, class: ClassRef) -> Arc<TypeDescriptor>;
    /// Descriptor of the runtime's own primitive type for `tag`
    fn primitive_type(&self, tag: PrimitiveTag) -> Arc<TypeDescriptor>;

    // ========================================================================
    // Objects
    // ========================================================================

    /// Allocate an uninitialized instance of a reference type
    fn alloc_object(&self, class: ClassRef) -> ObjectRef;
    /// Box a value-type payload
    fn box_value(&self, class: ClassRef, payload: &[u8]) -> ObjectRef;
    /// Copy a boxed value's payload
    fn unbox(&self, obj: ObjectRef) -> Vec<u8>;
    /// New managed string from UTF-16
    fn new_string(&self, utf16: &[u16]) -> ObjectRef;
    /// UTF-16 contents of a managed string
    fn string_chars(&self, obj: ObjectRef) -> Option<Vec<u16>>;

    // ========================================================================
    // Arrays
    // ========================================================================

    /// New array of `array_class` with `len` zeroed elements
    fn new_array(&self, array_class: ClassRef, len: usize) -> ObjectRef;
    /// Store a reference element
    fn array_set_ref(&self, array: ObjectRef, index: usize, item: Option<ObjectRef>);
    /// Store a value-type element payload
    fn array_set_value(&self, array: ObjectRef, index: usize, payload: &[u8]);

    // ========================================================================
    // Sentinel types
    // ========================================================================

    /// Construct a binary-buffer sentinel instance holding a copy of `bytes`
    fn new_binary_buffer(&self, class: ClassRef, bytes: &[u8]) -> ObjectRef;
    /// Backing bytes of a binary-buffer sentinel instance
    fn binary_buffer_region(&self, obj: ObjectRef) -> Option<BufferRegion>;
    /// Construct a persistent-object sentinel instance
    fn new_persistent_object(&self, class: ClassRef) -> ObjectRef;
    /// `Target` of a typed-value wrapper (the outer `None` means no accessor)
    fn typed_value_target(&self, wrapper: &NativeStorage) -> Option<Option<ObjectRef>>;

    // ========================================================================
    // Field memory
    // ========================================================================

    /// Read `len` raw bytes at a managed object or static address
    fn load_bytes(&self, at: &FieldAddress, len: usize) -> Vec<u8>;
    /// Write raw bytes at a managed object or static address
    fn store_bytes(&self, at: &FieldAddress, bytes: &[u8]);
    /// Read a reference slot
    fn load_ref(&self, at: &FieldAddress) -> Option<ObjectRef>;
    /// Write a reference slot
    fn store_ref(&self, at: &FieldAddress, item: Option<ObjectRef>);
    /// Whether the static field storage at `at` is directly addressable
    /// (false for values that must be materialized, e.g. thread statics)
    fn is_addressable(&self, at: &FieldAddress) -> bool;

    // ========================================================================
    // Calls
    // ========================================================================

    /// Declared default value of parameter `index`; `None` when there is none
    /// (or it is an explicit null)
    fn default_argument(&self, method: &MethodDescriptor, index: usize) -> Option<ArgSlot>;

    /// Invoke `entry` with the marshalled receiver and arguments.
    ///
    /// Value-type returns come back boxed. By-reference slots may be mutated.
    fn invoke(
        &self,
        method: &MethodDescriptor,
        entry: FunctionPtr,
        receiver: Option<&NativeStorage>,
        args: &mut [ArgSlot],
    ) -> Result<Option<ObjectRef>, NativeException>;

    /// `ToString()` of an exception object
    fn describe_exception(&self, exception: ObjectRef) -> Result<String, NativeException>;

    // ========================================================================
    // Delegates
    // ========================================================================

    /// Invoke shape of a delegate type
    fn delegate_invoke_shape(&self, delegate: ClassRef) -> MethodShape;

    /// Allocate a delegate of `delegate` type bound to `target`, calling
    /// `entry` through the synthesized `method` record
    fn construct_delegate(
        &self,
        delegate: ClassRef,
        target: Option<ObjectRef>,
        entry: FunctionPtr,
        method: &Arc<SynthesizedMethod>,
    ) -> ObjectRef;
}
