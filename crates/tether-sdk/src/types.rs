//! Native metadata descriptors
//!
//! Built once per registered member by the registration layer and immutable
//! afterwards. Every conversion decision in the engine is driven by a
//! [`TypeDescriptor`] plus a runtime value.

use std::sync::Arc;

use serde::Deserialize;

use crate::value::{ClassRef, FunctionPtr};

// ============================================================================
// Primitive tags
// ============================================================================

/// Native primitive-type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTag {
    /// `bool`, one byte
    Boolean,
    /// UTF-16 code unit
    Char,
    /// Signed 8-bit
    I1,
    /// Unsigned 8-bit
    U1,
    /// Signed 16-bit
    I2,
    /// Unsigned 16-bit
    U2,
    /// Signed 32-bit
    I4,
    /// Unsigned 32-bit
    U4,
    /// Signed 64-bit
    I8,
    /// Unsigned 64-bit
    U8,
    /// 32-bit float
    R4,
    /// 64-bit float
    R8,
    /// Managed string (a reference type)
    String,
    /// Signed pointer-width integer
    IntPtr,
    /// Unsigned pointer-width integer
    UIntPtr,
}

/// Width of the native pointer-sized integer tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum PointerWidth {
    /// `IntPtr`/`UIntPtr` behave as 32-bit integers
    #[default]
    #[serde(rename = "32")]
    Bits32,
    /// `IntPtr`/`UIntPtr` behave as 64-bit integers
    #[serde(rename = "64")]
    Bits64,
}

impl PrimitiveTag {
    /// Replace the pointer-width tags with their fixed-width equivalent
    pub fn normalize(self, width: PointerWidth) -> PrimitiveTag {
        match (self, width) {
            (PrimitiveTag::IntPtr, PointerWidth::Bits32) => PrimitiveTag::I4,
            (PrimitiveTag::IntPtr, PointerWidth::Bits64) => PrimitiveTag::I8,
            (PrimitiveTag::UIntPtr, PointerWidth::Bits32) => PrimitiveTag::U4,
            (PrimitiveTag::UIntPtr, PointerWidth::Bits64) => PrimitiveTag::U8,
            (tag, _) => tag,
        }
    }

    /// Payload size in bytes. Zero for `String`, which is stored by reference.
    pub fn payload_size(self, width: PointerWidth) -> usize {
        match self.normalize(width) {
            PrimitiveTag::Boolean | PrimitiveTag::I1 | PrimitiveTag::U1 => 1,
            PrimitiveTag::Char | PrimitiveTag::I2 | PrimitiveTag::U2 => 2,
            PrimitiveTag::I4 | PrimitiveTag::U4 | PrimitiveTag::R4 => 4,
            PrimitiveTag::I8 | PrimitiveTag::U8 | PrimitiveTag::R8 => 8,
            PrimitiveTag::String => 0,
            PrimitiveTag::IntPtr | PrimitiveTag::UIntPtr => unreachable!("normalized above"),
        }
    }

    /// Whether values of this tag are copied by value
    pub fn is_value_type(self) -> bool {
        self != PrimitiveTag::String
    }
}

// ============================================================================
// TypeDescriptor
// ============================================================================

/// Kind of a native type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// No value (method return only)
    Void,
    /// Primitive, including `String`
    Primitive(PrimitiveTag),
    /// The root object type: "any native object"
    Object,
    /// Ordinary reference type
    Class,
    /// User value type (struct)
    Struct,
    /// Enum; `element` is the underlying primitive type
    Enum,
    /// Nullable wrapper; `element` is the wrapped value type
    Nullable,
    /// Generic instantiation; `element` is the generic definition
    GenericInstance,
    /// Array; `element` is the element type
    Array,
    /// Concrete delegate type
    Delegate,
    /// Unmanaged pointer; `element` is the pointee
    Pointer,
    /// Function pointer
    FunctionPointer,
}

/// Identifies a native type
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    /// Runtime class identity used for assignability checks
    pub class: ClassRef,
    /// Display name
    pub name: String,
    /// Kind
    pub kind: TypeKind,
    /// Value-type payload size (0 for reference types)
    pub size: usize,
    /// Redirect target, see [`TypeKind`]
    pub element: Option<Arc<TypeDescriptor>>,
}

impl TypeDescriptor {
    fn build(
        class: ClassRef,
        name: impl Into<String>,
        kind: TypeKind,
        size: usize,
        element: Option<Arc<TypeDescriptor>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            class,
            name: name.into(),
            kind,
            size,
            element,
        })
    }

    /// `void`
    pub fn void(class: ClassRef) -> Arc<Self> {
        Self::build(class, "Void", TypeKind::Void, 0, None)
    }

    /// Primitive type; `size` follows the tag (pointer-width tags use the
    /// given width)
    pub fn primitive(
        class: ClassRef,
        name: impl Into<String>,
        tag: PrimitiveTag,
        width: PointerWidth,
    ) -> Arc<Self> {
        Self::build(class, name, TypeKind::Primitive(tag), tag.payload_size(width), None)
    }

    /// The root object type
    pub fn object(class: ClassRef) -> Arc<Self> {
        Self::build(class, "Object", TypeKind::Object, 0, None)
    }

    /// Ordinary reference type
    pub fn class(class: ClassRef, name: impl Into<String>) -> Arc<Self> {
        Self::build(class, name, TypeKind::Class, 0, None)
    }

    /// User value type
    pub fn structure(class: ClassRef, name: impl Into<String>, size: usize) -> Arc<Self> {
        Self::build(class, name, TypeKind::Struct, size, None)
    }

    /// Enum over `underlying`
    pub fn enumeration(
        class: ClassRef,
        name: impl Into<String>,
        underlying: Arc<TypeDescriptor>,
    ) -> Arc<Self> {
        let size = underlying.size;
        Self::build(class, name, TypeKind::Enum, size, Some(underlying))
    }

    /// Nullable wrapper; payload is the wrapped value followed by one validity byte
    pub fn nullable(class: ClassRef, wrapped: Arc<TypeDescriptor>) -> Arc<Self> {
        let name = format!("Nullable<{}>", wrapped.name);
        let size = wrapped.size + 1;
        Self::build(class, name, TypeKind::Nullable, size, Some(wrapped))
    }

    /// Generic instantiation of `definition`; `size` is the instance payload
    /// size when the definition is a value type
    pub fn generic_instance(
        class: ClassRef,
        name: impl Into<String>,
        definition: Arc<TypeDescriptor>,
        size: usize,
    ) -> Arc<Self> {
        Self::build(class, name, TypeKind::GenericInstance, size, Some(definition))
    }

    /// Array of `element`
    pub fn array(class: ClassRef, element: Arc<TypeDescriptor>) -> Arc<Self> {
        let name = format!("{}[]", element.name);
        Self::build(class, name, TypeKind::Array, 0, Some(element))
    }

    /// Concrete delegate type
    pub fn delegate(class: ClassRef, name: impl Into<String>) -> Arc<Self> {
        Self::build(class, name, TypeKind::Delegate, 0, None)
    }

    /// Pointer to `pointee`
    pub fn pointer(class: ClassRef, pointee: Arc<TypeDescriptor>) -> Arc<Self> {
        let name = format!("{}*", pointee.name);
        Self::build(class, name, TypeKind::Pointer, 0, Some(pointee))
    }

    /// `void`
    pub fn is_void(&self) -> bool {
        self.kind == TypeKind::Void
    }

    /// The root object type
    pub fn is_any_object(&self) -> bool {
        self.kind == TypeKind::Object
    }

    /// Primitive tag when this type is itself a primitive
    pub fn primitive_tag(&self) -> Option<PrimitiveTag> {
        match self.kind {
            TypeKind::Primitive(tag) => Some(tag),
            _ => None,
        }
    }

    /// Whether instances are copied by value.
    ///
    /// Generic instantiations follow their definition.
    pub fn is_value_type(&self) -> bool {
        match self.kind {
            TypeKind::Primitive(tag) => tag.is_value_type(),
            TypeKind::Struct | TypeKind::Enum | TypeKind::Nullable => true,
            TypeKind::GenericInstance => self
                .element
                .as_ref()
                .map(|def| def.is_value_type())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Redirect target (underlying, wrapped, definition, element or pointee)
    pub fn element(&self) -> Option<&Arc<TypeDescriptor>> {
        self.element.as_ref()
    }
}

// ============================================================================
// Methods and fields
// ============================================================================

/// One native parameter
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    /// Parameter name
    pub name: String,
    /// Declared type (for by-reference parameters, the referenced type)
    pub ty: Arc<TypeDescriptor>,
    /// `ref`/`out` parameter
    pub by_ref: bool,
    /// Has a declared default value
    pub has_default: bool,
    /// Trailing variadic array (`params T[]`)
    pub is_variadic: bool,
}

impl ParameterDescriptor {
    /// Plain by-value parameter
    pub fn new(name: impl Into<String>, ty: Arc<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            ty,
            by_ref: false,
            has_default: false,
            is_variadic: false,
        }
    }

    /// Mark as by-reference
    pub fn by_ref(mut self) -> Self {
        self.by_ref = true;
        self
    }

    /// Mark as having a default value
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Mark as the trailing variadic array
    pub fn variadic(mut self) -> Self {
        self.is_variadic = true;
        self
    }
}

/// One overload of a native method or constructor
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Member name
    pub name: String,
    /// Declaring type
    pub declaring: Arc<TypeDescriptor>,
    /// Ordered native parameters
    pub params: Vec<ParameterDescriptor>,
    /// Return type (`Void` for none)
    pub return_type: Arc<TypeDescriptor>,
    /// Static method (no receiver)
    pub is_static: bool,
    /// Extension method: native parameter 0 is the script receiver
    pub is_extension: bool,
    optional_count: usize,
    has_variadic: bool,
}

impl MethodDescriptor {
    /// Start building a descriptor
    pub fn builder(
        name: impl Into<String>,
        declaring: Arc<TypeDescriptor>,
        return_type: Arc<TypeDescriptor>,
    ) -> MethodDescriptorBuilder {
        MethodDescriptorBuilder {
            name: name.into(),
            declaring,
            return_type,
            params: Vec::new(),
            is_static: false,
            is_extension: false,
        }
    }

    /// Number of parameters with a default value
    pub fn optional_count(&self) -> usize {
        self.optional_count
    }

    /// Whether the last parameter is a variadic array
    pub fn has_variadic(&self) -> bool {
        self.has_variadic
    }

    /// First native parameter fed from script arguments
    pub fn first_script_param(&self) -> usize {
        usize::from(self.is_extension)
    }

    /// Number of script arguments that must be supplied
    pub fn required_count(&self) -> usize {
        self.params
            .len()
            .saturating_sub(self.first_script_param())
            .saturating_sub(self.optional_count)
            .saturating_sub(usize::from(self.has_variadic))
    }
}

/// Builder for [`MethodDescriptor`]
pub struct MethodDescriptorBuilder {
    name: String,
    declaring: Arc<TypeDescriptor>,
    return_type: Arc<TypeDescriptor>,
    params: Vec<ParameterDescriptor>,
    is_static: bool,
    is_extension: bool,
}

impl MethodDescriptorBuilder {
    /// Append a parameter
    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Mark as static
    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Mark as extension method (implies static)
    pub fn extension(mut self) -> Self {
        self.is_extension = true;
        self.is_static = true;
        self
    }

    /// Build the descriptor
    pub fn build(self) -> Arc<MethodDescriptor> {
        let last = self.params.len().checked_sub(1);
        let has_variadic = last
            .map(|i| self.params[i].is_variadic)
            .unwrap_or(false);
        let optional_count = self.params.iter().filter(|p| p.has_default).count();
        Arc::new(MethodDescriptor {
            name: self.name,
            declaring: self.declaring,
            params: self.params,
            return_type: self.return_type,
            is_static: self.is_static,
            is_extension: self.is_extension,
            optional_count,
            has_variadic,
        })
    }
}

/// Where a field lives relative to its receiver
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Field type
    pub ty: Arc<TypeDescriptor>,
    /// Byte offset from the receiver's object base (or into static storage)
    pub offset: usize,
    /// Static field
    pub is_static: bool,
    /// Class owning the static storage
    pub owner: ClassRef,
}

// ============================================================================
// Delegate shapes
// ============================================================================

/// Invocation shape of a delegate type (its `Invoke` signature)
#[derive(Debug, Clone)]
pub struct MethodShape {
    /// Identity of the delegate's invoke method; the cache key
    pub key: usize,
    /// Invoke method name
    pub name: String,
    /// Parameter types
    pub params: Vec<Arc<TypeDescriptor>>,
    /// Return type
    pub return_type: Arc<TypeDescriptor>,
    /// Static-only invocation (no instance to bind)
    pub is_static: bool,
}

/// Method record synthesized for a bridged delegate: the invoke shape with a
/// substituted entry point
#[derive(Debug, Clone)]
pub struct SynthesizedMethod {
    /// Cloned shape
    pub shape: MethodShape,
    /// Callable entry
    pub entry: FunctionPtr,
}

/// Overload candidate: metadata plus the entry point to invoke
#[derive(Debug, Clone)]
pub struct MethodWrapper {
    /// Method metadata
    pub method: Arc<MethodDescriptor>,
    /// Native entry point
    pub entry: FunctionPtr,
}

impl MethodWrapper {
    /// Pair a descriptor with its entry point
    pub fn new(method: Arc<MethodDescriptor>, entry: FunctionPtr) -> Self {
        Self { method, entry }
    }
}
