//! In-memory managed runtime

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tether_sdk::{
    ArgSlot, BufferRegion, ClassRef, FieldAddress, FieldBase, FunctionPtr, ManagedRuntime,
    MethodDescriptor, MethodShape, NativeException, NativeStorage, ObjectLayout, ObjectRef,
    PointerWidth, PrimitiveTag, SynthesizedMethod, TypeDescriptor,
};

/// Object header size of every fake object
pub const HEADER_SIZE: usize = 16;

const REF_SIZE: usize = std::mem::size_of::<usize>();

/// Native method body. Receives the runtime so it can allocate results.
pub type NativeFn = dyn Fn(&FakeRuntime, Option<&NativeStorage>, &mut [ArgSlot]) -> Result<Option<ObjectRef>, NativeException>
    + Send
    + Sync;

/// Contents of a fake object
#[derive(Debug, Clone)]
pub enum ObjectBody {
    /// Reference-type instance memory, header included
    Instance(Vec<u8>),
    /// Boxed value-type payload
    Boxed(Vec<u8>),
    /// String
    Str(Vec<u16>),
    /// Array elements
    Array(Vec<ArgSlot>),
    /// Binary-buffer sentinel bytes
    Buffer(Vec<u8>),
    /// Delegate instance
    Delegate {
        /// Bound target
        target: Option<ObjectRef>,
        /// Entry point
        entry: FunctionPtr,
        /// Synthesized invoke record
        method: Arc<SynthesizedMethod>,
    },
    /// Exception; `None` makes `ToString()` throw
    Exception(Option<String>),
}

/// A fake managed object
#[derive(Debug, Clone)]
pub struct FakeObject {
    /// Runtime class
    pub class: ClassRef,
    /// Contents
    pub body: ObjectBody,
}

struct ClassInfo {
    desc: Arc<TypeDescriptor>,
    parent: Option<ClassRef>,
    instance_size: usize,
    invoke: Option<MethodShape>,
}

/// Well-known types every [`FakeRuntime`] starts with
#[derive(Debug, Clone)]
pub struct Builtins {
    /// `void`
    pub void: Arc<TypeDescriptor>,
    /// Root object type
    pub object: Arc<TypeDescriptor>,
    /// `string`
    pub string: Arc<TypeDescriptor>,
    /// `bool`
    pub boolean: Arc<TypeDescriptor>,
    /// `char`
    pub char: Arc<TypeDescriptor>,
    /// `sbyte`
    pub i1: Arc<TypeDescriptor>,
    /// `byte`
    pub u1: Arc<TypeDescriptor>,
    /// `short`
    pub i2: Arc<TypeDescriptor>,
    /// `ushort`
    pub u2: Arc<TypeDescriptor>,
    /// `int`
    pub i4: Arc<TypeDescriptor>,
    /// `uint`
    pub u4: Arc<TypeDescriptor>,
    /// `long`
    pub i8: Arc<TypeDescriptor>,
    /// `ulong`
    pub u8: Arc<TypeDescriptor>,
    /// `float`
    pub r4: Arc<TypeDescriptor>,
    /// `double`
    pub r8: Arc<TypeDescriptor>,
    /// `IntPtr`
    pub int_ptr: Arc<TypeDescriptor>,
    /// Persistent-object sentinel
    pub persistent_object: Arc<TypeDescriptor>,
    /// Binary-buffer sentinel
    pub binary_buffer: Arc<TypeDescriptor>,
    /// Typed-value sentinel
    pub typed_value: Arc<TypeDescriptor>,
}

struct Heap {
    next: usize,
    classes: FxHashMap<ClassRef, ClassInfo>,
    objects: FxHashMap<ObjectRef, FakeObject>,
    statics: FxHashMap<ClassRef, Vec<u8>>,
    unaddressable: FxHashSet<ClassRef>,
    methods: FxHashMap<FunctionPtr, Arc<NativeFn>>,
    defaults: FxHashMap<(String, usize), ArgSlot>,
    primitives: FxHashMap<PrimitiveTag, Arc<TypeDescriptor>>,
    calls: Vec<String>,
}

impl Heap {
    fn next_addr(&mut self) -> usize {
        self.next += 0x10;
        self.next
    }

    fn class_ref(&mut self) -> ClassRef {
        let addr = self.next_addr();
        ClassRef::from_addr(addr).unwrap_or_else(|| unreachable!("addresses start above zero"))
    }

    fn add_object(&mut self, class: ClassRef, body: ObjectBody) -> ObjectRef {
        let addr = self.next_addr();
        let obj = ObjectRef::from_addr(addr).unwrap_or_else(|| unreachable!("addresses start above zero"));
        self.objects.insert(obj, FakeObject { class, body });
        obj
    }

    fn add_class(
        &mut self,
        parent: Option<ClassRef>,
        instance_size: usize,
        make: impl FnOnce(ClassRef) -> Arc<TypeDescriptor>,
    ) -> Arc<TypeDescriptor> {
        let class = self.class_ref();
        let desc = make(class);
        self.classes.insert(
            class,
            ClassInfo {
                desc: desc.clone(),
                parent,
                instance_size,
                invoke: None,
            },
        );
        desc
    }

    fn bytes_at(&self, at: &FieldAddress, len: usize) -> Vec<u8> {
        let read = |data: &[u8], offset: usize| {
            let mut out = vec![0; len];
            if offset < data.len() {
                let end = (offset + len).min(data.len());
                out[..end - offset].copy_from_slice(&data[offset..end]);
            }
            out
        };
        match &at.base {
            FieldBase::Boxed(b) => b.read_at(at.offset, len),
            FieldBase::Static(class) => read(self.statics.get(class).map(Vec::as_slice).unwrap_or(&[]), at.offset),
            FieldBase::Object(obj) => match self.objects.get(obj).map(|o| &o.body) {
                Some(ObjectBody::Instance(mem)) => read(mem, at.offset),
                Some(ObjectBody::Boxed(payload)) => {
                    read(payload, at.offset.saturating_sub(HEADER_SIZE))
                }
                _ => vec![0; len],
            },
        }
    }

    fn write_at(&mut self, at: &FieldAddress, bytes: &[u8]) {
        fn write(data: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
            if data.len() < offset + bytes.len() {
                data.resize(offset + bytes.len(), 0);
            }
            data[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
        match &at.base {
            FieldBase::Boxed(b) => b.write_at(at.offset, bytes),
            FieldBase::Static(class) => write(self.statics.entry(*class).or_default(), at.offset, bytes),
            FieldBase::Object(obj) => match self.objects.get_mut(obj).map(|o| &mut o.body) {
                Some(ObjectBody::Instance(mem)) => write(mem, at.offset, bytes),
                Some(ObjectBody::Boxed(payload)) => {
                    write(payload, at.offset.saturating_sub(HEADER_SIZE), bytes)
                }
                _ => {}
            },
        }
    }
}

struct FakeLayout;

impl ObjectLayout for FakeLayout {
    fn header_size(&self) -> usize {
        HEADER_SIZE
    }
}

/// In-memory [`ManagedRuntime`].
///
/// Classes and objects get fresh addresses from one counter. Methods are
/// closures registered under a [`FunctionPtr`]; every invocation is logged by
/// method name.
pub struct FakeRuntime {
    heap: Mutex<Heap>,
    builtins: Builtins,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRuntime {
    /// Runtime with the built-in types registered
    pub fn new() -> Self {
        let mut heap = Heap {
            next: 0x1000,
            classes: FxHashMap::default(),
            objects: FxHashMap::default(),
            statics: FxHashMap::default(),
            unaddressable: FxHashSet::default(),
            methods: FxHashMap::default(),
            defaults: FxHashMap::default(),
            primitives: FxHashMap::default(),
            calls: Vec::new(),
        };
        let object = heap.add_class(None, 0, TypeDescriptor::object);
        let root = Some(object.class);
        let void = heap.add_class(root, 0, TypeDescriptor::void);
        let mut prim = |name: &str, tag: PrimitiveTag| {
            let desc = heap.add_class(root, 0, |c| {
                TypeDescriptor::primitive(c, name, tag, PointerWidth::Bits32)
            });
            heap.primitives.insert(tag, desc.clone());
            desc
        };
        let string = prim("String", PrimitiveTag::String);
        let boolean = prim("Boolean", PrimitiveTag::Boolean);
        let char = prim("Char", PrimitiveTag::Char);
        let i1 = prim("SByte", PrimitiveTag::I1);
        let u1 = prim("Byte", PrimitiveTag::U1);
        let i2 = prim("Int16", PrimitiveTag::I2);
        let u2 = prim("UInt16", PrimitiveTag::U2);
        let i4 = prim("Int32", PrimitiveTag::I4);
        let u4 = prim("UInt32", PrimitiveTag::U4);
        let i8 = prim("Int64", PrimitiveTag::I8);
        let u8 = prim("UInt64", PrimitiveTag::U8);
        let r4 = prim("Single", PrimitiveTag::R4);
        let r8 = prim("Double", PrimitiveTag::R8);
        let int_ptr = prim("IntPtr", PrimitiveTag::IntPtr);
        prim("UIntPtr", PrimitiveTag::UIntPtr);
        let persistent_object = heap.add_class(root, HEADER_SIZE, |c| {
            TypeDescriptor::class(c, "PersistentObject")
        });
        let binary_buffer = heap.add_class(root, HEADER_SIZE, |c| {
            TypeDescriptor::class(c, "ArrayBuffer")
        });
        let typed_value = heap.add_class(root, HEADER_SIZE + REF_SIZE, |c| {
            TypeDescriptor::class(c, "TypedValue")
        });
        let builtins = Builtins {
            void,
            object,
            string,
            boolean,
            char,
            i1,
            u1,
            i2,
            u2,
            i4,
            u4,
            i8,
            u8,
            r4,
            r8,
            int_ptr,
            persistent_object,
            binary_buffer,
            typed_value,
        };
        Self {
            heap: Mutex::new(heap),
            builtins,
        }
    }

    /// Built-in types
    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    // ========================================================================
    // Type registration
    // ========================================================================

    /// Reference type deriving from `parent` (the root object when `None`)
    /// with `fields` bytes of instance fields after the header
    pub fn define_class(
        &self,
        name: &str,
        parent: Option<&TypeDescriptor>,
        fields: usize,
    ) -> Arc<TypeDescriptor> {
        let parent = parent.map(|p| p.class).unwrap_or(self.builtins.object.class);
        self.heap
            .lock()
            .add_class(Some(parent), HEADER_SIZE + fields, |c| TypeDescriptor::class(c, name))
    }

    /// User value type of `size` payload bytes
    pub fn define_struct(&self, name: &str, size: usize) -> Arc<TypeDescriptor> {
        let root = Some(self.builtins.object.class);
        self.heap
            .lock()
            .add_class(root, 0, |c| TypeDescriptor::structure(c, name, size))
    }

    /// Enum over `underlying`
    pub fn define_enum(&self, name: &str, underlying: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        let root = Some(self.builtins.object.class);
        self.heap.lock().add_class(root, 0, |c| {
            TypeDescriptor::enumeration(c, name, underlying.clone())
        })
    }

    /// Nullable wrapper of `wrapped`
    pub fn define_nullable(&self, wrapped: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        let root = Some(self.builtins.object.class);
        self.heap
            .lock()
            .add_class(root, 0, |c| TypeDescriptor::nullable(c, wrapped.clone()))
    }

    /// Generic instantiation of `definition`
    pub fn define_generic(
        &self,
        name: &str,
        definition: &Arc<TypeDescriptor>,
    ) -> Arc<TypeDescriptor> {
        let root = Some(self.builtins.object.class);
        let size = definition.size;
        self.heap.lock().add_class(root, 0, |c| {
            TypeDescriptor::generic_instance(c, name, definition.clone(), size)
        })
    }

    /// Array of `element`
    pub fn define_array(&self, element: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        let root = Some(self.builtins.object.class);
        self.heap
            .lock()
            .add_class(root, 0, |c| TypeDescriptor::array(c, element.clone()))
    }

    /// Pointer to `pointee`
    pub fn define_pointer(&self, pointee: &Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        let root = Some(self.builtins.object.class);
        self.heap
            .lock()
            .add_class(root, 0, |c| TypeDescriptor::pointer(c, pointee.clone()))
    }

    /// Delegate type with the given invoke signature. Its shape key is the
    /// delegate's class address.
    pub fn define_delegate(
        &self,
        name: &str,
        params: Vec<Arc<TypeDescriptor>>,
        return_type: Arc<TypeDescriptor>,
        is_static: bool,
    ) -> Arc<TypeDescriptor> {
        let root = Some(self.builtins.object.class);
        let mut heap = self.heap.lock();
        let desc = heap.add_class(root, 0, |c| TypeDescriptor::delegate(c, name));
        if let Some(info) = heap.classes.get_mut(&desc.class) {
            info.invoke = Some(MethodShape {
                key: desc.class.addr(),
                name: "Invoke".into(),
                params,
                return_type,
                is_static,
            });
        }
        desc
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Register a method body and get its entry point
    pub fn register_method<F>(&self, body: F) -> FunctionPtr
    where
        F: Fn(&FakeRuntime, Option<&NativeStorage>, &mut [ArgSlot]) -> Result<Option<ObjectRef>, NativeException>
            + Send
            + Sync
            + 'static,
    {
        let mut heap = self.heap.lock();
        let addr = heap.next_addr();
        let entry = FunctionPtr::from_addr(addr).unwrap_or_else(|| unreachable!("addresses start above zero"));
        heap.methods.insert(entry, Arc::new(body));
        entry
    }

    /// Entry point with no body, for delegate trampolines
    pub fn trampoline(&self) -> FunctionPtr {
        self.register_method(|_, _, _| Ok(None))
    }

    /// Declare the default value of parameter `index` of methods named `method`
    pub fn set_default(&self, method: &str, index: usize, value: ArgSlot) {
        self.heap
            .lock()
            .defaults
            .insert((method.to_owned(), index), value);
    }

    /// Names of invoked methods, in call order
    pub fn calls(&self) -> Vec<String> {
        self.heap.lock().calls.clone()
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Snapshot of an object
    pub fn object(&self, obj: ObjectRef) -> Option<FakeObject> {
        self.heap.lock().objects.get(&obj).cloned()
    }

    /// Number of live objects
    pub fn object_count(&self) -> usize {
        self.heap.lock().objects.len()
    }

    /// Payload of a boxed value
    pub fn boxed(&self, obj: ObjectRef) -> Option<Vec<u8>> {
        match self.object(obj)?.body {
            ObjectBody::Boxed(payload) => Some(payload),
            _ => None,
        }
    }

    /// Contents of a string object
    pub fn string(&self, obj: ObjectRef) -> Option<String> {
        match self.object(obj)?.body {
            ObjectBody::Str(units) => Some(String::from_utf16_lossy(&units)),
            _ => None,
        }
    }

    /// New managed string from UTF-8
    pub fn new_str(&self, s: &str) -> ObjectRef {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.new_string(&units)
    }

    /// Elements of an array
    pub fn array_items(&self, obj: ObjectRef) -> Option<Vec<ArgSlot>> {
        match self.object(obj)?.body {
            ObjectBody::Array(items) => Some(items),
            _ => None,
        }
    }

    /// New exception object with `ToString()` returning `message`, or
    /// throwing when `message` is `None`
    pub fn new_exception(&self, message: Option<&str>) -> NativeException {
        let root = self.builtins.object.class;
        let obj = self
            .heap
            .lock()
            .add_object(root, ObjectBody::Exception(message.map(str::to_owned)));
        NativeException(obj)
    }

    /// Typed-value wrapper around `target`
    pub fn new_typed_value(&self, target: Option<ObjectRef>) -> ObjectRef {
        let obj = self.alloc_object(self.builtins.typed_value.class);
        let at = FieldAddress {
            base: FieldBase::Object(obj),
            offset: HEADER_SIZE,
        };
        self.store_ref(&at, target);
        obj
    }

    /// Mark static storage of `class` as not directly addressable
    pub fn mark_unaddressable(&self, class: ClassRef) {
        self.heap.lock().unaddressable.insert(class);
    }

    /// Delegate parts of `obj`
    pub fn delegate(&self, obj: ObjectRef) -> Option<(Option<ObjectRef>, FunctionPtr, Arc<SynthesizedMethod>)> {
        match self.object(obj)?.body {
            ObjectBody::Delegate {
                target,
                entry,
                method,
            } => Some((target, entry, method)),
            _ => None,
        }
    }

    fn info<T>(&self, class: ClassRef, f: impl FnOnce(&ClassInfo) -> T) -> Option<T> {
        self.heap.lock().classes.get(&class).map(f)
    }
}

fn usize_from(bytes: &[u8]) -> usize {
    let mut raw = [0u8; REF_SIZE];
    let n = bytes.len().min(REF_SIZE);
    raw[..n].copy_from_slice(&bytes[..n]);
    usize::from_le_bytes(raw)
}

impl ManagedRuntime for FakeRuntime {
    fn layout(&self) -> &dyn ObjectLayout {
        &FakeLayout
    }

    fn is_assignable_from(&self, target: ClassRef, source: ClassRef) -> bool {
        let heap = self.heap.lock();
        let mut cur = Some(source);
        while let Some(class) = cur {
            if class == target {
                return true;
            }
            cur = heap.classes.get(&class).and_then(|info| info.parent);
        }
        false
    }

    fn is_delegate(&self, class: ClassRef) -> bool {
        self.info(class, |info| info.invoke.is_some()).unwrap_or(false)
    }

    fn is_value_type(&self, class: ClassRef) -> bool {
        self.info(class, |info| info.desc.is_value_type())
            .unwrap_or(false)
    }

    fn type_of(&self, obj: ObjectRef) -> Arc<TypeDescriptor> {
        let class = self.heap.lock().objects.get(&obj).map(|o| o.class);
        match class {
            Some(class) => self.describe_class(class),
            None => self.builtins.object.clone(),
        }
    }

    fn describe_class(&self, class: ClassRef) -> Arc<TypeDescriptor> {
        self.info(class, |info| info.desc.clone())
            .unwrap_or_else(|| self.builtins.object.clone())
    }

    fn primitive_type(&self, tag: PrimitiveTag) -> Arc<TypeDescriptor> {
        self.heap
            .lock()
            .primitives
            .get(&tag)
            .cloned()
            .unwrap_or_else(|| self.builtins.object.clone())
    }

    fn alloc_object(&self, class: ClassRef) -> ObjectRef {
        let size = self
            .info(class, |info| info.instance_size)
            .unwrap_or(HEADER_SIZE);
        self.heap
            .lock()
            .add_object(class, ObjectBody::Instance(vec![0; size]))
    }

    fn box_value(&self, class: ClassRef, payload: &[u8]) -> ObjectRef {
        self.heap
            .lock()
            .add_object(class, ObjectBody::Boxed(payload.to_vec()))
    }

    fn unbox(&self, obj: ObjectRef) -> Vec<u8> {
        match self.object(obj).map(|o| o.body) {
            Some(ObjectBody::Boxed(payload)) => payload,
            Some(ObjectBody::Instance(mem)) => mem.get(HEADER_SIZE..).unwrap_or(&[]).to_vec(),
            _ => Vec::new(),
        }
    }

    fn new_string(&self, utf16: &[u16]) -> ObjectRef {
        let class = self.builtins.string.class;
        self.heap
            .lock()
            .add_object(class, ObjectBody::Str(utf16.to_vec()))
    }

    fn string_chars(&self, obj: ObjectRef) -> Option<Vec<u16>> {
        match self.object(obj)?.body {
            ObjectBody::Str(units) => Some(units),
            _ => None,
        }
    }

    fn new_array(&self, array_class: ClassRef, len: usize) -> ObjectRef {
        let element = self
            .info(array_class, |info| info.desc.element().cloned())
            .flatten();
        let blank = match element {
            Some(elem) if elem.is_value_type() => ArgSlot::Value(vec![0; elem.size]),
            _ => ArgSlot::Object(None),
        };
        self.heap
            .lock()
            .add_object(array_class, ObjectBody::Array(vec![blank; len]))
    }

    fn array_set_ref(&self, array: ObjectRef, index: usize, item: Option<ObjectRef>) {
        let mut heap = self.heap.lock();
        if let Some(ObjectBody::Array(items)) = heap.objects.get_mut(&array).map(|o| &mut o.body) {
            if let Some(slot) = items.get_mut(index) {
                *slot = ArgSlot::Object(item);
            }
        }
    }

    fn array_set_value(&self, array: ObjectRef, index: usize, payload: &[u8]) {
        let mut heap = self.heap.lock();
        if let Some(ObjectBody::Array(items)) = heap.objects.get_mut(&array).map(|o| &mut o.body) {
            if let Some(slot) = items.get_mut(index) {
                *slot = ArgSlot::Value(payload.to_vec());
            }
        }
    }

    fn new_binary_buffer(&self, class: ClassRef, bytes: &[u8]) -> ObjectRef {
        self.heap
            .lock()
            .add_object(class, ObjectBody::Buffer(bytes.to_vec()))
    }

    fn binary_buffer_region(&self, obj: ObjectRef) -> Option<BufferRegion> {
        match self.object(obj)?.body {
            ObjectBody::Buffer(bytes) => Some(BufferRegion {
                array: obj,
                len: bytes.len(),
            }),
            _ => None,
        }
    }

    fn new_persistent_object(&self, class: ClassRef) -> ObjectRef {
        self.alloc_object(class)
    }

    fn typed_value_target(&self, wrapper: &NativeStorage) -> Option<Option<ObjectRef>> {
        let obj = wrapper.as_object()?;
        if self.object(obj)?.class != self.builtins.typed_value.class {
            return None;
        }
        let at = FieldAddress {
            base: FieldBase::Object(obj),
            offset: HEADER_SIZE,
        };
        Some(self.load_ref(&at))
    }

    fn load_bytes(&self, at: &FieldAddress, len: usize) -> Vec<u8> {
        self.heap.lock().bytes_at(at, len)
    }

    fn store_bytes(&self, at: &FieldAddress, bytes: &[u8]) {
        self.heap.lock().write_at(at, bytes);
    }

    fn load_ref(&self, at: &FieldAddress) -> Option<ObjectRef> {
        ObjectRef::from_addr(usize_from(&self.load_bytes(at, REF_SIZE)))
    }

    fn store_ref(&self, at: &FieldAddress, item: Option<ObjectRef>) {
        let addr = item.map(ObjectRef::addr).unwrap_or(0);
        self.store_bytes(at, &addr.to_le_bytes());
    }

    fn is_addressable(&self, at: &FieldAddress) -> bool {
        match &at.base {
            FieldBase::Static(class) => !self.heap.lock().unaddressable.contains(class),
            _ => true,
        }
    }

    fn default_argument(&self, method: &MethodDescriptor, index: usize) -> Option<ArgSlot> {
        self.heap
            .lock()
            .defaults
            .get(&(method.name.clone(), index))
            .cloned()
    }

    fn invoke(
        &self,
        method: &MethodDescriptor,
        entry: FunctionPtr,
        receiver: Option<&NativeStorage>,
        args: &mut [ArgSlot],
    ) -> Result<Option<ObjectRef>, NativeException> {
        let body = {
            let mut heap = self.heap.lock();
            heap.calls.push(method.name.clone());
            heap.methods.get(&entry).cloned()
        };
        match body {
            Some(body) => body(self, receiver, args),
            None => Err(self.new_exception(Some("entry point not found"))),
        }
    }

    fn describe_exception(&self, exception: ObjectRef) -> Result<String, NativeException> {
        match self.object(exception).map(|o| o.body) {
            Some(ObjectBody::Exception(Some(message))) => Ok(message),
            Some(ObjectBody::Exception(None)) => Err(self.new_exception(Some("ToString failed"))),
            _ => Ok(self.type_of(exception).name.clone()),
        }
    }

    fn delegate_invoke_shape(&self, delegate: ClassRef) -> MethodShape {
        self.info(delegate, |info| info.invoke.clone())
            .flatten()
            .unwrap_or_else(|| MethodShape {
                key: delegate.addr(),
                name: "Invoke".into(),
                params: Vec::new(),
                return_type: self.builtins.void.clone(),
                is_static: false,
            })
    }

    fn construct_delegate(
        &self,
        delegate: ClassRef,
        target: Option<ObjectRef>,
        entry: FunctionPtr,
        method: &Arc<SynthesizedMethod>,
    ) -> ObjectRef {
        self.heap.lock().add_object(
            delegate,
            ObjectBody::Delegate {
                target,
                entry,
                method: method.clone(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignability_walks_parents() {
        let rt = FakeRuntime::new();
        let animal = rt.define_class("Animal", None, 0);
        let dog = rt.define_class("Dog", Some(&animal), 0);
        assert!(rt.is_assignable_from(animal.class, dog.class));
        assert!(!rt.is_assignable_from(dog.class, animal.class));
        assert!(rt.is_assignable_from(rt.builtins().object.class, dog.class));
    }

    #[test]
    fn test_instance_field_memory() {
        let rt = FakeRuntime::new();
        let point = rt.define_class("Point", None, 8);
        let obj = rt.alloc_object(point.class);
        let at = FieldAddress {
            base: FieldBase::Object(obj),
            offset: HEADER_SIZE + 4,
        };
        rt.store_bytes(&at, &7i32.to_le_bytes());
        assert_eq!(rt.load_bytes(&at, 4), 7i32.to_le_bytes().to_vec());
        assert_eq!(rt.unbox(obj), vec![0, 0, 0, 0, 7, 0, 0, 0]);
    }

    #[test]
    fn test_typed_value_target() {
        let rt = FakeRuntime::new();
        let s = rt.new_str("hi");
        let wrapper = rt.new_typed_value(Some(s));
        assert_eq!(
            rt.typed_value_target(&NativeStorage::Object(wrapper)),
            Some(Some(s))
        );
        assert_eq!(rt.typed_value_target(&NativeStorage::Object(s)), None);
    }
}
