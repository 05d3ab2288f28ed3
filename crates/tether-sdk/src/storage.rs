//! Native storage shapes
//!
//! Describes *where* a native value lives when a script-side proxy or a native
//! argument slot refers to it, and who owns that memory.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::{ClassRef, ObjectRef};

// ============================================================================
// ValueBox
// ============================================================================

/// Heap block holding a value-type payload outside any managed object.
///
/// Clones share the same block. The block is released when the last holder
/// drops it, which is how a script wrapper that "owns and must free" its
/// payload gives the memory back.
#[derive(Clone, Default)]
pub struct ValueBox(Arc<Mutex<Vec<u8>>>);

impl ValueBox {
    /// Take ownership of an existing payload
    pub fn new(payload: Vec<u8>) -> Self {
        Self(Arc::new(Mutex::new(payload)))
    }

    /// Zero-filled payload of `size` bytes
    pub fn zeroed(size: usize) -> Self {
        Self::new(vec![0; size])
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Check for an empty payload
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the whole payload out
    pub fn snapshot(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    /// Copy `len` bytes starting at `offset`. Bytes past the end read as zero.
    pub fn read_at(&self, offset: usize, len: usize) -> Vec<u8> {
        let data = self.0.lock();
        let mut out = vec![0; len];
        if offset < data.len() {
            let end = (offset + len).min(data.len());
            out[..end - offset].copy_from_slice(&data[offset..end]);
        }
        out
    }

    /// Overwrite bytes starting at `offset`, growing the block if needed
    pub fn write_at(&self, offset: usize, bytes: &[u8]) {
        let mut data = self.0.lock();
        if data.len() < offset + bytes.len() {
            data.resize(offset + bytes.len(), 0);
        }
        data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Replace the whole payload
    pub fn replace(&self, payload: &[u8]) {
        let mut data = self.0.lock();
        data.clear();
        data.extend_from_slice(payload);
    }

    /// True when both handles share one block
    pub fn ptr_eq(&self, other: &ValueBox) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Number of live holders of this block
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl std::fmt::Debug for ValueBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueBox").field("len", &self.len()).finish()
    }
}

// ============================================================================
// Field addresses
// ============================================================================

/// Base a field offset is applied to
#[derive(Debug, Clone)]
pub enum FieldBase {
    /// Instance field of a managed object; offset counts from the object base
    Object(ObjectRef),
    /// Instance field of a value-type payload held outside the managed heap;
    /// offset counts from the payload start
    Boxed(ValueBox),
    /// Static storage of a class
    Static(ClassRef),
}

/// Address of a live native field slot
#[derive(Debug, Clone)]
pub struct FieldAddress {
    /// Storage the offset is relative to
    pub base: FieldBase,
    /// Byte offset
    pub offset: usize,
}

// ============================================================================
// NativeStorage
// ============================================================================

/// What a script-side native-object proxy points at.
#[derive(Debug, Clone)]
pub enum NativeStorage {
    /// Managed object; the collector owns it
    Object(ObjectRef),
    /// Value-type payload owned by whoever holds the box
    Boxed(ValueBox),
    /// Value-type payload aliasing a live native field; not owned
    Field(FieldAddress),
}

impl NativeStorage {
    /// Whether the proxy holding this storage owns (and must free) it
    pub fn owns_payload(&self) -> bool {
        matches!(self, NativeStorage::Boxed(_))
    }

    /// Managed object pointer, if this storage is one
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            NativeStorage::Object(obj) => Some(*obj),
            _ => None,
        }
    }
}

/// A run of bytes inside a managed byte array, exposed to script without copying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRegion {
    /// Backing managed array
    pub array: ObjectRef,
    /// Number of valid bytes
    pub len: usize,
}

// ============================================================================
// ArgSlot
// ============================================================================

/// One element of the native argument array handed to `ManagedRuntime::invoke`.
///
/// By-reference parameters are mutated in place by the callee and read back
/// after the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgSlot {
    /// Value-type payload (primitives, structs, enums, nullable blocks)
    Value(Vec<u8>),
    /// Reference (or by-reference reference) slot; `None` is null
    Object(Option<ObjectRef>),
    /// Pointer to a value-type payload; `None` is a null pointer
    Pointer(Option<Vec<u8>>),
}

impl ArgSlot {
    /// Value payload, if this slot carries one
    pub fn value_bytes(&self) -> Option<&[u8]> {
        match self {
            ArgSlot::Value(bytes) => Some(bytes),
            ArgSlot::Pointer(Some(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Object reference, if this slot carries one
    pub fn object(&self) -> Option<ObjectRef> {
        match self {
            ArgSlot::Object(obj) => *obj,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_box_shares_block() {
        let a = ValueBox::zeroed(4);
        let b = a.clone();
        b.write_at(1, &[7, 8]);
        assert_eq!(a.snapshot(), vec![0, 7, 8, 0]);
        assert!(a.ptr_eq(&b));
        assert_eq!(a.holders(), 2);
    }

    #[test]
    fn test_value_box_read_past_end_is_zero() {
        let b = ValueBox::new(vec![1, 2]);
        assert_eq!(b.read_at(1, 3), vec![2, 0, 0]);
        assert_eq!(b.read_at(5, 2), vec![0, 0]);
    }

    #[test]
    fn test_ownership_flag() {
        let obj = ObjectRef::from_addr(0x10).unwrap();
        assert!(!NativeStorage::Object(obj).owns_payload());
        assert!(NativeStorage::Boxed(ValueBox::zeroed(1)).owns_payload());
        let alias = NativeStorage::Field(FieldAddress {
            base: FieldBase::Object(obj),
            offset: 16,
        });
        assert!(!alias.owns_payload());
    }
}
