//! Opaque handles crossing the bridge
//!
//! Every handle here is a plain `Copy` word. The engine compares and stores
//! them but never dereferences them: script values are interpreted only by the
//! [`ScriptEnv`](crate::ScriptEnv), native pointers only by the
//! [`ManagedRuntime`](crate::ManagedRuntime).

use std::fmt;
use std::num::NonZeroUsize;

/// Opaque reference to a value owned by the script engine.
///
/// The bit pattern belongs to the script engine; conversion in and out is
/// zero-cost via `from_bits`/`to_bits`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ScriptValue(u64);

impl ScriptValue {
    /// Create from raw bits handed out by the script engine
    #[inline(always)]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Get the raw bits back
    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptValue({:#x})", self.0)
    }
}

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// Wrap a raw address. Returns `None` for null.
            #[inline]
            pub const fn from_addr(addr: usize) -> Option<Self> {
                match NonZeroUsize::new(addr) {
                    Some(nz) => Some(Self(nz)),
                    None => None,
                }
            }

            /// Raw address
            #[inline]
            pub const fn addr(self) -> usize {
                self.0.get()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.0.get())
            }
        }
    };
}

native_handle!(
    /// Pointer to a managed object. Identity equals the pointer; lifetime is
    /// owned by the managed collector.
    ObjectRef
);

native_handle!(
    /// Runtime class identity. Also used as the type id tagged on script-side
    /// native-object proxies.
    ClassRef
);

native_handle!(
    /// Native callable entry point (method pointer or generated trampoline).
    FunctionPtr
);

/// Stable identity of a script-side object, used as the persistent-object
/// table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptObjectId(pub u64);

/// A retained script handle that keeps its object alive until released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PersistentRef(pub u64);
