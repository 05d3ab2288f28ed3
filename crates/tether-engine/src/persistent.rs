//! Persistent-object table
//!
//! Pairs a plain script object with the native wrapper that stands for it on
//! the managed side. The pairing is bidirectional and stable: the same script
//! object always maps to the same wrapper until the wrapper is finalized.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tether_sdk::{ObjectRef, PersistentRef, ScriptObjectId};

/// One pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentObjectInfo {
    /// Native wrapper instance
    pub native: ObjectRef,
    /// Retained script handle
    pub handle: PersistentRef,
}

#[derive(Default)]
struct Pairings {
    by_script: FxHashMap<ScriptObjectId, PersistentObjectInfo>,
    by_native: FxHashMap<ObjectRef, ScriptObjectId>,
}

/// Script object ↔ native wrapper table
#[derive(Default)]
pub struct PersistentTable {
    inner: Mutex<Pairings>,
}

impl PersistentTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrapper paired with a script object
    pub fn native_for(&self, id: ScriptObjectId) -> Option<ObjectRef> {
        self.inner.lock().by_script.get(&id).map(|info| info.native)
    }

    /// Script handle paired with a wrapper
    pub fn handle_for(&self, native: ObjectRef) -> Option<PersistentRef> {
        let inner = self.inner.lock();
        let id = inner.by_native.get(&native)?;
        inner.by_script.get(id).map(|info| info.handle)
    }

    /// Record a pairing unless one exists for `id`; returns the pairing in
    /// effect afterwards
    pub fn pair(&self, id: ScriptObjectId, info: PersistentObjectInfo) -> PersistentObjectInfo {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner.by_script.get(&id) {
            return *existing;
        }
        inner.by_script.insert(id, info);
        inner.by_native.insert(info.native, id);
        info
    }

    /// Drop the pairing of a finalized wrapper
    pub fn remove_native(&self, native: ObjectRef) -> Option<PersistentObjectInfo> {
        let mut inner = self.inner.lock();
        let id = inner.by_native.remove(&native)?;
        inner.by_script.remove(&id)
    }

    /// Number of live pairings
    pub fn len(&self) -> usize {
        self.inner.lock().by_script.len()
    }

    /// No live pairings
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
