//! Bridge state and call sessions
//!
//! A [`Bridge`] owns the state that outlives a single call: configuration,
//! the synthesized-delegate cache and the persistent-object table. A
//! [`Session`] borrows it together with the two collaborators for the
//! duration of one callback.

use std::sync::Arc;

use tether_sdk::{
    BridgeError, BridgeResult, FieldAddress, FieldBase, ManagedRuntime, NativeStorage,
    ObjectRef, ScriptEnv, TypeDescriptor,
};

use crate::codec::PrimitiveCodec;
use crate::config::{self, BridgeConfig, SentinelTypes};
use crate::delegate::DelegateCache;
use crate::persistent::PersistentTable;
use crate::resolve::{self, Effective};

const REF_SIZE: usize = std::mem::size_of::<usize>();

/// Long-lived bridge state.
///
/// Shareable across threads; each script runtime drives it through its own
/// [`Session`]s.
pub struct Bridge {
    config: Arc<BridgeConfig>,
    codec: PrimitiveCodec,
    delegates: DelegateCache,
    persistent: PersistentTable,
}

impl Bridge {
    /// Create a bridge over `config`
    pub fn new(config: Arc<BridgeConfig>) -> Self {
        let codec = PrimitiveCodec::new(config.options.pointer_width);
        tracing::debug!(
            pointer_width = ?config.options.pointer_width,
            max_type_redirects = config.options.max_type_redirects,
            "bridge created"
        );
        Self {
            config,
            codec,
            delegates: DelegateCache::new(),
            persistent: PersistentTable::new(),
        }
    }

    /// Create a bridge over the process-wide configuration
    pub fn from_global() -> BridgeResult<Self> {
        let config = config::global().ok_or_else(|| {
            BridgeError::Misconfiguration("bridge configuration is not installed".into())
        })?;
        Ok(Self::new(config))
    }

    /// Configuration in effect
    pub fn config(&self) -> &Arc<BridgeConfig> {
        &self.config
    }

    /// Scalar codec for the configured pointer width
    pub fn codec(&self) -> PrimitiveCodec {
        self.codec
    }

    /// Synthesized delegate methods
    pub fn delegates(&self) -> &DelegateCache {
        &self.delegates
    }

    /// Script object ↔ native wrapper pairings
    pub fn persistent(&self) -> &PersistentTable {
        &self.persistent
    }

    /// Borrow the bridge for one call between `rt` and `env`
    pub fn session<'a>(
        &'a self,
        rt: &'a dyn ManagedRuntime,
        env: &'a dyn ScriptEnv,
    ) -> Session<'a> {
        Session { bridge: self, rt, env }
    }
}

/// One callback's view of the bridge and its collaborators
#[derive(Clone, Copy)]
pub struct Session<'a> {
    pub(crate) bridge: &'a Bridge,
    pub(crate) rt: &'a dyn ManagedRuntime,
    pub(crate) env: &'a dyn ScriptEnv,
}

impl<'a> Session<'a> {
    /// Bridge state
    pub fn bridge(&self) -> &'a Bridge {
        self.bridge
    }

    /// Managed runtime
    pub fn runtime(&self) -> &'a dyn ManagedRuntime {
        self.rt
    }

    /// Script engine
    pub fn env(&self) -> &'a dyn ScriptEnv {
        self.env
    }

    pub(crate) fn codec(&self) -> PrimitiveCodec {
        self.bridge.codec
    }

    pub(crate) fn sentinels(&self) -> &'a SentinelTypes {
        &self.bridge.config.sentinels
    }

    pub(crate) fn effective(&self, ty: &TypeDescriptor) -> BridgeResult<Effective> {
        resolve::effective_kind(ty, self.bridge.config.options.max_type_redirects)
    }

    pub(crate) fn primitive_tag(
        &self,
        ty: &TypeDescriptor,
    ) -> BridgeResult<Option<tether_sdk::PrimitiveTag>> {
        resolve::primitive_tag(ty, self.bridge.config.options.max_type_redirects)
    }

    // ========================================================================
    // Raw storage access
    // ========================================================================

    /// `size` payload bytes of whatever `storage` points at
    pub(crate) fn payload_of(&self, storage: &NativeStorage, size: usize) -> Vec<u8> {
        match storage {
            NativeStorage::Boxed(b) => b.read_at(0, size),
            NativeStorage::Field(at) => self.load(at, size),
            NativeStorage::Object(obj) => fit(self.rt.unbox(*obj), size),
        }
    }

    pub(crate) fn load(&self, at: &FieldAddress, len: usize) -> Vec<u8> {
        match &at.base {
            FieldBase::Boxed(b) => b.read_at(at.offset, len),
            _ => self.rt.load_bytes(at, len),
        }
    }

    pub(crate) fn store(&self, at: &FieldAddress, bytes: &[u8]) {
        match &at.base {
            FieldBase::Boxed(b) => b.write_at(at.offset, bytes),
            _ => self.rt.store_bytes(at, bytes),
        }
    }

    pub(crate) fn load_ref(&self, at: &FieldAddress) -> Option<ObjectRef> {
        match &at.base {
            FieldBase::Boxed(b) => {
                let mut raw = [0u8; REF_SIZE];
                raw.copy_from_slice(&b.read_at(at.offset, REF_SIZE));
                ObjectRef::from_addr(usize::from_le_bytes(raw))
            }
            _ => self.rt.load_ref(at),
        }
    }

    pub(crate) fn store_ref(&self, at: &FieldAddress, item: Option<ObjectRef>) {
        match &at.base {
            FieldBase::Boxed(b) => {
                let addr = item.map(ObjectRef::addr).unwrap_or(0);
                b.write_at(at.offset, &addr.to_le_bytes());
            }
            _ => self.rt.store_ref(at, item),
        }
    }
}

/// Truncate or zero-extend `bytes` to exactly `size`
pub(crate) fn fit(mut bytes: Vec<u8>, size: usize) -> Vec<u8> {
    bytes.resize(size, 0);
    bytes
}
