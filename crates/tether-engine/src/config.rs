//! Bridge configuration
//!
//! Two parts: tunable [`BridgeOptions`] (deserializable from TOML) and the
//! [`SentinelTypes`] the embedding registers once during initialization.
//! Both are frozen into a [`BridgeConfig`] and shared by `Arc`.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use tether_sdk::{BridgeError, BridgeResult, ClassRef, PointerWidth};

/// Default bound on enum/generic redirections while resolving a type
pub const DEFAULT_MAX_TYPE_REDIRECTS: usize = 4;

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML could not be parsed
    #[error("failed to parse bridge options: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed, but a value is out of range
    #[error("invalid bridge option: {0}")]
    Invalid(String),
}

/// Tunable bridge behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeOptions {
    /// Width of `IntPtr`/`UIntPtr`
    pub pointer_width: PointerWidth,
    /// Bound on enum/generic-instantiation redirections per type
    pub max_type_redirects: usize,
    /// Run the argument matcher even for single-candidate member sets
    pub always_check_arguments: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            pointer_width: PointerWidth::default(),
            max_type_redirects: DEFAULT_MAX_TYPE_REDIRECTS,
            always_check_arguments: false,
        }
    }
}

impl BridgeOptions {
    /// Parse options from a TOML document
    ///
    /// ```toml
    /// pointer_width = "64"
    /// max_type_redirects = 8
    /// ```
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let options: BridgeOptions = toml::from_str(source)?;
        if options.max_type_redirects == 0 {
            return Err(ConfigError::Invalid(
                "max_type_redirects must be at least 1".to_string(),
            ));
        }
        Ok(options)
    }
}

// ============================================================================
// Sentinel types
// ============================================================================

/// Native types recognized by identity for special-cased conversion.
///
/// Each slot can be set once. Reading a slot that was never set is a
/// misconfiguration, reported where the type is first needed.
#[derive(Debug, Default)]
pub struct SentinelTypes {
    persistent_object: OnceCell<ClassRef>,
    binary_buffer: OnceCell<ClassRef>,
    typed_value: OnceCell<ClassRef>,
}

fn set_once(slot: &OnceCell<ClassRef>, class: ClassRef, name: &str) -> BridgeResult<()> {
    slot.set(class).map_err(|_| {
        BridgeError::Misconfiguration(format!("type of {} is already registered", name))
    })
}

fn require(slot: &OnceCell<ClassRef>, name: &str) -> BridgeResult<ClassRef> {
    slot.get().copied().ok_or_else(|| {
        tracing::warn!(sentinel = name, "sentinel type used before registration");
        BridgeError::Misconfiguration(format!("type of {} is null", name))
    })
}

impl SentinelTypes {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the persistent-object wrapper type
    pub fn set_persistent_object(&self, class: ClassRef) -> BridgeResult<()> {
        set_once(&self.persistent_object, class, "PersistentObject")
    }

    /// Register the binary-buffer type
    pub fn set_binary_buffer(&self, class: ClassRef) -> BridgeResult<()> {
        set_once(&self.binary_buffer, class, "BinaryBuffer")
    }

    /// Register the typed-value wrapper type
    pub fn set_typed_value(&self, class: ClassRef) -> BridgeResult<()> {
        set_once(&self.typed_value, class, "TypedValue")
    }

    /// Persistent-object type, required
    pub fn persistent_object(&self) -> BridgeResult<ClassRef> {
        require(&self.persistent_object, "PersistentObject")
    }

    /// Binary-buffer type, required
    pub fn binary_buffer(&self) -> BridgeResult<ClassRef> {
        require(&self.binary_buffer, "BinaryBuffer")
    }

    /// Persistent-object type if registered (identity checks only)
    pub fn persistent_object_opt(&self) -> Option<ClassRef> {
        self.persistent_object.get().copied()
    }

    /// Binary-buffer type if registered (identity checks only)
    pub fn binary_buffer_opt(&self) -> Option<ClassRef> {
        self.binary_buffer.get().copied()
    }

    /// Typed-value type if registered; it is optional
    pub fn typed_value_opt(&self) -> Option<ClassRef> {
        self.typed_value.get().copied()
    }
}

// ============================================================================
// BridgeConfig
// ============================================================================

/// Frozen configuration handed to [`Bridge::new`](crate::Bridge::new)
#[derive(Debug, Default)]
pub struct BridgeConfig {
    /// Tunables
    pub options: BridgeOptions,
    /// Sentinel type registrations
    pub sentinels: SentinelTypes,
}

impl BridgeConfig {
    /// Configuration with the given options and no sentinels yet
    pub fn new(options: BridgeOptions) -> Self {
        Self {
            options,
            sentinels: SentinelTypes::new(),
        }
    }

    /// Register all three sentinels at once
    pub fn with_sentinels(
        self,
        persistent_object: ClassRef,
        binary_buffer: ClassRef,
        typed_value: Option<ClassRef>,
    ) -> BridgeResult<Self> {
        self.sentinels.set_persistent_object(persistent_object)?;
        self.sentinels.set_binary_buffer(binary_buffer)?;
        if let Some(class) = typed_value {
            self.sentinels.set_typed_value(class)?;
        }
        Ok(self)
    }
}

static GLOBAL_CONFIG: OnceCell<Arc<BridgeConfig>> = OnceCell::new();

/// Install the process-wide configuration. Fails if one is already installed.
pub fn install(config: BridgeConfig) -> BridgeResult<Arc<BridgeConfig>> {
    let config = Arc::new(config);
    GLOBAL_CONFIG
        .set(config.clone())
        .map_err(|_| BridgeError::Misconfiguration("bridge configuration already installed".into()))?;
    Ok(config)
}

/// The process-wide configuration, if installed
pub fn global() -> Option<Arc<BridgeConfig>> {
    GLOBAL_CONFIG.get().cloned()
}
