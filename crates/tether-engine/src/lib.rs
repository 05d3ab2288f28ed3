//! Tether engine - value and call bridge between a managed runtime and a
//! script engine
//!
//! A script call on a registered native member arrives as a [`CallFrame`]
//! plus the member's overloads. A [`Session`] picks the overload whose
//! parameters accept the arguments, marshals them into native slots, invokes
//! through the [`ManagedRuntime`], writes by-reference results back and
//! converts the return value into a [`ScriptEnv`] value.
//!
//! ```ignore
//! let bridge = Bridge::new(Arc::new(config));
//! let session = bridge.session(&runtime, &script);
//! session.method_callback(&overloads, &mut frame);
//! ```
//!
//! [`CallFrame`]: tether_sdk::CallFrame
//! [`ManagedRuntime`]: tether_sdk::ManagedRuntime
//! [`ScriptEnv`]: tether_sdk::ScriptEnv

#![warn(missing_docs)]

pub mod bridge;
pub mod codec;
pub mod config;
pub mod delegate;
pub mod dispatch;
pub mod field;
pub mod identity;
pub mod marshal;
pub mod matcher;
pub mod persistent;
pub mod resolve;
pub mod transcode;

pub use bridge::{Bridge, Session};
pub use codec::{NativeScalar, PrimitiveCodec};
pub use config::{BridgeConfig, BridgeOptions, ConfigError, SentinelTypes};
pub use delegate::DelegateCache;
pub use dispatch::ConstructorSet;
pub use marshal::UNKNOWN_EXCEPTION;
pub use persistent::{PersistentObjectInfo, PersistentTable};
pub use resolve::Effective;
