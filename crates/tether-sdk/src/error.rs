//! Error types for the bridge

use crate::value::ScriptValue;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge error taxonomy.
///
/// A conversion that simply does not apply is not an error: it is reported as
/// `None`/`false` and drives overload fallback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Every candidate overload rejected the script arguments
    #[error("invalid arguments")]
    ArgumentMismatch,

    /// Constructor dispatch with no registered constructor
    #[error("no valid constructor is found")]
    NoConstructor,

    /// The native call raised; carries the exception's description
    #[error("{0}")]
    NativeFault(String),

    /// A required global type binding was never registered
    #[error("{0}")]
    Misconfiguration(String),

    /// Type metadata redirects more often than allowed
    #[error("type redirection limit ({limit}) exceeded at {type_name}")]
    RedirectLimit {
        /// Type where the walk stopped
        type_name: String,
        /// Configured bound
        limit: usize,
    },

    /// Invalid operation at the native boundary
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

/// Result of one dispatch, before it is translated into the script runtime's
/// thrown-error convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call ran; `None` for a `void` return
    Returned(Option<ScriptValue>),
    /// No overload matched
    ArgumentMismatch,
    /// The native call (or the bridge) failed with this description
    NativeFault(String),
}

impl CallOutcome {
    /// Fold a bridge result into an outcome
    pub fn from_result(result: BridgeResult<Option<ScriptValue>>) -> Self {
        match result {
            Ok(value) => CallOutcome::Returned(value),
            Err(BridgeError::ArgumentMismatch) => CallOutcome::ArgumentMismatch,
            Err(other) => CallOutcome::NativeFault(other.to_string()),
        }
    }

    /// Message to throw into the script runtime, if this outcome is a failure
    pub fn error_message(&self) -> Option<String> {
        match self {
            CallOutcome::Returned(_) => None,
            CallOutcome::ArgumentMismatch => Some(BridgeError::ArgumentMismatch.to_string()),
            CallOutcome::NativeFault(msg) => Some(msg.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_messages() {
        let mismatch = CallOutcome::from_result(Err(BridgeError::ArgumentMismatch));
        assert_eq!(mismatch, CallOutcome::ArgumentMismatch);
        assert_eq!(mismatch.error_message().as_deref(), Some("invalid arguments"));

        let fault = CallOutcome::from_result(Err(BridgeError::NativeFault("boom".into())));
        assert_eq!(fault.error_message().as_deref(), Some("boom"));

        let ok = CallOutcome::from_result(Ok(None));
        assert_eq!(ok, CallOutcome::Returned(None));
        assert!(ok.error_message().is_none());
    }

    #[test]
    fn test_misconfiguration_message() {
        let err = BridgeError::Misconfiguration("type of ArrayBuffer is null".into());
        assert_eq!(err.to_string(), "type of ArrayBuffer is null");
    }
}
