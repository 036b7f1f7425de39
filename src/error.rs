//! Error taxonomy for orchestration failures.
//!
//! Permission and adapter-power preconditions are *not* reported through these
//! variants at call sites: the engine records them in the state snapshot and
//! returns a soft `false`. Everything else is a hard failure that callers are
//! expected to catch and present.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All failures surfaced by the orchestration layer.
///
/// Variants carry owned strings rather than error sources so that a value can
/// be stored in the state snapshot (`last_error`) and serialized for UI
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum BleError {
    /// A wrapped operation did not complete within its deadline.
    #[error("operation timed out: {message}")]
    Timeout { message: String },

    /// A cancelable operation was canceled through its handle.
    #[error("operation canceled")]
    Canceled,

    /// Connect was asked for an id that never appeared in a scan.
    #[error("peripheral not found in scan results: {id}")]
    PeripheralNotFound { id: String },

    /// A managed-only operation (read/write/notify) was asked for an id that
    /// is not under lifecycle management.
    #[error("peripheral not managed: {id}")]
    PeripheralNotManaged { id: String },

    /// Recorded in the snapshot when a permission request leaves gaps.
    #[error("required permissions not granted: {lacking:?}")]
    PermissionDenied { lacking: Vec<String> },

    /// Recorded in the snapshot when the adapter is powered off.
    #[error("bluetooth adapter is disabled")]
    AdapterDisabled,

    /// The native adapter stack could not be started.
    #[error("failed to start the native adapter stack: {reason}")]
    AdapterStartFailed { reason: String },

    /// Any rejection coming out of the native binding, wrapped so callers
    /// always see a real error value.
    #[error("native {operation} failed: {reason}")]
    Binding { operation: String, reason: String },
}

impl BleError {
    /// Wrap a native-binding rejection for the given operation name.
    pub fn binding(operation: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Binding {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the soft-fail variants that are surfaced via state flags.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::AdapterDisabled
        )
    }
}
