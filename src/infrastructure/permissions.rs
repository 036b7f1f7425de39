//! Platform permission checks and startup-resolved capabilities.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Platform permissions the orchestration layer may need. Which subset
/// applies is the permission service's concern; the engine only forwards
/// whatever comes back lacking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionId {
    /// iOS Bluetooth peripheral usage.
    BluetoothPeripheralUsage,
    /// Android fine location (pre-S scan requirement).
    AccessFineLocation,
    /// Android coarse location.
    AccessCoarseLocation,
    /// Android 12+ scan permission.
    BluetoothScan,
    /// Android 12+ connect permission.
    BluetoothConnect,
}

/// Result of a permission check or request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionReport {
    pub granted: Vec<PermissionId>,
    pub lacking: Vec<PermissionId>,
}

impl PermissionReport {
    pub fn all_granted(&self) -> bool {
        self.lacking.is_empty()
    }
}

/// Check/request the platform permission set. Implemented by platform glue;
/// tests script it.
#[async_trait]
pub trait PermissionService: Send + Sync {
    /// Report the current grant state without prompting the user.
    async fn check(&self) -> PermissionReport;

    /// Prompt for the given permissions and report the resulting state.
    async fn request(&self, permissions: &[PermissionId]) -> PermissionReport;
}

/// Platform behavior resolved once at startup, instead of platform-string
/// branching inside the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformCapabilities {
    /// Whether connect sequences include a platform bonding step.
    pub supports_bonding: bool,
}

impl PlatformCapabilities {
    pub fn android() -> Self {
        Self {
            supports_bonding: true,
        }
    }

    pub fn ios() -> Self {
        Self {
            supports_bonding: false,
        }
    }
}
