//! Core state model for the orchestration layer.
//!
//! Everything the UI needs to render lives in [`BleState`]: adapter-wide
//! flags, the peripherals seen by the current scan cycle, and the lifecycle
//! fields of every peripheral under management. Snapshots are shared as
//! `Arc<BleState>` so subscribers can diff cheaply between notifications.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BleError;
use crate::infrastructure::permissions::PermissionId;

/// Display name used when a device advertises no local name.
pub const DEFAULT_PERIPHERAL_NAME: &str = "Unknown";

/// Native identifier of a peripheral (MAC string on Android, CoreBluetooth
/// UUID string on iOS). Treated as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeripheralId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PeripheralId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Advertising payload captured at discovery time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    #[serde(default)]
    pub service_uuids: Vec<Uuid>,
    #[serde(default)]
    pub manufacturer_data: Option<Vec<u8>>,
    #[serde(default)]
    pub tx_power: Option<i8>,
    #[serde(default)]
    pub is_connectable: Option<bool>,
}

/// A discovered-but-unmanaged peripheral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralSummary {
    pub id: PeripheralId,
    pub name: String,
    pub rssi: Option<i16>,
    pub advertisement: Advertisement,
}

impl PeripheralSummary {
    /// Build a summary from raw advertising data, defaulting the display name
    /// when the device reports none.
    pub fn from_advertising(
        id: PeripheralId,
        name: Option<String>,
        rssi: Option<i16>,
        advertisement: Advertisement,
    ) -> Self {
        let name = match name {
            Some(n) if !n.is_empty() => n,
            _ => DEFAULT_PERIPHERAL_NAME.to_string(),
        };
        Self {
            id,
            name,
            rssi,
            advertisement,
        }
    }
}

/// Connect lifecycle of a managed peripheral. One-directional per attempt:
/// `Connecting` then either `Connected` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectPhase {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

/// Service-discovery lifecycle of a managed peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RetrievePhase {
    Retrieving,
    Retrieved,
    Failed,
}

/// Characteristic I/O state of a managed peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommunicatePhase {
    Reading,
    Writing,
    NonCommunicate,
}

/// A peripheral under active lifecycle management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralInfo {
    pub id: PeripheralId,
    pub name: String,
    pub rssi: Option<i16>,
    pub advertisement: Advertisement,
    #[serde(default)]
    pub connect: Option<ConnectPhase>,
    #[serde(default)]
    pub bonded: Option<bool>,
    #[serde(default)]
    pub retrieve_services: Option<RetrievePhase>,
    #[serde(default)]
    pub communicate: Option<CommunicatePhase>,
    #[serde(default)]
    pub receiving_for_characteristic_value: Option<bool>,
}

impl From<PeripheralSummary> for PeripheralInfo {
    fn from(summary: PeripheralSummary) -> Self {
        Self {
            id: summary.id,
            name: summary.name,
            rssi: summary.rssi,
            advertisement: summary.advertisement,
            connect: None,
            bonded: None,
            retrieve_services: None,
            communicate: None,
            receiving_for_characteristic_value: None,
        }
    }
}

/// Outcome of the platform permission check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "lacking")]
pub enum PermissionStatus {
    Granted,
    Ungranted(Vec<PermissionId>),
    Unknown,
}

/// The authoritative adapter-wide snapshot. Single instance per session,
/// mutated only through the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BleState {
    pub bluetooth_enabled: bool,
    pub permission_status: PermissionStatus,
    /// Whether the native adapter stack has been started.
    pub managing: bool,
    pub scanning: bool,
    /// Peripherals seen by the current scan cycle. First write per id wins.
    pub scanned_peripherals: HashMap<PeripheralId, PeripheralSummary>,
    pub managing_peripherals: HashMap<PeripheralId, PeripheralInfo>,
    pub last_error: Option<BleError>,
}

impl Default for BleState {
    fn default() -> Self {
        Self {
            bluetooth_enabled: false,
            permission_status: PermissionStatus::Unknown,
            managing: false,
            scanning: false,
            scanned_peripherals: HashMap::new(),
            managing_peripherals: HashMap::new(),
            last_error: None,
        }
    }
}
