//! Narrow seam to the native BLE binding.
//!
//! The orchestration layer never talks to platform Bluetooth APIs directly;
//! it consumes this trait plus the event stream it exposes. Platform glue
//! (or a scripted fake in tests) implements it.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::models::{Advertisement, PeripheralId};
use crate::error::BleError;

/// Raw discovery data as reported by the native side. Name defaulting and
/// first-write-wins recording happen in the engine, not here.
#[derive(Debug, Clone)]
pub struct DiscoveredPeripheral {
    pub id: PeripheralId,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    pub advertisement: Advertisement,
}

/// Events emitted by the native binding.
#[derive(Debug, Clone)]
pub enum BleEvent {
    /// A peripheral was seen during a scan.
    Discover(DiscoveredPeripheral),
    /// A previously connected peripheral dropped the link.
    Disconnect { id: PeripheralId },
    /// A notifying characteristic delivered a value.
    CharacteristicValueUpdate {
        id: PeripheralId,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        value: Vec<u8>,
    },
    /// The adapter power state changed.
    AdapterStateChange { powered: bool },
}

/// The native BLE primitives consumed by the orchestration engine.
///
/// Implementations must be cheap to share (`Arc<dyn BleBinding>`); every
/// method maps one-to-one onto a native module call and reports failure as a
/// [`BleError::Binding`] (or a more specific variant when one applies).
#[async_trait]
pub trait BleBinding: Send + Sync {
    /// Start the native adapter stack. Called once per session before any
    /// other operation.
    async fn start(&self) -> Result<(), BleError>;

    /// Begin advertising discovery. The native side stops by itself after
    /// `duration`, but the engine also issues [`stop_scan`](Self::stop_scan)
    /// when it cleans up.
    async fn scan(
        &self,
        service_uuids: &[Uuid],
        duration: Duration,
        allow_duplicates: bool,
    ) -> Result<(), BleError>;

    async fn stop_scan(&self) -> Result<(), BleError>;

    async fn connect(&self, id: &PeripheralId) -> Result<(), BleError>;

    /// Platform pairing. Only issued when the resolved capabilities report
    /// bonding support.
    async fn create_bond(&self, id: &PeripheralId, pin: Option<&str>) -> Result<(), BleError>;

    /// GATT service discovery. An empty `service_uuids` slice means "all".
    async fn retrieve_services(
        &self,
        id: &PeripheralId,
        service_uuids: &[Uuid],
    ) -> Result<(), BleError>;

    async fn read(
        &self,
        id: &PeripheralId,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Vec<u8>, BleError>;

    async fn write(
        &self,
        id: &PeripheralId,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        value: &[u8],
    ) -> Result<(), BleError>;

    async fn start_notification(
        &self,
        id: &PeripheralId,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<(), BleError>;

    async fn stop_notification(
        &self,
        id: &PeripheralId,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<(), BleError>;

    async fn is_peripheral_connected(&self, id: &PeripheralId) -> Result<bool, BleError>;

    async fn connected_peripherals(&self) -> Result<Vec<PeripheralId>, BleError>;

    /// Peripherals the platform reports as bonded. Meaningful only where
    /// bonding is supported; other platforms return an empty list.
    async fn bonded_peripherals(&self) -> Result<Vec<PeripheralId>, BleError>;

    async fn is_adapter_enabled(&self) -> Result<bool, BleError>;

    /// Subscribe to the native event stream. Each call returns an
    /// independent receiver positioned at the current tail.
    fn events(&self) -> broadcast::Receiver<BleEvent>;
}
