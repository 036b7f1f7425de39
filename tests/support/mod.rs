//! Scripted fakes standing in for the native binding and the platform
//! permission service.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use bluevery::{
    Advertisement, BleBinding, BleError, BleEvent, DiscoveredPeripheral, PeripheralId,
    PermissionId, PermissionReport, PermissionService,
};

/// A native call as recorded by [`FakeBinding`], in invocation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start,
    Scan,
    StopScan,
    Connect(PeripheralId),
    CreateBond(PeripheralId),
    RetrieveServices(PeripheralId),
    Read(PeripheralId),
    Write(PeripheralId, Vec<u8>),
    StartNotification(PeripheralId),
    StopNotification(PeripheralId),
}

pub struct FakeBinding {
    pub calls: Mutex<Vec<Call>>,
    /// Paused-clock timestamps of each native scan invocation.
    pub scan_times: Mutex<Vec<tokio::time::Instant>>,
    events_tx: broadcast::Sender<BleEvent>,

    pub adapter_enabled: Mutex<bool>,
    pub connected: Mutex<Vec<PeripheralId>>,
    pub bonded: Mutex<Vec<PeripheralId>>,
    pub read_result: Mutex<Vec<u8>>,
    /// Discoveries emitted by each native scan call.
    pub discover_on_scan: Mutex<Vec<DiscoveredPeripheral>>,
    /// First scan call (1-based) that actually emits the discoveries.
    pub discover_after_scans: Mutex<u32>,

    pub fail_start: Mutex<Option<BleError>>,
    pub fail_scan: Mutex<Option<BleError>>,
    pub fail_connect: Mutex<Option<BleError>>,
    pub fail_retrieve: Mutex<Option<BleError>>,
    pub fail_write: Mutex<Option<BleError>>,
    pub fail_read: Mutex<Option<BleError>>,
    pub fail_start_notification: Mutex<Option<BleError>>,
    pub fail_stop_notification: Mutex<Option<BleError>>,
}

impl FakeBinding {
    pub fn new() -> Arc<Self> {
        let (events_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            scan_times: Mutex::new(Vec::new()),
            events_tx,
            adapter_enabled: Mutex::new(true),
            connected: Mutex::new(Vec::new()),
            bonded: Mutex::new(Vec::new()),
            read_result: Mutex::new(Vec::new()),
            discover_on_scan: Mutex::new(Vec::new()),
            discover_after_scans: Mutex::new(1),
            fail_start: Mutex::new(None),
            fail_scan: Mutex::new(None),
            fail_connect: Mutex::new(None),
            fail_retrieve: Mutex::new(None),
            fail_write: Mutex::new(None),
            fail_read: Mutex::new(None),
            fail_start_notification: Mutex::new(None),
            fail_stop_notification: Mutex::new(None),
        })
    }

    pub fn emit(&self, event: BleEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn scan_call_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, Call::Scan))
            .count()
    }

    pub fn has_call(&self, call: &Call) -> bool {
        self.calls.lock().contains(call)
    }
}

#[async_trait]
impl BleBinding for FakeBinding {
    async fn start(&self) -> Result<(), BleError> {
        self.calls.lock().push(Call::Start);
        match self.fail_start.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn scan(
        &self,
        _service_uuids: &[Uuid],
        _duration: Duration,
        _allow_duplicates: bool,
    ) -> Result<(), BleError> {
        self.calls.lock().push(Call::Scan);
        self.scan_times.lock().push(tokio::time::Instant::now());
        let scan_number = self.scan_call_count() as u32;
        if scan_number >= *self.discover_after_scans.lock() {
            for discovered in self.discover_on_scan.lock().iter().cloned() {
                let _ = self.events_tx.send(BleEvent::Discover(discovered));
            }
        }
        match self.fail_scan.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.calls.lock().push(Call::StopScan);
        Ok(())
    }

    async fn connect(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.calls.lock().push(Call::Connect(id.clone()));
        // Yield so state observers can see the in-flight phase.
        tokio::time::sleep(Duration::from_millis(1)).await;
        match self.fail_connect.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn create_bond(&self, id: &PeripheralId, _pin: Option<&str>) -> Result<(), BleError> {
        self.calls.lock().push(Call::CreateBond(id.clone()));
        Ok(())
    }

    async fn retrieve_services(
        &self,
        id: &PeripheralId,
        _service_uuids: &[Uuid],
    ) -> Result<(), BleError> {
        self.calls.lock().push(Call::RetrieveServices(id.clone()));
        match self.fail_retrieve.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn read(
        &self,
        id: &PeripheralId,
        _service_uuid: Uuid,
        _characteristic_uuid: Uuid,
    ) -> Result<Vec<u8>, BleError> {
        self.calls.lock().push(Call::Read(id.clone()));
        match self.fail_read.lock().clone() {
            Some(err) => Err(err),
            None => Ok(self.read_result.lock().clone()),
        }
    }

    async fn write(
        &self,
        id: &PeripheralId,
        _service_uuid: Uuid,
        _characteristic_uuid: Uuid,
        value: &[u8],
    ) -> Result<(), BleError> {
        self.calls.lock().push(Call::Write(id.clone(), value.to_vec()));
        match self.fail_write.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn start_notification(
        &self,
        id: &PeripheralId,
        _service_uuid: Uuid,
        _characteristic_uuid: Uuid,
    ) -> Result<(), BleError> {
        self.calls.lock().push(Call::StartNotification(id.clone()));
        match self.fail_start_notification.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn stop_notification(
        &self,
        id: &PeripheralId,
        _service_uuid: Uuid,
        _characteristic_uuid: Uuid,
    ) -> Result<(), BleError> {
        self.calls.lock().push(Call::StopNotification(id.clone()));
        match self.fail_stop_notification.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn is_peripheral_connected(&self, id: &PeripheralId) -> Result<bool, BleError> {
        Ok(self.connected.lock().contains(id))
    }

    async fn connected_peripherals(&self) -> Result<Vec<PeripheralId>, BleError> {
        Ok(self.connected.lock().clone())
    }

    async fn bonded_peripherals(&self) -> Result<Vec<PeripheralId>, BleError> {
        Ok(self.bonded.lock().clone())
    }

    async fn is_adapter_enabled(&self) -> Result<bool, BleError> {
        Ok(*self.adapter_enabled.lock())
    }

    fn events(&self) -> broadcast::Receiver<BleEvent> {
        self.events_tx.subscribe()
    }
}

pub struct FakePermissions {
    /// What `check` reports as lacking.
    pub lacking_on_check: Mutex<Vec<PermissionId>>,
    /// Whether a `request` grants everything asked for.
    pub grant_on_request: Mutex<bool>,
}

impl FakePermissions {
    pub fn granted() -> Arc<Self> {
        Arc::new(Self {
            lacking_on_check: Mutex::new(Vec::new()),
            grant_on_request: Mutex::new(true),
        })
    }

    pub fn denying(lacking: Vec<PermissionId>) -> Arc<Self> {
        Arc::new(Self {
            lacking_on_check: Mutex::new(lacking),
            grant_on_request: Mutex::new(false),
        })
    }
}

#[async_trait]
impl PermissionService for FakePermissions {
    async fn check(&self) -> PermissionReport {
        let lacking = self.lacking_on_check.lock().clone();
        PermissionReport {
            granted: Vec::new(),
            lacking,
        }
    }

    async fn request(&self, permissions: &[PermissionId]) -> PermissionReport {
        if *self.grant_on_request.lock() {
            self.lacking_on_check.lock().clear();
            PermissionReport {
                granted: permissions.to_vec(),
                lacking: Vec::new(),
            }
        } else {
            PermissionReport {
                granted: Vec::new(),
                lacking: permissions.to_vec(),
            }
        }
    }
}

/// A discovery payload for scripting scans.
pub fn discovered(id: &str, name: Option<&str>, rssi: i16) -> DiscoveredPeripheral {
    DiscoveredPeripheral {
        id: PeripheralId::from(id),
        name: name.map(|n| n.to_string()),
        rssi: Some(rssi),
        advertisement: Advertisement::default(),
    }
}
