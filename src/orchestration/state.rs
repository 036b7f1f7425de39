//! The authoritative state store.
//!
//! All mutation of [`BleState`] goes through the methods here; each mutator
//! publishes exactly one new snapshot, synchronously, after the mutation
//! completes. Snapshots are `Arc`-shared so subscribers diff by pointer or
//! by field without copying the maps.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::domain::models::{
    BleState, CommunicatePhase, ConnectPhase, PeripheralId, PeripheralInfo, PeripheralSummary,
    PermissionStatus, RetrievePhase,
};
use crate::error::BleError;
use crate::infrastructure::permissions::PermissionId;

struct Inner {
    current: BleState,
    /// Snapshot restored by `reset_state`. Rebased by `re_init_state`.
    baseline: BleState,
}

pub struct StateStore {
    inner: Mutex<Inner>,
    tx: watch::Sender<Arc<BleState>>,
}

impl StateStore {
    pub fn new(initial: BleState) -> Self {
        let (tx, _) = watch::channel(Arc::new(initial.clone()));
        Self {
            inner: Mutex::new(Inner {
                current: initial.clone(),
                baseline: initial,
            }),
            tx,
        }
    }

    /// Latest published snapshot. Callers must treat it as read-only.
    pub fn state(&self) -> Arc<BleState> {
        self.tx.borrow().clone()
    }

    /// Watch for snapshot changes; the receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BleState>> {
        self.tx.subscribe()
    }

    pub fn is_managed(&self, id: &PeripheralId) -> bool {
        self.inner.lock().current.managing_peripherals.contains_key(id)
    }

    fn mutate(&self, f: impl FnOnce(&mut BleState)) {
        let mut inner = self.inner.lock();
        f(&mut inner.current);
        self.tx.send_replace(Arc::new(inner.current.clone()));
    }

    fn mutate_managed(
        &self,
        id: &PeripheralId,
        f: impl FnOnce(&mut PeripheralInfo),
    ) -> Result<(), BleError> {
        let mut inner = self.inner.lock();
        match inner.current.managing_peripherals.get_mut(id) {
            Some(info) => f(info),
            None => {
                return Err(BleError::PeripheralNotManaged {
                    id: id.to_string(),
                })
            }
        }
        self.tx.send_replace(Arc::new(inner.current.clone()));
        Ok(())
    }

    pub fn on_managing(&self) {
        self.mutate(|state| state.managing = true);
    }

    pub fn on_scanning(&self) {
        self.mutate(|state| state.scanning = true);
    }

    pub fn off_scanning(&self) {
        self.mutate(|state| state.scanning = false);
    }

    pub fn set_bluetooth_enabled(&self) {
        self.mutate(|state| state.bluetooth_enabled = true);
    }

    pub fn set_bluetooth_disabled(&self) {
        self.mutate(|state| state.bluetooth_enabled = false);
    }

    pub fn set_permission_granted(&self) {
        self.mutate(|state| state.permission_status = PermissionStatus::Granted);
    }

    pub fn set_permission_ungranted(&self, lacking: Vec<PermissionId>) {
        self.mutate(|state| state.permission_status = PermissionStatus::Ungranted(lacking));
    }

    /// Record a discovery. First write per id wins; later discoveries of the
    /// same id never overwrite the stored summary.
    pub fn set_peripheral_to_scanned(&self, summary: PeripheralSummary) {
        self.mutate(|state| {
            state
                .scanned_peripherals
                .entry(summary.id.clone())
                .or_insert(summary);
        });
    }

    /// Drop every scanned entry; run at the start of a fresh scan cycle.
    pub fn clear_scanned_peripherals(&self) {
        self.mutate(|state| state.scanned_peripherals.clear());
    }

    /// Upsert a peripheral under lifecycle management, overwriting any
    /// existing entry.
    pub fn set_peripheral_to_managing(&self, info: PeripheralInfo) {
        self.mutate(|state| {
            state.managing_peripherals.insert(info.id.clone(), info);
        });
    }

    pub fn delete_peripheral_from_managing(&self, id: &PeripheralId) {
        self.mutate(|state| {
            state.managing_peripherals.remove(id);
        });
    }

    /// Entry point of the connect lifecycle: creates the managed entry from
    /// the scanned summary when absent, then marks it `Connecting`.
    pub fn set_managing_peripheral_connecting(&self, summary: &PeripheralSummary) {
        self.mutate(|state| {
            let info = state
                .managing_peripherals
                .entry(summary.id.clone())
                .or_insert_with(|| PeripheralInfo::from(summary.clone()));
            info.connect = Some(ConnectPhase::Connecting);
        });
    }

    pub fn set_managing_peripheral_connected(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.mutate_managed(id, |info| info.connect = Some(ConnectPhase::Connected))
    }

    pub fn set_managing_peripheral_disconnected(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.mutate_managed(id, |info| info.connect = Some(ConnectPhase::Disconnected))
    }

    pub fn set_managing_peripheral_failed_connect(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.mutate_managed(id, |info| info.connect = Some(ConnectPhase::Failed))
    }

    pub fn set_managing_peripheral_retrieving(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.mutate_managed(id, |info| {
            info.retrieve_services = Some(RetrievePhase::Retrieving)
        })
    }

    pub fn set_managing_peripheral_retrieved(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.mutate_managed(id, |info| {
            info.retrieve_services = Some(RetrievePhase::Retrieved)
        })
    }

    pub fn set_managing_peripheral_retrieve_failed(
        &self,
        id: &PeripheralId,
    ) -> Result<(), BleError> {
        self.mutate_managed(id, |info| {
            info.retrieve_services = Some(RetrievePhase::Failed)
        })
    }

    pub fn set_peripheral_communicate_reading(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.mutate_managed(id, |info| info.communicate = Some(CommunicatePhase::Reading))
    }

    pub fn set_peripheral_communicate_writing(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.mutate_managed(id, |info| info.communicate = Some(CommunicatePhase::Writing))
    }

    pub fn set_peripheral_communicate_non_communicate(
        &self,
        id: &PeripheralId,
    ) -> Result<(), BleError> {
        self.mutate_managed(id, |info| {
            info.communicate = Some(CommunicatePhase::NonCommunicate)
        })
    }

    pub fn on_receiving_for_characteristic_value(
        &self,
        id: &PeripheralId,
    ) -> Result<(), BleError> {
        self.mutate_managed(id, |info| {
            info.receiving_for_characteristic_value = Some(true)
        })
    }

    pub fn off_receiving_for_characteristic_value(
        &self,
        id: &PeripheralId,
    ) -> Result<(), BleError> {
        self.mutate_managed(id, |info| {
            info.receiving_for_characteristic_value = Some(false)
        })
    }

    pub fn set_peripheral_is_bonded(&self, id: &PeripheralId) -> Result<(), BleError> {
        self.mutate_managed(id, |info| info.bonded = Some(true))
    }

    pub fn set_last_error(&self, error: BleError) {
        self.mutate(|state| state.last_error = Some(error));
    }

    /// Restore the snapshot taken at construction (or at the last
    /// `re_init_state`).
    pub fn reset_state(&self) {
        let mut inner = self.inner.lock();
        inner.current = inner.baseline.clone();
        self.tx.send_replace(Arc::new(inner.current.clone()));
    }

    /// Atomically replace the current state and re-baseline future resets to
    /// the given snapshot.
    pub fn re_init_state(&self, snapshot: BleState) {
        let mut inner = self.inner.lock();
        inner.baseline = snapshot.clone();
        inner.current = snapshot;
        self.tx.send_replace(Arc::new(inner.current.clone()));
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(BleState::default())
    }
}
