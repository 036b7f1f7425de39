//! The operation-orchestration engine.
//!
//! Sequences permission checks, adapter checks, scanning, connecting,
//! bonding, service retrieval, and characteristic I/O against the native
//! binding, driving the state store and the listener registry. Every native
//! call goes through the timeout/retry wrapper with the caller's options.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::models::{BleState, PeripheralId, PeripheralSummary, RetrievePhase};
use crate::domain::settings::{
    CommunicateOptions, ConnectOptions, ConnectParams, NotifyOptions, NotifyParams,
    ReadValueParams, RetrieveServicesOptions, ScanSettings, WriteValueParams,
};
use crate::error::BleError;
use crate::infrastructure::binding::{BleBinding, BleEvent};
use crate::infrastructure::permissions::{PermissionService, PlatformCapabilities};
use crate::orchestration::listeners::{ListenerKey, ListenerRegistry, Subscription};
use crate::orchestration::state::StateStore;
use crate::orchestration::task::run_task;

/// Invoked for every discovery that passes the caller's matcher.
pub type DiscoverHandler = Arc<dyn Fn(PeripheralSummary) + Send + Sync>;
/// Filters discoveries before they reach the discover handler.
pub type PeripheralMatcher = Arc<dyn Fn(&PeripheralSummary) -> bool + Send + Sync>;
/// Invoked with each value delivered by a notifying characteristic.
pub type CharacteristicValueHandler = Arc<dyn Fn(Vec<u8>) + Send + Sync>;
/// Invoked when the native side reports a peripheral disconnect.
pub type DisconnectHandler = Arc<dyn Fn(PeripheralId) + Send + Sync>;

pub struct OrchestrationEngine {
    binding: Arc<dyn BleBinding>,
    permissions: Arc<dyn PermissionService>,
    capabilities: PlatformCapabilities,
    store: Arc<StateStore>,
    listeners: Mutex<ListenerRegistry>,
}

impl OrchestrationEngine {
    pub fn new(
        binding: Arc<dyn BleBinding>,
        permissions: Arc<dyn PermissionService>,
        capabilities: PlatformCapabilities,
    ) -> Self {
        Self {
            binding,
            permissions,
            capabilities,
            store: Arc::new(StateStore::default()),
            listeners: Mutex::new(ListenerRegistry::new()),
        }
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Latest state snapshot.
    pub fn state(&self) -> Arc<BleState> {
        self.store.state()
    }

    /// Watch for state changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BleState>> {
        self.store.subscribe()
    }

    /// Drop every scanned entry ahead of a fresh scan cycle.
    pub fn clear_scanned_peripherals(&self) {
        self.store.clear_scanned_peripherals();
    }

    /// Replace the current state and re-baseline future resets to it.
    pub fn re_init_state(&self, state: BleState) {
        self.store.re_init_state(state);
    }

    /// Guard run before every BLE-touching operation: start the adapter
    /// stack once, then verify permissions and adapter power.
    ///
    /// Returns `Ok(false)` when a precondition is unmet; that outcome is
    /// recorded in the state snapshot, not thrown, and the caller aborts
    /// silently. Only an adapter-start failure propagates as an error.
    pub async fn require_check_before_process(&self) -> Result<bool, BleError> {
        if !self.store.state().managing {
            self.binding
                .start()
                .await
                .map_err(|err| BleError::AdapterStartFailed {
                    reason: err.to_string(),
                })?;
            self.store.on_managing();
        }

        let report = self.permissions.check().await;
        if !report.all_granted() {
            let requested = self.permissions.request(&report.lacking).await;
            if !requested.all_granted() {
                info!(lacking = ?requested.lacking, "permissions remain ungranted");
                self.store.set_permission_ungranted(requested.lacking);
                return Ok(false);
            }
        }
        self.store.set_permission_granted();

        if !self.binding.is_adapter_enabled().await? {
            info!("bluetooth adapter is disabled");
            self.store.set_bluetooth_disabled();
            return Ok(false);
        }
        self.store.set_bluetooth_enabled();
        Ok(true)
    }

    /// One scan cycle: register the discover listener, issue the native
    /// scan, wait out the duration, then clean up. No-op while a cycle is
    /// already running.
    pub async fn scan(
        &self,
        settings: &ScanSettings,
        handler: Option<DiscoverHandler>,
        matcher: Option<PeripheralMatcher>,
    ) -> Result<(), BleError> {
        if !self.require_check_before_process().await? {
            return Ok(());
        }
        if self.store.state().scanning {
            debug!("scan requested while already scanning, ignoring");
            return Ok(());
        }

        self.store.on_scanning();
        self.register_discover_listener(handler, matcher);

        let duration = Duration::from_millis(settings.duration_ms);
        if let Err(err) = self
            .binding
            .scan(&settings.service_uuids, duration, settings.allow_duplicates)
            .await
        {
            // Discovery degrades gracefully: a failed scan call just yields
            // no peripherals for this cycle.
            warn!(error = %err, "native scan call failed");
        }
        tokio::time::sleep(duration).await;
        self.cleanup_scan().await;
        Ok(())
    }

    /// Stop the native scan, drop the discover listener, clear the scanning
    /// flag. Runs even when the scan call itself failed.
    pub async fn cleanup_scan(&self) {
        if let Err(err) = self.binding.stop_scan().await {
            warn!(error = %err, "native stop_scan failed during cleanup");
        }
        self.listeners.lock().remove_internal(ListenerKey::Discover);
        self.store.off_scanning();
    }

    fn register_discover_listener(
        &self,
        handler: Option<DiscoverHandler>,
        matcher: Option<PeripheralMatcher>,
    ) {
        let mut rx = self.binding.events();
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(BleEvent::Discover(discovered)) => {
                        let summary = PeripheralSummary::from_advertising(
                            discovered.id,
                            discovered.name,
                            discovered.rssi,
                            discovered.advertisement,
                        );
                        // Recorded regardless of the matcher; the filter only
                        // gates the caller's handler.
                        store.set_peripheral_to_scanned(summary.clone());
                        let matched = matcher.as_ref().map_or(true, |m| m(&summary));
                        if matched {
                            if let Some(handler) = &handler {
                                handler(summary);
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "discover listener lagged behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        let mut registry = self.listeners.lock();
        registry.remove_internal(ListenerKey::Discover);
        registry.set_internal(ListenerKey::Discover, Subscription::from_task(task));
    }

    /// Full connect sequence. Returns `Ok(false)` without touching state
    /// when the guard soft-fails or the native side already reports the
    /// peripheral connected.
    pub async fn connect(
        &self,
        params: &ConnectParams,
        options: &ConnectOptions,
    ) -> Result<bool, BleError> {
        if !self.require_check_before_process().await? {
            return Ok(false);
        }
        let id = &params.id;
        let summary = self
            .store
            .state()
            .scanned_peripherals
            .get(id)
            .cloned()
            .ok_or_else(|| BleError::PeripheralNotFound { id: id.to_string() })?;

        if self.binding.is_peripheral_connected(id).await? {
            debug!(%id, "peripheral already connected, skipping");
            return Ok(false);
        }

        info!(%id, "connecting");
        self.store.set_managing_peripheral_connecting(&summary);
        if let Err(err) = self.connect_sequence(id, options).await {
            let _ = self.store.set_managing_peripheral_failed_connect(id);
            self.store.set_last_error(err.clone());
            return Err(err);
        }
        info!(%id, "connected");
        Ok(true)
    }

    async fn connect_sequence(
        &self,
        id: &PeripheralId,
        options: &ConnectOptions,
    ) -> Result<(), BleError> {
        run_task(&options.connect_task, || self.binding.connect(id)).await?;
        self.store.set_managing_peripheral_connected(id)?;
        self.ensure_services_retrieved(id, &options.retrieve).await?;
        if self.capabilities.supports_bonding {
            self.bond(id, options).await?;
        }
        Ok(())
    }

    async fn bond(&self, id: &PeripheralId, options: &ConnectOptions) -> Result<(), BleError> {
        let already_bonded = self.binding.bonded_peripherals().await?.contains(id);
        if !already_bonded {
            let pin = options.bond_pin.as_deref();
            run_task(&options.bond_task, || self.binding.create_bond(id, pin)).await?;
        }
        self.store.set_peripheral_is_bonded(id)
    }

    /// Run service discovery unless this peripheral is already `Retrieved`.
    async fn ensure_services_retrieved(
        &self,
        id: &PeripheralId,
        retrieve: &RetrieveServicesOptions,
    ) -> Result<(), BleError> {
        let already = self
            .store
            .state()
            .managing_peripherals
            .get(id)
            .and_then(|info| info.retrieve_services)
            == Some(RetrievePhase::Retrieved);
        if already {
            return Ok(());
        }

        self.store.set_managing_peripheral_retrieving(id)?;
        match run_task(&retrieve.task, || {
            self.binding.retrieve_services(id, &retrieve.service_uuids)
        })
        .await
        {
            Ok(()) => self.store.set_managing_peripheral_retrieved(id),
            Err(err) => {
                let _ = self.store.set_managing_peripheral_retrieve_failed(id);
                Err(err)
            }
        }
    }

    /// Write a characteristic value. Returns `Ok(false)` on guard soft-fail.
    pub async fn write_value(
        &self,
        params: &WriteValueParams,
        options: &CommunicateOptions,
    ) -> Result<bool, BleError> {
        if !self.require_check_before_process().await? {
            return Ok(false);
        }
        self.require_managed(&params.id)?;
        self.ensure_services_retrieved(&params.id, &options.retrieve)
            .await?;

        self.store.set_peripheral_communicate_writing(&params.id)?;
        let result = run_task(&options.task, || {
            self.binding.write(
                &params.id,
                params.service_uuid,
                params.characteristic_uuid,
                &params.value,
            )
        })
        .await;
        // Cleanup runs whether the write succeeded or not.
        let _ = self
            .store
            .set_peripheral_communicate_non_communicate(&params.id);

        match result {
            Ok(()) => Ok(true),
            Err(err) => {
                self.store.set_last_error(err.clone());
                Err(err)
            }
        }
    }

    /// Read a characteristic value. Returns `Ok(None)` on guard soft-fail.
    pub async fn read_value(
        &self,
        params: &ReadValueParams,
        options: &CommunicateOptions,
    ) -> Result<Option<Vec<u8>>, BleError> {
        if !self.require_check_before_process().await? {
            return Ok(None);
        }
        self.require_managed(&params.id)?;
        self.ensure_services_retrieved(&params.id, &options.retrieve)
            .await?;

        self.store.set_peripheral_communicate_reading(&params.id)?;
        let result = run_task(&options.task, || {
            self.binding
                .read(&params.id, params.service_uuid, params.characteristic_uuid)
        })
        .await;
        let _ = self
            .store
            .set_peripheral_communicate_non_communicate(&params.id);

        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.store.set_last_error(err.clone());
                Err(err)
            }
        }
    }

    /// Subscribe to a notifying characteristic. An existing value listener
    /// for the peripheral is force-removed first (reset-then-register).
    pub async fn start_notification(
        &self,
        params: &NotifyParams,
        handler: CharacteristicValueHandler,
        options: &NotifyOptions,
    ) -> Result<(), BleError> {
        self.require_managed(&params.id)?;

        let had_previous = {
            let mut registry = self.listeners.lock();
            let had = registry.has_public(&params.id, ListenerKey::CharacteristicValue);
            if had {
                registry.remove_public(&params.id, ListenerKey::CharacteristicValue);
            }
            had
        };
        if had_previous {
            debug!(id = %params.id, "replacing existing notification listener");
            let _ = self.store.off_receiving_for_characteristic_value(&params.id);
        }

        self.ensure_services_retrieved(&params.id, &options.retrieve)
            .await?;
        self.register_value_listener(params, handler);

        if let Err(err) = run_task(&options.task, || {
            self.binding.start_notification(
                &params.id,
                params.service_uuid,
                params.characteristic_uuid,
            )
        })
        .await
        {
            self.listeners
                .lock()
                .remove_public(&params.id, ListenerKey::CharacteristicValue);
            self.store.set_last_error(err.clone());
            return Err(err);
        }

        self.store.on_receiving_for_characteristic_value(&params.id)
    }

    fn register_value_listener(&self, params: &NotifyParams, handler: CharacteristicValueHandler) {
        let mut rx = self.binding.events();
        let target = params.id.clone();
        let characteristic = params.characteristic_uuid;
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(BleEvent::CharacteristicValueUpdate {
                        id,
                        characteristic_uuid,
                        value,
                        ..
                    }) => {
                        if id == target && characteristic_uuid == characteristic {
                            handler(value);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "value listener lagged behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.listeners.lock().set_public(
            params.id.clone(),
            ListenerKey::CharacteristicValue,
            Subscription::from_task(task),
        );
    }

    /// Stop a notification stream. Native stop, listener removal, and flag
    /// reset all run regardless of individual failure; a native error is
    /// reported after cleanup.
    pub async fn stop_notification(&self, params: &NotifyParams) -> Result<(), BleError> {
        let native = self
            .binding
            .stop_notification(&params.id, params.service_uuid, params.characteristic_uuid)
            .await;
        self.listeners
            .lock()
            .remove_public(&params.id, ListenerKey::CharacteristicValue);
        let _ = self.store.off_receiving_for_characteristic_value(&params.id);

        if let Err(err) = &native {
            warn!(error = %err, id = %params.id, "native stop_notification failed");
        }
        native
    }

    /// Adapter-wide disconnect listener. Marks managed peripherals
    /// `Disconnected` and forwards every disconnect to the optional handler.
    pub fn register_disconnect_listener(&self, handler: Option<DisconnectHandler>) {
        let mut rx = self.binding.events();
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(BleEvent::Disconnect { id }) => {
                        info!(%id, "peripheral disconnected");
                        let _ = store.set_managing_peripheral_disconnected(&id);
                        if let Some(handler) = &handler {
                            handler(id);
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "disconnect listener lagged behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        let mut registry = self.listeners.lock();
        registry.remove_internal(ListenerKey::Disconnect);
        registry.set_internal(ListenerKey::Disconnect, Subscription::from_task(task));
    }

    /// Adapter-wide power listener, keeping `bluetooth_enabled` current.
    pub fn register_adapter_state_listener(&self) {
        let mut rx = self.binding.events();
        let store = self.store.clone();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(BleEvent::AdapterStateChange { powered }) => {
                        if powered {
                            store.set_bluetooth_enabled();
                        } else {
                            store.set_bluetooth_disabled();
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "adapter listener lagged behind the event stream");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        let mut registry = self.listeners.lock();
        registry.remove_internal(ListenerKey::AdapterState);
        registry.set_internal(ListenerKey::AdapterState, Subscription::from_task(task));
    }

    /// Full teardown: stop an active scan cycle and drop every listener.
    pub async fn teardown(&self) {
        if self.store.state().scanning {
            self.cleanup_scan().await;
        }
        self.listeners.lock().remove_all();
    }

    fn require_managed(&self, id: &PeripheralId) -> Result<(), BleError> {
        if self.store.is_managed(id) {
            Ok(())
        } else {
            Err(BleError::PeripheralNotManaged { id: id.to_string() })
        }
    }
}
