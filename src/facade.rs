//! Public command surface.
//!
//! [`Bluevery`] merges user options with defaults, drives the scan-interval
//! loop, and delegates everything else to the orchestration engine. It never
//! mutates state directly; it only reads snapshots and issues engine
//! commands. Construct one explicitly and share it through `Arc`; there is
//! no hidden global.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::models::{BleState, PeripheralId};
use crate::domain::settings::{
    CommunicateOptions, ConnectOptions, ConnectParams, NotifyOptions, NotifyParams,
    ReadValueParams, StartScanParams, WriteValueParams, DEFAULT_COURTESY_DELAY_MS,
};
use crate::error::BleError;
use crate::infrastructure::binding::BleBinding;
use crate::infrastructure::permissions::{PermissionService, PlatformCapabilities};
use crate::orchestration::engine::{
    CharacteristicValueHandler, DiscoverHandler, DisconnectHandler, OrchestrationEngine,
    PeripheralMatcher,
};

/// Caller-supplied step run between discovery and notification subscription
/// in [`Bluevery::receive_characteristic_value`] (typically connect + write).
pub type PreNotifyHook = Pin<Box<dyn Future<Output = Result<(), BleError>> + Send>>;

/// Options for [`Bluevery::init`].
#[derive(Default)]
pub struct InitOptions {
    /// Replaces the store's state and re-baselines future resets.
    pub initial_state: Option<BleState>,
    /// Invoked whenever the native side reports a disconnect.
    pub on_disconnect: Option<DisconnectHandler>,
}

/// Parameters for [`Bluevery::receive_characteristic_value`].
pub struct ReceiveCharacteristicValueParams {
    pub scan: StartScanParams,
    pub notify: NotifyParams,
    pub notify_options: NotifyOptions,
    /// Upper bound on scan cycles while waiting for the target to appear.
    /// `None` keeps scanning until it shows up or the loop is stopped.
    pub max_scan_cycles: Option<u32>,
}

pub struct Bluevery {
    engine: Arc<OrchestrationEngine>,
    stop_requested: Arc<AtomicBool>,
    initialized: AtomicBool,
    courtesy_delay: Duration,
}

impl Bluevery {
    pub fn new(
        binding: Arc<dyn BleBinding>,
        permissions: Arc<dyn PermissionService>,
        capabilities: PlatformCapabilities,
    ) -> Self {
        Self {
            engine: Arc::new(OrchestrationEngine::new(binding, permissions, capabilities)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            initialized: AtomicBool::new(false),
            courtesy_delay: Duration::from_millis(DEFAULT_COURTESY_DELAY_MS),
        }
    }

    /// Override the settle time applied after each command loop.
    pub fn with_courtesy_delay(mut self, delay: Duration) -> Self {
        self.courtesy_delay = delay;
        self
    }

    /// Prepare the session: optionally replace the state baseline and
    /// register the adapter-wide listeners. Idempotent until [`stop`](Self::stop).
    pub fn init(&self, options: InitOptions) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("init called on an initialized session, ignoring");
            return;
        }
        if let Some(state) = options.initial_state {
            self.engine.re_init_state(state);
        }
        self.engine.register_disconnect_listener(options.on_disconnect);
        self.engine.register_adapter_state_listener();
        info!("bluevery initialized");
    }

    /// Latest state snapshot, for UI binding.
    pub fn state(&self) -> Arc<BleState> {
        self.engine.state()
    }

    /// Watch for state changes; pair with a UI adapter of your choosing.
    pub fn subscribe(&self) -> watch::Receiver<Arc<BleState>> {
        self.engine.subscribe()
    }

    /// Run the scan-interval loop: `iterations` engine scans, each preceded
    /// by `interval_ms` of settle time. A courtesy delay elapses after the
    /// last cycle before this returns, so a follow-up command does not race
    /// the adapter's own bookkeeping.
    pub async fn start_scan(
        &self,
        params: StartScanParams,
        handler: Option<DiscoverHandler>,
        matcher: Option<PeripheralMatcher>,
    ) -> Result<(), BleError> {
        self.engine.clear_scanned_peripherals();
        self.stop_requested.store(false, Ordering::SeqCst);

        for iteration in 0..params.iterations {
            if self.stop_requested.load(Ordering::SeqCst) {
                debug!(iteration, "scan loop stopped");
                break;
            }
            tokio::time::sleep(Duration::from_millis(params.interval_ms)).await;
            self.engine
                .scan(&params.scan, handler.clone(), matcher.clone())
                .await?;
        }

        tokio::time::sleep(self.courtesy_delay).await;
        Ok(())
    }

    /// Request the scan loop to exit. Takes effect at the top of the next
    /// cycle; an in-flight engine scan finishes its duration first.
    pub fn stop_scan(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    pub async fn connect(
        &self,
        params: &ConnectParams,
        options: Option<ConnectOptions>,
    ) -> Result<bool, BleError> {
        let options = options.unwrap_or_default();
        self.engine.connect(params, &options).await
    }

    pub async fn write_value(
        &self,
        params: &WriteValueParams,
        options: Option<CommunicateOptions>,
    ) -> Result<bool, BleError> {
        let options = options.unwrap_or_default();
        self.engine.write_value(params, &options).await
    }

    pub async fn read_value(
        &self,
        params: &ReadValueParams,
        options: Option<CommunicateOptions>,
    ) -> Result<Option<Vec<u8>>, BleError> {
        let options = options.unwrap_or_default();
        self.engine.read_value(params, &options).await
    }

    /// Scan until the target peripheral appears, run the optional pre-
    /// notification step, then subscribe to the characteristic.
    ///
    /// Without `max_scan_cycles` the wait is unbounded; [`stop_scan`]
    /// (Self::stop_scan) or [`stop`](Self::stop) ends it early with `Ok`.
    pub async fn receive_characteristic_value(
        &self,
        params: ReceiveCharacteristicValueParams,
        pre_notify: Option<PreNotifyHook>,
        handler: CharacteristicValueHandler,
    ) -> Result<(), BleError> {
        let target = params.notify.id.clone();
        let mut cycles = 0u32;
        while !self.is_scanned(&target) {
            if let Some(max) = params.max_scan_cycles {
                if cycles >= max {
                    return Err(BleError::Timeout {
                        message: format!("{target} not discovered after {max} scan cycles"),
                    });
                }
            }
            self.start_scan(params.scan.clone(), None, None).await?;
            cycles += 1;
            if self.stop_requested.load(Ordering::SeqCst) {
                debug!(%target, "receive loop stopped before discovery");
                return Ok(());
            }
        }

        if let Some(hook) = pre_notify {
            hook.await?;
        }
        self.engine
            .start_notification(&params.notify, handler, &params.notify_options)
            .await
    }

    pub async fn stop_receive_characteristic_value(
        &self,
        params: &NotifyParams,
    ) -> Result<(), BleError> {
        self.engine.stop_notification(params).await
    }

    /// Full teardown: halt the scan loop, drop every listener, stop an
    /// active scan cycle. The session can be re-initialized afterwards.
    pub async fn stop(&self) {
        info!("stopping bluevery");
        self.stop_requested.store(true, Ordering::SeqCst);
        self.engine.teardown().await;
        self.initialized.store(false, Ordering::SeqCst);
    }

    fn is_scanned(&self, id: &PeripheralId) -> bool {
        self.engine.state().scanned_peripherals.contains_key(id)
    }
}
