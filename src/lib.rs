//! Bluevery: a state-management and orchestration layer for BLE peripherals.
//!
//! The crate sits on top of a native BLE binding (anything implementing
//! [`BleBinding`]) and coordinates scanning, connecting, bonding, service
//! discovery, and characteristic read/write/notify. Per-peripheral lifecycle
//! state lives in a single reactive snapshot ([`BleState`]) that UI adapters
//! subscribe to.
//!
//! Typical use:
//!
//! ```ignore
//! let bluevery = Bluevery::new(binding, permissions, PlatformCapabilities::android());
//! bluevery.init(InitOptions::default());
//! bluevery.start_scan(StartScanParams::default(), None, None).await?;
//! bluevery.connect(&ConnectParams { id }, None).await?;
//! ```

pub mod domain;
pub mod error;
pub mod facade;
pub mod infrastructure;
pub mod orchestration;

pub use domain::models::{
    Advertisement, BleState, CommunicatePhase, ConnectPhase, PeripheralId, PeripheralInfo,
    PeripheralSummary, PermissionStatus, RetrievePhase, DEFAULT_PERIPHERAL_NAME,
};
pub use domain::settings::{
    CommunicateOptions, ConnectOptions, ConnectParams, LogRotation, LogSettings, NotifyOptions,
    NotifyParams, ReadValueParams, RetrieveServicesOptions, RetryConfig, ScanSettings,
    StartScanParams, TaskOptions, TimeoutConfig, WriteValueParams, DEFAULT_COURTESY_DELAY_MS,
};
pub use error::BleError;
pub use facade::{Bluevery, InitOptions, PreNotifyHook, ReceiveCharacteristicValueParams};
pub use infrastructure::binding::{BleBinding, BleEvent, DiscoveredPeripheral};
pub use infrastructure::logging::{init_logger, LoggingGuard};
pub use infrastructure::permissions::{
    PermissionId, PermissionReport, PermissionService, PlatformCapabilities,
};
pub use orchestration::engine::{
    CharacteristicValueHandler, DiscoverHandler, DisconnectHandler, OrchestrationEngine,
    PeripheralMatcher,
};
