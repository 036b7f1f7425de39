//! Option and settings types for the public command surface.
//!
//! Every struct here deserializes with per-field defaults so callers can
//! supply partial configuration; the facade merges whatever is missing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::PeripheralId;

/// Wait applied after an operation completes, before the caller's
/// continuation runs, so the native adapter can settle.
pub const DEFAULT_COURTESY_DELAY_MS: u64 = 500;

/// Deadline for a single wrapped operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub duration_ms: u64,
    #[serde(default)]
    pub message: Option<String>,
}

impl TimeoutConfig {
    pub fn new(duration_ms: u64) -> Self {
        Self {
            duration_ms,
            message: None,
        }
    }
}

/// Retry schedule for a wrapped operation. `max_attempts` counts additional
/// attempts after the first failure; the delay before attempt `n` is
/// `initial_interval_ms * factor^(n-1)`, so `factor = 1` is a constant delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_factor")]
    pub factor: u32,
    #[serde(default = "default_retry_interval_ms")]
    pub initial_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            factor: default_factor(),
            initial_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl RetryConfig {
    /// Delay to apply before retry attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> std::time::Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = (self.factor as u64).saturating_pow(exponent);
        std::time::Duration::from_millis(self.initial_interval_ms.saturating_mul(multiplier))
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_factor() -> u32 {
    1
}
fn default_retry_interval_ms() -> u64 {
    1000
}

/// Timeout/retry pair applied to one native call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOptions {
    #[serde(default)]
    pub timeout: Option<TimeoutConfig>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl TaskOptions {
    pub fn with_timeout(duration_ms: u64) -> Self {
        Self {
            timeout: Some(TimeoutConfig::new(duration_ms)),
            retry: None,
        }
    }
}

/// One native scan invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    #[serde(default)]
    pub service_uuids: Vec<Uuid>,
    #[serde(default = "default_scan_duration_ms")]
    pub duration_ms: u64,
    #[serde(default)]
    pub allow_duplicates: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            service_uuids: Vec::new(),
            duration_ms: default_scan_duration_ms(),
            allow_duplicates: false,
        }
    }
}

fn default_scan_duration_ms() -> u64 {
    3000
}

/// The facade's scan-interval loop: `iterations` scan cycles with
/// `interval_ms` of settle time ahead of each one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartScanParams {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub interval_ms: u64,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl Default for StartScanParams {
    fn default() -> Self {
        Self {
            scan: ScanSettings::default(),
            interval_ms: 0,
            iterations: default_iterations(),
        }
    }
}

fn default_iterations() -> u32 {
    1
}

/// Target of a connect command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    pub id: PeripheralId,
}

/// Service discovery scope plus its timeout/retry wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrieveServicesOptions {
    #[serde(default)]
    pub service_uuids: Vec<Uuid>,
    #[serde(default = "default_retrieve_task")]
    pub task: TaskOptions,
}

impl Default for RetrieveServicesOptions {
    fn default() -> Self {
        Self {
            service_uuids: Vec::new(),
            task: default_retrieve_task(),
        }
    }
}

fn default_retrieve_task() -> TaskOptions {
    TaskOptions::with_timeout(5000)
}

/// Options for the full connect sequence. Connect, service retrieval, and
/// bonding all carry a timeout by default; a connect without one can hang
/// forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    #[serde(default = "default_connect_task")]
    pub connect_task: TaskOptions,
    #[serde(default)]
    pub retrieve: RetrieveServicesOptions,
    #[serde(default = "default_bond_task")]
    pub bond_task: TaskOptions,
    /// PIN forwarded to the platform bonding dialog, when one is required.
    #[serde(default)]
    pub bond_pin: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_task: default_connect_task(),
            retrieve: RetrieveServicesOptions::default(),
            bond_task: default_bond_task(),
            bond_pin: None,
        }
    }
}

fn default_connect_task() -> TaskOptions {
    TaskOptions::with_timeout(8000)
}
fn default_bond_task() -> TaskOptions {
    TaskOptions::with_timeout(10000)
}

/// Target characteristic of a write command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteValueParams {
    pub id: PeripheralId,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    pub value: Vec<u8>,
}

/// Target characteristic of a read command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadValueParams {
    pub id: PeripheralId,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
}

/// Options for a read/write command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicateOptions {
    #[serde(default)]
    pub task: TaskOptions,
    #[serde(default)]
    pub retrieve: RetrieveServicesOptions,
}

/// Target characteristic of a notification command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyParams {
    pub id: PeripheralId,
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
}

/// Options for starting a notification stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyOptions {
    #[serde(default)]
    pub task: TaskOptions,
    #[serde(default)]
    pub retrieve: RetrieveServicesOptions,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Minutely,
    Never,
}

/// Logging configuration, mirrored into `init_logger`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: LogRotation::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "bluevery".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_constant_when_factor_is_one() {
        let config = RetryConfig {
            max_attempts: 5,
            factor: 1,
            initial_interval_ms: 200,
        };
        assert_eq!(config.delay_for(1).as_millis(), 200);
        assert_eq!(config.delay_for(4).as_millis(), 200);
    }

    #[test]
    fn test_retry_delay_grows_with_factor() {
        let config = RetryConfig {
            max_attempts: 3,
            factor: 2,
            initial_interval_ms: 100,
        };
        assert_eq!(config.delay_for(1).as_millis(), 100);
        assert_eq!(config.delay_for(2).as_millis(), 200);
        assert_eq!(config.delay_for(3).as_millis(), 400);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let params: StartScanParams = serde_json::from_str(r#"{"interval_ms": 50}"#).unwrap();
        assert_eq!(params.interval_ms, 50);
        assert_eq!(params.iterations, 1);
        assert_eq!(params.scan.duration_ms, 3000);

        let options: ConnectOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.connect_task.timeout.unwrap().duration_ms, 8000);
    }
}
