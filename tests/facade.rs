//! Scenario tests for the public facade: scan-interval looping, courtesy
//! delay, receive-until-found, and teardown.

mod support;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use bluevery::{
    BleError, BleEvent, BleState, Bluevery, CharacteristicValueHandler, ConnectParams,
    InitOptions, NotifyOptions, NotifyParams, PeripheralId, PlatformCapabilities, PreNotifyHook,
    ReceiveCharacteristicValueParams, ScanSettings, StartScanParams,
};
use support::{discovered, FakeBinding, FakePermissions};

fn scan_params(interval_ms: u64, iterations: u32, duration_ms: u64) -> StartScanParams {
    StartScanParams {
        scan: ScanSettings {
            duration_ms,
            ..Default::default()
        },
        interval_ms,
        iterations,
    }
}

fn notify_params(id: &str) -> NotifyParams {
    NotifyParams {
        id: PeripheralId::from(id),
        service_uuid: Uuid::from_u128(0x10),
        characteristic_uuid: Uuid::from_u128(0x12),
    }
}

#[tokio::test(start_paused = true)]
async fn test_scan_loop_runs_on_schedule_with_courtesy_delay() {
    let binding = FakeBinding::new();
    let facade = Bluevery::new(
        binding.clone(),
        FakePermissions::granted(),
        PlatformCapabilities::ios(),
    );

    let started_at = tokio::time::Instant::now();
    facade
        .start_scan(scan_params(50, 3, 0), None, None)
        .await
        .unwrap();
    let elapsed = started_at.elapsed();

    let offsets: Vec<u128> = binding
        .scan_times
        .lock()
        .iter()
        .map(|t| t.duration_since(started_at).as_millis())
        .collect();
    assert_eq!(offsets, vec![50, 100, 150]);
    // 150ms of scheduling plus the 500ms settle time.
    assert_eq!(elapsed.as_millis(), 650);
}

#[tokio::test(start_paused = true)]
async fn test_start_scan_clears_previous_results() {
    let binding = FakeBinding::new();
    *binding.discover_on_scan.lock() = vec![discovered("AA", Some("scale"), -40)];
    let facade = Bluevery::new(
        binding.clone(),
        FakePermissions::granted(),
        PlatformCapabilities::ios(),
    );

    facade
        .start_scan(scan_params(0, 1, 5), None, None)
        .await
        .unwrap();
    assert_eq!(facade.state().scanned_peripherals.len(), 1);

    // Nothing is discovered on the next cycle; stale entries must not leak
    // into it.
    binding.discover_on_scan.lock().clear();
    facade
        .start_scan(scan_params(0, 1, 5), None, None)
        .await
        .unwrap();
    assert!(facade.state().scanned_peripherals.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_scan_exits_at_next_cycle_boundary() {
    let binding = FakeBinding::new();
    let facade = Arc::new(Bluevery::new(
        binding.clone(),
        FakePermissions::granted(),
        PlatformCapabilities::ios(),
    ));

    let loop_facade = facade.clone();
    let scan_loop = tokio::spawn(async move {
        loop_facade
            .start_scan(scan_params(50, 100, 0), None, None)
            .await
    });

    tokio::time::sleep(Duration::from_millis(120)).await;
    facade.stop_scan();
    scan_loop.await.unwrap().unwrap();

    // Cycles at 50 and 100 completed; the cycle whose check passed before
    // the stop still ran at 150, then the loop exited.
    assert_eq!(binding.scan_call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_receive_scans_until_target_appears() {
    let binding = FakeBinding::new();
    *binding.discover_on_scan.lock() = vec![discovered("AA", Some("scale"), -40)];
    *binding.discover_after_scans.lock() = 2;
    let facade = Arc::new(Bluevery::new(
        binding.clone(),
        FakePermissions::granted(),
        PlatformCapabilities::ios(),
    ));

    let hook_facade = facade.clone();
    let pre_notify: PreNotifyHook = Box::pin(async move {
        hook_facade
            .connect(&ConnectParams { id: "AA".into() }, None)
            .await
            .map(|_| ())
    });

    let values = Arc::new(Mutex::new(Vec::new()));
    let values_in_handler = values.clone();
    let handler: CharacteristicValueHandler = Arc::new(move |value| {
        values_in_handler.lock().push(value);
    });

    facade
        .receive_characteristic_value(
            ReceiveCharacteristicValueParams {
                scan: scan_params(10, 1, 5),
                notify: notify_params("AA"),
                notify_options: NotifyOptions::default(),
                max_scan_cycles: None,
            },
            Some(pre_notify),
            handler,
        )
        .await
        .unwrap();

    assert_eq!(binding.scan_call_count(), 2);
    let state = facade.state();
    let info = &state.managing_peripherals[&PeripheralId::from("AA")];
    assert_eq!(info.receiving_for_characteristic_value, Some(true));

    binding.emit(BleEvent::CharacteristicValueUpdate {
        id: "AA".into(),
        service_uuid: Uuid::from_u128(0x10),
        characteristic_uuid: Uuid::from_u128(0x12),
        value: vec![9, 9],
    });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(*values.lock(), vec![vec![9, 9]]);
}

#[tokio::test(start_paused = true)]
async fn test_receive_respects_scan_cycle_bound() {
    let binding = FakeBinding::new();
    *binding.discover_after_scans.lock() = u32::MAX;
    let facade = Bluevery::new(
        binding.clone(),
        FakePermissions::granted(),
        PlatformCapabilities::ios(),
    );

    let handler: CharacteristicValueHandler = Arc::new(|_| {});
    let result = facade
        .receive_characteristic_value(
            ReceiveCharacteristicValueParams {
                scan: scan_params(10, 1, 0),
                notify: notify_params("AA"),
                notify_options: NotifyOptions::default(),
                max_scan_cycles: Some(3),
            },
            None,
            handler,
        )
        .await;

    assert!(matches!(result, Err(BleError::Timeout { .. })));
    assert_eq!(binding.scan_call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_init_rebaselines_state_when_given_one() {
    let binding = FakeBinding::new();
    let facade = Bluevery::new(
        binding.clone(),
        FakePermissions::granted(),
        PlatformCapabilities::ios(),
    );

    let mut seeded = BleState::default();
    seeded.bluetooth_enabled = true;
    facade.init(InitOptions {
        initial_state: Some(seeded.clone()),
        on_disconnect: None,
    });

    assert_eq!(*facade.state(), seeded);
}

#[tokio::test(start_paused = true)]
async fn test_stop_halts_listeners_and_allows_reinit() {
    let binding = FakeBinding::new();
    let facade = Bluevery::new(
        binding.clone(),
        FakePermissions::granted(),
        PlatformCapabilities::ios(),
    );

    let disconnects = Arc::new(Mutex::new(0u32));
    let disconnects_in_handler = disconnects.clone();
    facade.init(InitOptions {
        initial_state: None,
        on_disconnect: Some(Arc::new(move |_| {
            *disconnects_in_handler.lock() += 1;
        })),
    });

    binding.emit(BleEvent::Disconnect { id: "AA".into() });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(*disconnects.lock(), 1);

    facade.stop().await;
    binding.emit(BleEvent::Disconnect { id: "AA".into() });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(*disconnects.lock(), 1);

    // A stopped session can be brought back.
    let disconnects_again = disconnects.clone();
    facade.init(InitOptions {
        initial_state: None,
        on_disconnect: Some(Arc::new(move |_| {
            *disconnects_again.lock() += 1;
        })),
    });
    binding.emit(BleEvent::Disconnect { id: "AA".into() });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(*disconnects.lock(), 2);
}
