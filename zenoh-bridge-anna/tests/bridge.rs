//! Poll cycle, command intake and event loop against mock device and bus.

mod common;

use std::time::Duration;

use common::{ANNA_ID, MockDevice, RecordingBus, Snapshot, anna_config, bridge, fast_bridge, wait_for};
use thermosync_bridge_framework::{Connectivity, InboundMessage};
use tokio::sync::{mpsc, watch};
use tokio_test::{assert_err, assert_ok};
use zenoh_bridge_anna::{AnnaBridge, CommandError, CommandOutcome, PollError};

fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
    values
        .iter()
        .map(|(field, value)| (field.to_string(), value.to_string()))
        .collect()
}

#[tokio::test]
async fn test_first_poll_publishes_rounded_values() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    let report = bridge.poll_once(&bus).await.unwrap();

    let expected = pairs(&[
        ("setpoint", "20.5"),
        ("temperature", "21.0"),
        ("illuminance", "12"),
        ("water_pressure", "1.7"),
        ("boiler_temperature", "48.3"),
        ("heating_state", "off"),
        ("domestic_temperature", "42.1"),
    ]);
    assert_eq!(bus.published(), expected);
    assert_eq!(report.published, expected);
    assert_eq!(report.unchanged, 0);
    assert_eq!(bridge.identifier(), Some(ANNA_ID));
}

#[tokio::test]
async fn test_temperature_publishes_only_rounded_changes() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    for raw in ["21.03", "21.04", "21.06"] {
        device.set_snapshot(Snapshot::default().with_temperature(Some(raw)).xml());
        bridge.poll_once(&bus).await.unwrap();
    }

    assert_eq!(bus.values_of("temperature"), vec!["21.0", "21.1"]);
}

#[tokio::test]
async fn test_steady_state_publishes_nothing() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    bridge.poll_once(&bus).await.unwrap();
    bus.clear();

    let report = bridge.poll_once(&bus).await.unwrap();
    assert!(bus.published().is_empty());
    assert_eq!(report.unchanged, 7);
}

#[tokio::test]
async fn test_absent_value_keeps_cache() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    bridge.poll_once(&bus).await.unwrap();

    device.set_snapshot(Snapshot::default().with_temperature(None).xml());
    let report = bridge.poll_once(&bus).await.unwrap();
    assert_eq!(report.absent, 1);
    assert_eq!(bridge.cache().get("temperature"), Some("21.0"));

    device.set_snapshot(Snapshot::default().with_temperature(Some("21.04")).xml());
    bridge.poll_once(&bus).await.unwrap();
    assert_eq!(bus.values_of("temperature"), vec!["21.0"]);
}

#[tokio::test]
async fn test_reset_republishes_everything() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    let first = bridge.poll_once(&bus).await.unwrap();
    bridge.reset();
    let second = bridge.poll_once(&bus).await.unwrap();

    assert_eq!(first.published, second.published);
    assert_eq!(second.published.len(), 7);
    assert_eq!(bus.values_of("temperature"), vec!["21.0", "21.0"]);
    assert_eq!(bus.values_of("heating_state"), vec!["off", "off"]);
    assert_eq!(bridge.identifier(), Some(ANNA_ID));
}

#[tokio::test]
async fn test_ignored_field_is_never_published() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let config = anna_config(r#"ignore: ["water_pressure"]"#);
    let mut bridge = AnnaBridge::from_config(device.clone(), &config).unwrap();

    for pressure in ["1.7", "2.1", "0.9"] {
        device.set_snapshot(Snapshot::default().with_water_pressure(pressure).xml());
        let report = bridge.poll_once(&bus).await.unwrap();
        assert_eq!(report.ignored, 1);
    }

    assert!(bus.values_of("water_pressure").is_empty());
    assert_eq!(bridge.cache().get("water_pressure"), None);
}

#[tokio::test]
async fn test_missing_identifier_skips_cycle() {
    let device = MockDevice::serving(Snapshot::default().without_identifier().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    let err = bridge.poll_once(&bus).await.unwrap_err();
    assert!(matches!(err, PollError::Identifier(_)));
    assert!(bus.published().is_empty());
    assert_eq!(bridge.cache().get("setpoint"), None);
    assert_eq!(bridge.identifier(), None);
}

#[tokio::test]
async fn test_identifier_follows_snapshot_and_survives_reset() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);
    assert_ok!(bridge.warm_up().await);

    let replaced = Snapshot {
        identifier: Some("ffeeddccbbaa".to_string()),
        ..Snapshot::default()
    };
    device.set_snapshot(replaced.xml());
    bridge.poll_once(&bus).await.unwrap();
    assert_eq!(bridge.identifier(), Some("ffeeddccbbaa"));

    bridge.reset();
    assert_eq!(bridge.identifier(), Some("ffeeddccbbaa"));

    bridge.handle_command(&bus, "19").await.unwrap();
    assert_eq!(device.writes()[0].0, "ffeeddccbbaa");
}

#[tokio::test]
async fn test_fetch_and_parse_failures_leave_cache_untouched() {
    let device = MockDevice::default();
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    assert!(matches!(
        bridge.poll_once(&bus).await,
        Err(PollError::Device(_))
    ));

    device.set_snapshot("<appliances><appliance>");
    assert!(matches!(
        bridge.poll_once(&bus).await,
        Err(PollError::Document(_))
    ));

    assert!(bus.published().is_empty());
    assert_eq!(bridge.cache().get("heating_state"), None);
}

#[tokio::test]
async fn test_warm_up_resolves_identifier_without_publishing() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    assert_ok!(bridge.warm_up().await);
    assert_eq!(bridge.identifier(), Some(ANNA_ID));
    assert_eq!(bridge.cache().get("temperature"), None);

    let report = bridge.poll_once(&bus).await.unwrap();
    assert_eq!(report.published.len(), 7);
}

#[tokio::test]
async fn test_command_writes_and_echoes() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);
    assert_ok!(bridge.warm_up().await);

    let outcome = bridge.handle_command(&bus, "19.5").await.unwrap();

    assert_eq!(
        outcome,
        CommandOutcome {
            written: true,
            echoed: Some("19.5".to_string()),
        }
    );
    assert_eq!(
        device.writes(),
        vec![(ANNA_ID.to_string(), "setpoint".to_string(), "19.5".to_string())]
    );
    assert_eq!(bus.published(), pairs(&[("setpoint", "19.5")]));

    // The device confirming the new value is not published again.
    device.set_snapshot(Snapshot::default().with_setpoint("19.5").xml());
    bridge.poll_once(&bus).await.unwrap();
    assert_eq!(bus.values_of("setpoint"), vec!["19.5"]);
}

#[tokio::test]
async fn test_command_payload_reaches_device_unchanged() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);
    assert_ok!(bridge.warm_up().await);

    let outcome = bridge.handle_command(&bus, " 19.5\n").await.unwrap();

    assert_eq!(device.writes()[0].2, " 19.5\n");
    assert_eq!(outcome.echoed.as_deref(), Some("19.5"));
    assert_eq!(bus.values_of("setpoint"), vec!["19.5"]);
}

#[tokio::test]
async fn test_repeated_command_is_written_but_not_echoed() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);
    assert_ok!(bridge.warm_up().await);

    bridge.handle_command(&bus, "19.5").await.unwrap();
    let outcome = bridge.handle_command(&bus, "19.5").await.unwrap();

    assert_eq!(outcome.echoed, None);
    assert_eq!(device.writes().len(), 2);
    assert_eq!(bus.values_of("setpoint"), vec!["19.5"]);
}

#[tokio::test]
async fn test_command_without_identifier_fails_fast() {
    let device = MockDevice::default();
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);

    let err = assert_err!(bridge.handle_command(&bus, "19.5").await);

    assert_eq!(err, CommandError::IdentifierUnresolved);
    assert!(device.writes().is_empty());
    assert!(bus.published().is_empty());
    assert_eq!(bridge.cache().get("setpoint"), None);
}

#[tokio::test]
async fn test_invalid_commands_are_rejected() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);
    assert_ok!(bridge.warm_up().await);

    assert!(matches!(
        bridge.handle_command(&bus, "warmer").await,
        Err(CommandError::Precision(_))
    ));
    assert_eq!(
        bridge.handle_command(&bus, "  ").await,
        Err(CommandError::EmptyPayload)
    );
    assert!(device.writes().is_empty());
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn test_failed_write_still_echoes() {
    let device = MockDevice::serving(Snapshot::default().xml());
    device.fail_writes();
    let bus = RecordingBus::default();
    let mut bridge = bridge(&device);
    assert_ok!(bridge.warm_up().await);

    let outcome = bridge.handle_command(&bus, "18").await.unwrap();

    assert!(!outcome.written);
    assert_eq!(outcome.echoed.as_deref(), Some("18"));
}

#[tokio::test]
async fn test_run_loop_polls_commands_and_reconnects() {
    let device = MockDevice::serving(Snapshot::default().xml());
    let bus = RecordingBus::default();
    let mut bridge = fast_bridge(&device, Duration::from_millis(50));
    assert_ok!(bridge.warm_up().await);

    let (commands_tx, commands_rx) = mpsc::channel(4);
    let (connectivity_tx, connectivity_rx) =
        watch::channel(Connectivity::Connected { generation: 1 });

    let handle = tokio::spawn(bridge.run(bus.clone(), commands_rx, connectivity_rx));

    wait_for(|| !bus.values_of("temperature").is_empty()).await;

    commands_tx
        .send(InboundMessage {
            key: "thermosync/anna/set/setpoint".to_string(),
            payload: "19.5".to_string(),
        })
        .await
        .unwrap();
    wait_for(|| bus.values_of("setpoint").len() >= 2).await;
    assert_eq!(bus.values_of("setpoint")[..2], ["20.5", "19.5"]);
    assert_eq!(device.writes().len(), 1);

    // Device still reports 20.5, which now differs from the echoed command.
    wait_for(|| bus.values_of("setpoint").len() >= 3).await;
    assert_eq!(bus.values_of("setpoint")[2], "20.5");

    connectivity_tx
        .send(Connectivity::Connected { generation: 2 })
        .unwrap();
    wait_for(|| bus.values_of("temperature").len() >= 2).await;

    drop(commands_tx);
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop should stop once commands close")
        .unwrap();
}
