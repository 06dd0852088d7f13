mod common;

use std::time::Duration;

use common::{test_config, MockBroker};
use maildisplay::actuator::{FlagPosition, LogActuator};
use maildisplay::config::MqttConfig;
use maildisplay::station::Station;
use maildisplay::telemetry::PayloadFormat;
use tokio::sync::mpsc;

fn station(format: PayloadFormat, broker: &MockBroker) -> Station<MockBroker, LogActuator> {
    Station::new(test_config(format), broker.clone(), LogActuator::new())
}

#[tokio::test]
async fn startup_announces_then_publishes_start() {
    let broker = MockBroker::reachable();
    let mut station = station(PayloadFormat::Primary, &broker);

    station.startup().await;

    let sent = broker.sent();
    assert_eq!(sent.len(), 6);
    assert!(sent[..5].iter().all(|s| s.topic.ends_with("/config")));
    assert_eq!(sent[5].topic, "mailbox/state");
    assert!(sent[5].payload.contains("\"lifecycle\":\"START\""));
    assert!(sent[5].payload.contains("\"status\":\"????\""));
    assert_eq!(station.flag().position(), Some(FlagPosition::Stowed));
    assert_eq!(station.flag().actuator().last_angle(), Some(0));
}

#[tokio::test]
async fn empty_mailbox_frame() {
    let broker = MockBroker::reachable();
    let mut station = station(PayloadFormat::Primary, &broker);

    assert!(station.handle_frame(&[0x10, 0x00, 0x64, 0x7C]).await);
    assert_eq!(
        broker.accepted_on("mailbox/state"),
        vec![r#"{"lifecycle":"UPDATE","mailproximity":16,"status":"NONE","battery":3.00,"temperature":32.0}"#]
    );
    assert_eq!(station.flag().position(), Some(FlagPosition::Stowed));
}

#[tokio::test]
async fn mail_raises_flag_and_open_lowers_it() {
    let broker = MockBroker::reachable();
    let mut station = station(PayloadFormat::Primary, &broker);

    station.handle_frame(&[0xF4, 0x01, 0x90, 0x6E]).await;
    assert_eq!(station.flag().position(), Some(FlagPosition::Deployed));
    assert_eq!(station.flag().actuator().last_angle(), Some(90));

    station.handle_frame(&[0xFF, 0xFF, 0x00, 0x00]).await;
    assert_eq!(station.flag().position(), Some(FlagPosition::Stowed));
    let states = broker.accepted_on("mailbox/state");
    assert!(states[0].contains("\"status\":\"MAIL\""));
    assert!(states[1].contains("\"status\":\"OPEN\""));
    assert!(states[1].contains("\"mailproximity\":65535"));
}

#[tokio::test]
async fn short_frame_is_discarded() {
    let broker = MockBroker::reachable();
    let mut station = station(PayloadFormat::Primary, &broker);

    assert!(!station.handle_frame(&[0x10, 0x00, 0x64]).await);
    assert!(broker.sent().is_empty());
    assert_eq!(broker.connect_attempts(), 0);
    assert!(!station.publisher().cache().has_reading());
}

#[tokio::test]
async fn alternate_flag_frame() {
    let broker = MockBroker::reachable();
    let mut station = station(PayloadFormat::Alternate, &broker);

    station.handle_frame(&[0x85, 0x00, 0x00]).await;
    assert_eq!(station.flag().position(), Some(FlagPosition::Deployed));
    assert_eq!(
        broker.accepted_on("mailbox/state"),
        vec![r#"{"mailProximity":1,"flagADC":133,"battery":1.55}"#]
    );
}

#[tokio::test]
async fn broker_outage_does_not_stop_the_flag() {
    let broker = MockBroker::unreachable();
    let mut station = station(PayloadFormat::Primary, &broker);

    assert!(station.handle_frame(&[0xF4, 0x01, 0x90, 0x6E]).await);
    assert_eq!(station.flag().position(), Some(FlagPosition::Deployed));
    assert_eq!(broker.connect_attempts(), 1);
    assert!(station.publisher().cache().has_reading());
}

#[tokio::test]
async fn poll_order_heartbeat_then_frames() {
    let broker = MockBroker::reachable();
    let mut station = station(PayloadFormat::Primary, &broker);
    let (tx, rx) = mpsc::unbounded_channel();
    station.attach_radio(rx);

    tx.send(vec![0x10, 0x00, 0x64, 0x7C]).unwrap();
    station.heartbeat_flag().set();
    station.poll_once().await;

    let states = broker.accepted_on("mailbox/state");
    assert_eq!(states.len(), 2);
    assert!(states[0].contains("\"lifecycle\":\"HB\""));
    assert!(states[0].contains("\"status\":\"????\""));
    assert!(states[1].contains("\"lifecycle\":\"UPDATE\""));

    station.heartbeat_flag().set();
    station.poll_once().await;
    let states = broker.accepted_on("mailbox/state");
    assert_eq!(
        states[2],
        r#"{"lifecycle":"HB","mailproximity":16,"status":"NONE","battery":3.00,"temperature":32.0}"#
    );

    // Nothing pending: nothing sent.
    let before = broker.sent().len();
    station.poll_once().await;
    assert_eq!(broker.sent().len(), before);
}

#[tokio::test]
async fn reload_applies_new_broker_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut updated = test_config(PayloadFormat::Primary);
    updated.mqtt.topic = "porch".to_string();
    updated.interpreter.mail_threshold = 20;
    std::fs::write(&path, toml::to_string_pretty(&updated).unwrap()).unwrap();

    let old_broker = MockBroker::reachable();
    let new_broker = MockBroker::reachable();
    let factory_broker = new_broker.clone();
    let mut station = station(PayloadFormat::Primary, &old_broker).with_reload(
        path.to_str().unwrap(),
        Box::new(move |_: &MqttConfig| factory_broker.clone()),
    );

    station.reconfigure_flag().set();
    station.poll_once().await;
    assert_eq!(new_broker.connect_attempts(), 1);
    assert_eq!(new_broker.sent().len(), 5);
    assert!(new_broker.sent()[0].topic.starts_with("porch_"));

    // Proximity 32 is mail under the reloaded threshold.
    station.handle_frame(&[0x20, 0x00, 0x64, 0x7C]).await;
    let states = new_broker.accepted_on("porch/state");
    assert_eq!(states.len(), 1);
    assert!(states[0].contains("\"status\":\"MAIL\""));
    assert!(old_broker.accepted_on("mailbox/state").is_empty());
}

#[tokio::test]
async fn reload_keeps_config_when_file_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[mqtt]\nhost = \"broker\"\ntopic = \"bad/#\"\n").unwrap();

    let broker = MockBroker::reachable();
    let mut station = station(PayloadFormat::Primary, &broker)
        .with_reload(path.to_str().unwrap(), Box::new(|_: &MqttConfig| MockBroker::unreachable()));

    station.reconfigure_flag().set();
    station.poll_once().await;
    assert_eq!(station.config().mqtt.topic, "mailbox");

    station.handle_frame(&[0x10, 0x00, 0x64, 0x7C]).await;
    assert_eq!(broker.accepted_on("mailbox/state").len(), 1);
}

#[tokio::test]
async fn run_until_shutdown() {
    let broker = MockBroker::reachable();
    let mut station = station(PayloadFormat::Primary, &broker);
    let (tx, rx) = mpsc::unbounded_channel();
    station.attach_radio(rx);
    tx.send(vec![0xF4, 0x01, 0x90, 0x6E]).unwrap();

    tokio_test::assert_ok!(
        station
            .run(tokio::time::sleep(Duration::from_millis(200)))
            .await
    );

    let states = broker.accepted_on("mailbox/state");
    assert!(states[0].contains("START"));
    assert!(states.iter().any(|s| s.contains("\"status\":\"MAIL\"")));
}
