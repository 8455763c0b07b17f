use firewatch_device::{standard_fleet, DeviceSimulator, DeviceTransport};
use firewatch_mqtt::{MemoryBroker, Publisher, QoS};
use firewatch_types::topics::{SPRINKLER_HANDLER, SUBSCRIBED_TOPICS};
use firewatch_types::{CommandAction, DeviceCommand, DeviceReading};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test]
async fn test_every_device_reports() {
    let broker = MemoryBroker::new();
    let mut server = broker.subscribe(&SUBSCRIBED_TOPICS, 64).await;

    let fleet = standard_fleet(&mut StdRng::seed_from_u64(1));
    let handle = DeviceSimulator::new(
        fleet,
        DeviceTransport::Memory(broker.clone()),
        Duration::from_millis(10),
    )
    .start()
    .await
    .unwrap();

    let mut seen = HashSet::new();
    timeout(Duration::from_secs(5), async {
        while seen.len() < SUBSCRIBED_TOPICS.len() {
            let message = server.recv().await.unwrap();
            let reading = DeviceReading::decode(&message.payload).unwrap();
            reading.validate_strict().unwrap();
            assert_eq!(reading.device_name, message.topic);
            seen.insert(message.topic);
        }
    })
    .await
    .expect("every device should report");

    handle.stop().await;
}

#[tokio::test]
async fn test_sprinkler_confirms_command() {
    let broker = MemoryBroker::new();
    let mut server = broker.subscribe(&[SPRINKLER_HANDLER], 64).await;

    let fleet = standard_fleet(&mut StdRng::seed_from_u64(2));
    let handle = DeviceSimulator::new(
        fleet,
        DeviceTransport::Memory(broker.clone()),
        Duration::from_secs(60),
    )
    .start()
    .await
    .unwrap();

    let command = DeviceCommand::new(SPRINKLER_HANDLER, CommandAction::Start);
    broker
        .publish(SPRINKLER_HANDLER, command.encode().unwrap(), QoS::ExactlyOnce)
        .await
        .unwrap();

    let confirmed = timeout(Duration::from_secs(5), async {
        loop {
            let message = server.recv().await.unwrap();
            let reading = DeviceReading::decode(&message.payload).unwrap();
            if reading.current_action.as_deref() == Some("started") {
                return reading;
            }
        }
    })
    .await
    .expect("sprinkler should confirm the command");

    assert!(confirmed.action.is_none());
    assert_eq!(confirmed.device_name, SPRINKLER_HANDLER);

    handle.stop().await;
}

#[test]
fn test_client_id_per_device() {
    assert_eq!(DeviceTransport::client_id("fire_sensor"), "fire_sensor_1");
}
