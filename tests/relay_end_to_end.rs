//! End-to-end tests: UDP datagram in, JSON text frame out.

use futures::StreamExt;
use std::time::Duration;
use telemetry_relay::types::{FieldDescriptor, ReaderKind, Transform};
use telemetry_relay::{Relay, RelayConfig, RelayHandle, TelemetrySchema};
use tokio::net::UdpSocket;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

fn loopback_config() -> RelayConfig {
    RelayConfig {
        udp_bind: "127.0.0.1:0".parse().unwrap(),
        ws_bind: "127.0.0.1:0".parse().unwrap(),
        ..RelayConfig::default()
    }
}

async fn start_speed_relay() -> RelayHandle {
    let schema =
        TelemetrySchema::new(vec![FieldDescriptor::new("Speed", 0, ReaderKind::Float32)]).unwrap();
    Relay::start_with_schema(&loopback_config(), schema).await.unwrap()
}

async fn connect(relay: &RelayHandle) -> Client {
    let (client, _) = connect_async(format!("ws://{}", relay.ws_addr())).await.unwrap();
    client
}

async fn wait_for_subscribers(relay: &RelayHandle, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while relay.hub().subscriber_count() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count should settle");
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("message should arrive")
            .expect("stream should stay open")
            .expect("frame should be valid");
        if let Message::Text(text) = message {
            return text.as_str().to_owned();
        }
    }
}

#[tokio::test]
async fn every_subscriber_receives_the_decoded_reading() {
    let _ = tracing_subscriber::fmt::try_init();
    let relay = start_speed_relay().await;
    let mut first = connect(&relay).await;
    let mut second = connect(&relay).await;
    wait_for_subscribers(&relay, 2).await;

    let game = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    game.send_to(&27.5f32.to_le_bytes(), relay.udp_addr()).await.unwrap();

    assert_eq!(next_text(&mut first).await, r#"{"Speed":27.5}"#);
    assert_eq!(next_text(&mut second).await, r#"{"Speed":27.5}"#);

    relay.shutdown().await;
}

#[tokio::test]
async fn short_packet_is_dropped_and_the_next_one_delivered() {
    let relay = start_speed_relay().await;
    let mut client = connect(&relay).await;
    wait_for_subscribers(&relay, 1).await;

    let game = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    game.send_to(&[0x01, 0x02], relay.udp_addr()).await.unwrap();
    game.send_to(&88.0f32.to_le_bytes(), relay.udp_addr()).await.unwrap();

    assert_eq!(next_text(&mut client).await, r#"{"Speed":88.0}"#);

    let stats = relay.stats();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.decoded, 1);

    relay.shutdown().await;
}

#[tokio::test]
async fn disconnected_subscriber_does_not_affect_the_rest() {
    let relay = start_speed_relay().await;
    let mut staying = connect(&relay).await;
    let mut leaving = connect(&relay).await;
    wait_for_subscribers(&relay, 2).await;

    leaving.close(None).await.unwrap();
    wait_for_subscribers(&relay, 1).await;

    let game = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    game.send_to(&12.0f32.to_le_bytes(), relay.udp_addr()).await.unwrap();

    assert_eq!(next_text(&mut staying).await, r#"{"Speed":12.0}"#);
    relay.shutdown().await;
}

#[tokio::test]
async fn dash_schema_applies_unit_transforms() {
    let relay = Relay::start(loopback_config()).await.unwrap();
    let mut client = connect(&relay).await;
    wait_for_subscribers(&relay, 1).await;

    let boost = relay.schema().field("Boost").unwrap();
    assert_eq!(boost.transform.map(|t| t.name()), Some(Transform::PSI_TO_BAR.name()));

    let mut packet = vec![0u8; 324];
    packet[256..260].copy_from_slice(&30.0f32.to_le_bytes()); // Speed
    packet[284..288].copy_from_slice(&14.504f32.to_le_bytes()); // Boost
    packet[319] = 4; // Gear

    let game = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    game.send_to(&packet, relay.udp_addr()).await.unwrap();

    let text = next_text(&mut client).await;
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let object = json.as_object().unwrap();

    assert_eq!(object.len(), relay.schema().len());
    assert_eq!(object["IsRaceOn"], serde_json::Value::Bool(false));
    assert_eq!(object["Speed"].as_f64(), Some(30.0));
    assert_eq!(object["Gear"].as_u64(), Some(4));
    let bar = object["Boost"].as_f64().unwrap();
    assert!((bar - 1.0).abs() < 1e-6);

    relay.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_subscribers() {
    let relay = start_speed_relay().await;
    let mut client = connect(&relay).await;
    wait_for_subscribers(&relay, 1).await;

    relay.shutdown().await;

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match client.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
