//! MQTT command channel to the printer.

use std::time::Duration;

use rumqttc::{
    AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, TlsConfiguration, Transport,
};
use tokio::time::Instant;

use super::command::PrinterCommand;
use super::{PrinterError, Result};
use crate::config::PrinterConfig;

const MQTT_PORT: u16 = 8883;
const MQTT_USER: &str = "bblp";

/// Publish a start-print command for the uploaded artifact and wait for the
/// broker's acknowledgment. The whole exchange, connection establishment
/// included, is bounded by the configured connect timeout; on expiry or any
/// channel error the connection is dropped and the operation fails.
pub async fn send_print_command(config: &PrinterConfig, remote_name: &str) -> Result<()> {
    let client_id = format!("meshprint_{}", uuid::Uuid::new_v4());
    let mut options = MqttOptions::new(client_id, config.ip.clone(), MQTT_PORT);
    options.set_credentials(MQTT_USER, &config.access_code);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_clean_session(true);

    // Same trust relaxation as the transfer channel: the printer presents a
    // self-signed certificate.
    let tls = TlsConfiguration::Simple {
        ca: vec![],
        alpn: None,
        client_auth: None,
    };
    options.set_transport(Transport::tls_with_config(tls));

    let (client, mut event_loop) = AsyncClient::new(options, 16);
    let deadline = Instant::now() + Duration::from_secs(config.connect_timeout_secs);

    wait_for_packet(&mut event_loop, deadline, "connection", |packet| {
        matches!(packet, Packet::ConnAck(_))
    })
    .await?;

    let command = PrinterCommand::ProjectFile {
        remote_name: remote_name.to_owned(),
    };
    let topic = command.topic(&config.serial);
    client
        .publish(&topic, QoS::AtLeastOnce, false, command.to_json().to_string())
        .await
        .map_err(|e| PrinterError::Command(format!("publish: {e}")))?;

    // QoS 1: the publish actually goes out while we poll, and the PubAck
    // confirms delivery before teardown.
    wait_for_packet(&mut event_loop, deadline, "publish acknowledgment", |packet| {
        matches!(packet, Packet::PubAck(_))
    })
    .await?;

    let _ = client.disconnect().await;
    tracing::info!(topic = %topic, remote = %remote_name, "print command acknowledged");
    Ok(())
}

async fn wait_for_packet(
    event_loop: &mut EventLoop,
    deadline: Instant,
    what: &str,
    matches: impl Fn(&Packet) -> bool,
) -> Result<()> {
    loop {
        match tokio::time::timeout_at(deadline, event_loop.poll()).await {
            Ok(Ok(Event::Incoming(packet))) if matches(&packet) => return Ok(()),
            Ok(Ok(_)) => continue,
            Ok(Err(e)) => return Err(PrinterError::Command(format!("{what}: {e}"))),
            Err(_) => return Err(PrinterError::Timeout(format!("MQTT {what} timed out"))),
        }
    }
}
