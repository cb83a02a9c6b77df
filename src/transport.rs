// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT transport: connects to the broker, subscribes to the configured
//! angle-report wildcard, and offers topic (de)composition helpers so the
//! dispatcher never has to know about `rumqttc` directly.

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::debug;

use crate::error::TransportError;

/// One angle report as received off the wire, before it is decoded into a
/// [`crate::window::Angle`].
pub struct IncomingAngle {
    pub locator_id: String,
    pub tag_id: String,
    pub payload: Vec<u8>,
}

/// Thin wrapper around `rumqttc`'s client/event-loop pair.
pub struct Transport {
    client: AsyncClient,
    eventloop: rumqttc::EventLoop,
    angle_topic_prefix: String,
}

impl Transport {
    pub async fn connect(
        client_id: &str,
        broker_host: &str,
        broker_port: u16,
        angle_topic_prefix: &str,
    ) -> Result<Self, TransportError> {
        let mut options = MqttOptions::new(client_id, broker_host, broker_port);
        options.set_keep_alive(std::time::Duration::from_secs(15));

        let (client, eventloop) = AsyncClient::new(options, 100);

        let wildcard = format!("{angle_topic_prefix}/+/+");
        client.subscribe(&wildcard, QoS::AtMostOnce).await?;
        debug!(topic = %wildcard, "subscribed to angle reports");

        Ok(Self {
            client,
            eventloop,
            angle_topic_prefix: angle_topic_prefix.to_string(),
        })
    }

    /// Block until the next incoming angle publish, skipping any other MQTT
    /// event (ack, ping, etc.) that does not carry application data.
    pub async fn next_angle(&mut self) -> Result<IncomingAngle, TransportError> {
        loop {
            match self.eventloop.poll().await? {
                Event::Incoming(Packet::Publish(publish)) => {
                    if let Some((locator_id, tag_id)) = parse_angle_topic(&publish.topic, &self.angle_topic_prefix) {
                        return Ok(IncomingAngle {
                            locator_id,
                            tag_id,
                            payload: publish.payload.to_vec(),
                        });
                    }
                    debug!(topic = %publish.topic, "ignoring publish outside angle topic shape");
                }
                _ => continue,
            }
        }
    }

    pub async fn publish_position(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        self.client.publish(topic, QoS::AtMostOnce, false, payload).await?;
        Ok(())
    }
}

/// Parse `<angle-prefix>/<locator-id>/<tag-id>` into its components.
pub fn parse_angle_topic(topic: &str, angle_topic_prefix: &str) -> Option<(String, String)> {
    let rest = topic.strip_prefix(angle_topic_prefix)?.strip_prefix('/')?;
    let mut parts = rest.splitn(2, '/');
    let locator_id = parts.next()?;
    let tag_id = parts.next()?;
    if locator_id.is_empty() || tag_id.is_empty() || tag_id.contains('/') {
        return None;
    }
    Some((locator_id.to_string(), tag_id.to_string()))
}

/// Build the egress position topic for a tag.
pub fn position_topic(position_topic_prefix: &str, multilocator_id: &str, tag_id: &str) -> String {
    format!("{position_topic_prefix}/{multilocator_id}/{tag_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_angle_topic() {
        let parsed = parse_angle_topic("aoa/angle/loc0/tagA", "aoa/angle");
        assert_eq!(parsed, Some(("loc0".to_string(), "tagA".to_string())));
    }

    #[test]
    fn rejects_topic_with_wrong_prefix() {
        assert_eq!(parse_angle_topic("other/loc0/tagA", "aoa/angle"), None);
    }

    #[test]
    fn rejects_topic_missing_tag_segment() {
        assert_eq!(parse_angle_topic("aoa/angle/loc0", "aoa/angle"), None);
    }

    #[test]
    fn rejects_topic_with_extra_segments() {
        assert_eq!(parse_angle_topic("aoa/angle/loc0/tagA/extra", "aoa/angle"), None);
    }

    #[test]
    fn builds_position_topic() {
        assert_eq!(position_topic("aoa/position", "ml1", "tagA"), "aoa/position/ml1/tagA");
    }
}
