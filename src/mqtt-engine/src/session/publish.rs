// Copyright 2023 RobustMQ Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! PUBLISH / PUBACK / PUBREC / PUBREL / PUBCOMP handling (§4.4, §4.6).
//! Topic resolution and the QoS handshake stay here; matching against the
//! `SubscriptionIndex` and updating the `RetainedStore` are the caller's
//! job since both are shared across sessions (§9).

use super::MqttSession;
use crate::error::SessionError;
use crate::stored_message::StoredMessage;
use crate::subscription_index::validate_publish_topic;
use common_base::utils::time_util::EdgeTimestamp;
use protocol::mqtt::packet::Packet;
use protocol::mqtt::property::{Property, PropertyBag, PropertyId};
use protocol::mqtt::puback::Puback;
use protocol::mqtt::pubcomp::Pubcomp;
use protocol::mqtt::publish::Publish;
use protocol::mqtt::pubrec::Pubrec;
use protocol::mqtt::reason_code::AckReasonCode;
use protocol::ProtocolError;
use std::sync::Arc;

/// Outcome of accepting an incoming PUBLISH: the ack to send back on this
/// connection, and (outside QoS 2, before PUBREL) the message to fan out to
/// matching subscribers.
pub struct PublishAccepted {
    pub ack: Option<Packet>,
    pub fanout: Option<Arc<StoredMessage>>,
    pub topic: String,
}

impl MqttSession {
    /// Resolves the wire topic against the topic-alias table (§4.4) and
    /// validates it. Must run before subscription matching, since matching
    /// needs the resolved topic.
    pub fn resolve_publish_topic(&mut self, publish: &Publish) -> Result<String, SessionError> {
        let alias = publish.properties.get_int16(PropertyId::TopicAlias);
        let topic = match alias {
            Some(0) => {
                return Err(SessionError::Protocol(ProtocolError::TopicAliasInvalid));
            }
            Some(alias) if alias > self.max_topic_alias => {
                return Err(SessionError::Protocol(ProtocolError::TopicAliasInvalid));
            }
            Some(alias) => {
                if !publish.topic.is_empty() {
                    self.incoming_topic_aliases
                        .insert(alias, publish.topic.clone());
                    publish.topic.clone()
                } else {
                    self.incoming_topic_aliases
                        .get(&alias)
                        .cloned()
                        .ok_or_else(|| {
                            SessionError::Protocol(ProtocolError::protocol(
                                "topic alias used before being established",
                            ))
                        })?
                }
            }
            None => {
                if publish.topic.is_empty() {
                    return Err(SessionError::Protocol(ProtocolError::protocol(
                        "publish topic empty without a topic alias",
                    )));
                }
                publish.topic.clone()
            }
        };

        if let Some(limit) = self.config.message_size_limit {
            if publish.payload.len() as u32 > limit {
                return Err(SessionError::Protocol(ProtocolError::PacketTooLarge));
            }
        }
        validate_publish_topic(&topic)?;
        Ok(topic)
    }

    /// Applies the QoS-specific delivery algorithm for an already-resolved
    /// publish (§4.4 PUBLISH handling, §4.6).
    pub fn apply_publish(
        &mut self,
        publish: Publish,
        topic: String,
        has_subscribers: bool,
        now: EdgeTimestamp,
    ) -> PublishAccepted {
        let message_expiry_time = publish
            .properties
            .get_int32(PropertyId::MessageExpiryInterval)
            .map(|secs| now.plus_secs(secs as u64));

        let stored = Arc::new(StoredMessage {
            topic: topic.clone(),
            payload: publish.payload,
            qos: publish.qos,
            retain: publish.retain,
            source_client_id: self.client_id.clone(),
            source_mid: publish.mid.unwrap_or(0),
            message_expiry_time,
            properties: publish.properties,
        });

        match publish.qos {
            0 => PublishAccepted {
                ack: None,
                fanout: Some(stored),
                topic,
            },
            1 => {
                let mid = publish.mid.unwrap_or(0);
                let reason_code = if has_subscribers {
                    AckReasonCode::Success.as_u8()
                } else {
                    AckReasonCode::NoMatchingSubscribers.as_u8()
                };
                let reason_code = if self.protocol_version.is_v5() { reason_code } else { 0 };
                PublishAccepted {
                    ack: Some(Packet::Puback(Puback {
                        mid,
                        reason_code,
                        properties: PropertyBag::new(),
                    })),
                    fanout: Some(stored),
                    topic,
                }
            }
            _ => {
                let mid = publish.mid.unwrap_or(0);
                // A duplicate mid just gets PUBREC again; delivery happens
                // once, on PUBREL, either way.
                self.message_store.inbound_publish(mid, stored);
                let ack = Packet::Pubrec(Pubrec {
                    mid,
                    reason_code: AckReasonCode::Success.as_u8(),
                    properties: PropertyBag::new(),
                });
                PublishAccepted {
                    ack: Some(ack),
                    fanout: None,
                    topic,
                }
            }
        }
    }

    /// PUBREL received for an inbound QoS 2 message: release it for fanout
    /// and ack with PUBCOMP.
    pub fn handle_pubrel(&mut self, mid: u16) -> (Packet, Option<Arc<StoredMessage>>) {
        let released = self.message_store.release_pubrel(mid);
        let pubcomp = Packet::Pubcomp(Pubcomp {
            mid,
            reason_code: if released.is_some() {
                AckReasonCode::Success.as_u8()
            } else {
                AckReasonCode::PacketIdentifierNotFound.as_u8()
            },
            properties: PropertyBag::new(),
        });
        (pubcomp, released.map(|cm| cm.message))
    }

    /// PUBACK received for an outbound QoS 1 delivery this session made.
    /// Returns the next queued message to send, if one was freed up.
    pub fn handle_puback(&mut self, mid: u16) -> Option<Packet> {
        self.message_store.ack_puback(mid);
        self.promote_next_queued()
    }

    /// PUBREC received for an outbound QoS 2 delivery; replies with PUBREL.
    pub fn handle_pubrec(&mut self, mid: u16) -> Packet {
        self.message_store.pubrec_received(mid);
        Packet::Pubrel(protocol::mqtt::pubrel::Pubrel {
            mid,
            reason_code: AckReasonCode::Success.as_u8(),
            properties: PropertyBag::new(),
        })
    }

    /// PUBCOMP received for an outbound QoS 2 delivery this session made.
    pub fn handle_pubcomp(&mut self, mid: u16) -> Option<Packet> {
        self.message_store.ack_pubcomp(mid);
        self.promote_next_queued()
    }

    fn promote_next_queued(&mut self) -> Option<Packet> {
        let promoted = self.message_store.promote_queued()?;
        let mut properties = PropertyBag::new();
        if let Some(remaining) = promoted.message.remaining_expiry_secs(EdgeTimestamp::now()) {
            let _ = properties.add(Property::Int32(PropertyId::MessageExpiryInterval, remaining));
        }
        Some(Packet::Publish(Publish {
            dup: promoted.dup,
            qos: promoted.message.qos,
            retain: promoted.message.retain,
            topic: promoted.message.topic.clone(),
            mid: Some(promoted.mid),
            properties,
            payload: promoted.message.payload.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_base::config::broker::BrokerConfig;
    use protocol::mqtt::packet::ProtocolVersion;
    use bytes::Bytes;
    use std::sync::Arc as StdArc;

    fn session() -> MqttSession {
        let mut s = MqttSession::new(StdArc::new(BrokerConfig::default()));
        s.client_id = "pub1".into();
        s.protocol_version = ProtocolVersion::V5;
        s.max_topic_alias = 10;
        s
    }

    fn publish(topic: &str, qos: u8, mid: Option<u16>) -> Publish {
        Publish {
            dup: false,
            qos,
            retain: false,
            topic: topic.into(),
            mid,
            properties: PropertyBag::new(),
            payload: Bytes::from_static(b"x"),
        }
    }

    #[test]
    fn qos0_publish_produces_no_ack_but_fans_out() {
        let mut s = session();
        let topic = s.resolve_publish_topic(&publish("a/b", 0, None)).unwrap();
        let outcome = s.apply_publish(publish("a/b", 0, None), topic, true, EdgeTimestamp::now());
        assert!(outcome.ack.is_none());
        assert!(outcome.fanout.is_some());
    }

    #[test]
    fn qos1_no_subscribers_gets_no_matching_subscribers_reason() {
        let mut s = session();
        let topic = s.resolve_publish_topic(&publish("a/b", 1, Some(5))).unwrap();
        let outcome = s.apply_publish(publish("a/b", 1, Some(5)), topic, false, EdgeTimestamp::now());
        match outcome.ack.unwrap() {
            Packet::Puback(ack) => assert_eq!(ack.reason_code, AckReasonCode::NoMatchingSubscribers.as_u8()),
            _ => panic!("expected puback"),
        }
    }

    #[test]
    fn qos2_duplicate_does_not_redeliver() {
        let mut s = session();
        let topic = s.resolve_publish_topic(&publish("a/b", 2, Some(9))).unwrap();
        let first = s.apply_publish(publish("a/b", 2, Some(9)), topic.clone(), true, EdgeTimestamp::now());
        assert!(first.fanout.is_none());
        let second = s.apply_publish(publish("a/b", 2, Some(9)), topic, true, EdgeTimestamp::now());
        assert!(second.ack.is_some());
        assert!(second.fanout.is_none());

        let (pubcomp, fanout) = s.handle_pubrel(9);
        assert!(matches!(pubcomp, Packet::Pubcomp(_)));
        assert!(fanout.is_some());
        let (_, fanout_again) = s.handle_pubrel(9);
        assert!(fanout_again.is_none());
    }

    #[test]
    fn topic_alias_zero_is_rejected() {
        let mut s = session();
        let mut p = publish("", 0, None);
        p.properties
            .add(Property::Int16(PropertyId::TopicAlias, 0))
            .unwrap();
        assert!(s.resolve_publish_topic(&p).is_err());
    }

    #[test]
    fn topic_alias_resolves_on_second_use() {
        let mut s = session();
        let mut first = publish("a/b", 0, None);
        first.properties.add(Property::Int16(PropertyId::TopicAlias, 1)).unwrap();
        assert_eq!(s.resolve_publish_topic(&first).unwrap(), "a/b");

        let mut second = publish("", 0, None);
        second.properties.add(Property::Int16(PropertyId::TopicAlias, 1)).unwrap();
        assert_eq!(s.resolve_publish_topic(&second).unwrap(), "a/b");
    }

    #[test]
    fn qos1_puback_promotes_queued_message() {
        let mut s = session();
        s.message_store = crate::message_store::MessageStore::new(1, None, None, 10);
        let mid1 = s.message_store.next_mid();
        s.message_store
            .enqueue_outbound(
                StdArc::new(StoredMessage {
                    topic: "a".into(),
                    payload: Bytes::from_static(b"1"),
                    qos: 1,
                    retain: false,
                    source_client_id: "x".into(),
                    source_mid: 0,
                    message_expiry_time: None,
                    properties: PropertyBag::new(),
                }),
                1,
                mid1,
                EdgeTimestamp::now(),
            )
            .unwrap();
        let mid2 = s.message_store.next_mid();
        s.message_store
            .enqueue_outbound(
                StdArc::new(StoredMessage {
                    topic: "b".into(),
                    payload: Bytes::from_static(b"2"),
                    qos: 1,
                    retain: false,
                    source_client_id: "x".into(),
                    source_mid: 0,
                    message_expiry_time: None,
                    properties: PropertyBag::new(),
                }),
                1,
                mid2,
                EdgeTimestamp::now(),
            )
            .unwrap();

        let promoted = s.handle_puback(mid1);
        assert!(promoted.is_some());
    }
}
