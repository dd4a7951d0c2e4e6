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

//! End-to-end exercises across sessions, the shared `SubscriptionIndex` and
//! `RetainedStore` (§8 testable properties 1-4).

use bytes::Bytes;
use common_base::config::broker::BrokerConfig;
use common_base::utils::time_util::EdgeTimestamp;
use mqtt_engine::retained_store::RetainedStore;
use mqtt_engine::session::{Delivery, MqttSession};
use mqtt_engine::subscription_index::SubscriptionIndex;
use protocol::mqtt::connect::Connect;
use protocol::mqtt::packet::{Packet, ProtocolVersion};
use protocol::mqtt::property::PropertyBag;
use protocol::mqtt::publish::Publish;
use protocol::mqtt::subscribe::{RetainHandling, Subscribe, SubscribeFilter};
use std::sync::Arc;

fn connect_packet(client_id: &str) -> Connect {
    Connect {
        protocol_version: ProtocolVersion::V5,
        is_bridge: false,
        clean_start: true,
        keepalive: 30,
        properties: PropertyBag::new(),
        client_id: client_id.to_string(),
        will: None,
        username: None,
        password: None,
    }
}

fn connected_session(client_id: &str) -> MqttSession {
    let mut session = MqttSession::new(Arc::new(BrokerConfig::default()));
    let result = session.handle_connect(connect_packet(client_id), false, &[]);
    assert!(result.accepted);
    session
}

#[test]
fn publish_qos0_fans_out_to_a_matching_subscriber() {
    let mut index = SubscriptionIndex::new();
    let mut publisher = connected_session("pub1");
    let mut subscriber = connected_session("sub1");

    let subscribe = Subscribe {
        mid: 1,
        properties: PropertyBag::new(),
        filters: vec![SubscribeFilter {
            topic_filter: "sensors/+/temp".into(),
            qos: 0,
            no_local: false,
            retain_as_published: false,
            retain_handling: RetainHandling::SendOnSubscribe,
        }],
    };
    let retained = RetainedStore::new();
    let outcome = subscriber.handle_subscribe(subscribe, &mut index, &retained).unwrap();
    for subscription in outcome.accepted {
        index.subscribe(subscription).unwrap();
    }

    let publish = Publish {
        dup: false,
        qos: 0,
        retain: false,
        topic: "sensors/kitchen/temp".into(),
        mid: None,
        properties: PropertyBag::new(),
        payload: Bytes::from_static(b"21.5"),
    };
    let topic = publisher.resolve_publish_topic(&publish).unwrap();
    let matches = index.matching(&topic);
    let has_subscribers = !matches.is_empty();
    let subscription = matches[0].clone();
    let accepted = publisher.apply_publish(publish, topic, has_subscribers, EdgeTimestamp::now());
    assert!(accepted.ack.is_none());
    let stored = accepted.fanout.unwrap();

    let delivery = Delivery {
        client_id: subscription.client_id.clone(),
        message: stored,
        qos: subscription.qos,
        subscription_identifier: subscription.subscription_identifier,
        retain_as_published: subscription.retain_as_published,
    };
    let outbound = subscriber.receive_delivery(delivery).unwrap();
    match outbound {
        Packet::Publish(p) => {
            assert_eq!(p.topic, "sensors/kitchen/temp");
            assert_eq!(p.payload, Bytes::from_static(b"21.5"));
            assert_eq!(p.qos, 0);
        }
        _ => panic!("expected publish"),
    }
}

#[test]
fn qos1_publish_with_no_subscribers_reports_no_matching_subscribers() {
    let index = SubscriptionIndex::new();
    let mut publisher = connected_session("pub1");
    let publish = Publish {
        dup: false,
        qos: 1,
        retain: false,
        topic: "alerts/fire".into(),
        mid: Some(9),
        properties: PropertyBag::new(),
        payload: Bytes::from_static(b"!"),
    };
    let topic = publisher.resolve_publish_topic(&publish).unwrap();
    let has_subscribers = !index.matching(&topic).is_empty();
    let accepted = publisher.apply_publish(publish, topic, has_subscribers, EdgeTimestamp::now());
    match accepted.ack.unwrap() {
        Packet::Puback(ack) => assert_eq!(ack.reason_code, 0x10),
        _ => panic!("expected puback"),
    }
}

#[test]
fn retained_message_is_replayed_on_subscribe() {
    let retained = RetainedStore::new();
    let mut publisher = connected_session("pub1");
    let publish = Publish {
        dup: false,
        qos: 0,
        retain: true,
        topic: "status/device-1".into(),
        mid: None,
        properties: PropertyBag::new(),
        payload: Bytes::from_static(b"online"),
    };
    let topic = publisher.resolve_publish_topic(&publish).unwrap();
    let accepted = publisher.apply_publish(publish, topic, false, EdgeTimestamp::now());
    retained.publish(accepted.fanout.unwrap());

    let matches = retained.matching("status/+");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].payload, Bytes::from_static(b"online"));
}

#[test]
fn subscribe_replays_retained_message_through_handle_subscribe() {
    let retained = RetainedStore::new();
    let mut index = SubscriptionIndex::new();
    let mut publisher = connected_session("pub1");
    let mut subscriber = connected_session("sub1");

    let publish = Publish {
        dup: false,
        qos: 0,
        retain: true,
        topic: "status/device-1".into(),
        mid: None,
        properties: PropertyBag::new(),
        payload: Bytes::from_static(b"online"),
    };
    let topic = publisher.resolve_publish_topic(&publish).unwrap();
    let accepted = publisher.apply_publish(publish, topic, false, EdgeTimestamp::now());
    retained.publish(accepted.fanout.unwrap());

    let subscribe = Subscribe {
        mid: 1,
        properties: PropertyBag::new(),
        filters: vec![SubscribeFilter {
            topic_filter: "status/+".into(),
            qos: 0,
            no_local: false,
            retain_as_published: false,
            retain_handling: RetainHandling::SendOnSubscribe,
        }],
    };
    let outcome = subscriber.handle_subscribe(subscribe, &mut index, &retained).unwrap();
    assert_eq!(outcome.retained_replay.len(), 1);
    match &outcome.retained_replay[0] {
        Packet::Publish(p) => {
            assert_eq!(p.topic, "status/device-1");
            assert_eq!(p.payload, Bytes::from_static(b"online"));
            assert!(p.retain);
        }
        _ => panic!("expected publish"),
    }
}

#[test]
fn qos2_handshake_completes_end_to_end_before_fanout() {
    let mut index = SubscriptionIndex::new();
    let mut publisher = connected_session("pub1");
    let mut subscriber = connected_session("sub1");

    let subscribe = Subscribe {
        mid: 1,
        properties: PropertyBag::new(),
        filters: vec![SubscribeFilter {
            topic_filter: "cmd/lock".into(),
            qos: 2,
            no_local: false,
            retain_as_published: false,
            retain_handling: RetainHandling::SendOnSubscribe,
        }],
    };
    let retained = RetainedStore::new();
    let outcome = subscriber.handle_subscribe(subscribe, &mut index, &retained).unwrap();
    for subscription in outcome.accepted {
        index.subscribe(subscription).unwrap();
    }

    let publish = Publish {
        dup: false,
        qos: 2,
        retain: false,
        topic: "cmd/lock".into(),
        mid: Some(42),
        properties: PropertyBag::new(),
        payload: Bytes::from_static(b"engage"),
    };
    let topic = publisher.resolve_publish_topic(&publish).unwrap();
    let first = publisher.apply_publish(publish.clone(), topic.clone(), true, EdgeTimestamp::now());
    assert!(matches!(first.ack.unwrap(), Packet::Pubrec(_)));
    assert!(first.fanout.is_none());

    // duplicate before PUBREL: PUBREC again, still no fanout.
    let duplicate = publisher.apply_publish(publish, topic.clone(), true, EdgeTimestamp::now());
    assert!(matches!(duplicate.ack.unwrap(), Packet::Pubrec(_)));
    assert!(duplicate.fanout.is_none());

    let (pubcomp, released) = publisher.handle_pubrel(42);
    assert!(matches!(pubcomp, Packet::Pubcomp(_)));
    let stored = released.unwrap();

    let matches = index.matching(&topic);
    assert_eq!(matches.len(), 1);
    let delivery = Delivery {
        client_id: matches[0].client_id.clone(),
        message: stored,
        qos: matches[0].qos,
        subscription_identifier: matches[0].subscription_identifier,
        retain_as_published: matches[0].retain_as_published,
    };
    let outbound = subscriber.receive_delivery(delivery).unwrap();
    match outbound {
        Packet::Publish(p) => assert_eq!(p.qos, 2),
        _ => panic!("expected publish"),
    }
}
