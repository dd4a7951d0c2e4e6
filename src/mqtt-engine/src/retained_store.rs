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

//! Retained-message table (§3, §9 Open Question: retained messages are
//! process-local and non-persistent, lost on restart). Shared across every
//! session, so it's backed by `DashMap` rather than living inside a single
//! session's state the way `SubscriptionIndex` does.

use crate::stored_message::StoredMessage;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct RetainedStore {
    by_topic: DashMap<String, Arc<StoredMessage>>,
}

impl RetainedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zero-length retained payload clears the topic instead of storing
    /// an empty message (MQTT retained-message semantics).
    pub fn publish(&self, message: Arc<StoredMessage>) {
        if message.payload.is_empty() {
            self.by_topic.remove(&message.topic);
        } else {
            self.by_topic.insert(message.topic.clone(), message);
        }
    }

    pub fn get(&self, topic: &str) -> Option<Arc<StoredMessage>> {
        self.by_topic.get(topic).map(|entry| entry.value().clone())
    }

    /// All retained messages whose topic matches `filter` (§4.4 SUBSCRIBE:
    /// retained replay on subscribe uses the same wildcard rules as a
    /// publish match).
    pub fn matching(&self, filter: &str) -> Vec<Arc<StoredMessage>> {
        self.by_topic
            .iter()
            .filter(|entry| crate::subscription_index::topic_matches_filter(entry.key(), filter))
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use protocol::mqtt::PropertyBag;

    fn msg(topic: &str, payload: &'static [u8]) -> Arc<StoredMessage> {
        Arc::new(StoredMessage {
            topic: topic.into(),
            payload: Bytes::from_static(payload),
            qos: 0,
            retain: true,
            source_client_id: "pub1".into(),
            source_mid: 0,
            message_expiry_time: None,
            properties: PropertyBag::new(),
        })
    }

    #[test]
    fn stores_and_retrieves_by_topic() {
        let store = RetainedStore::new();
        store.publish(msg("a/b", b"hello"));
        assert_eq!(store.get("a/b").unwrap().payload, Bytes::from_static(b"hello"));
    }

    #[test]
    fn empty_payload_clears_the_topic() {
        let store = RetainedStore::new();
        store.publish(msg("a/b", b"hello"));
        store.publish(msg("a/b", b""));
        assert!(store.get("a/b").is_none());
    }

    #[test]
    fn matching_respects_wildcards() {
        let store = RetainedStore::new();
        store.publish(msg("a/b", b"1"));
        store.publish(msg("a/c", b"2"));
        assert_eq!(store.matching("a/+").len(), 2);
        assert_eq!(store.matching("a/b").len(), 1);
    }
}
