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

//! Maps topic filters to subscribers (§4.5). The source does exact string
//! comparison, which cannot express MQTT wildcard semantics; this is the
//! deliberate extension named in §9's design notes — a topic tree trie
//! matching `+` (single level) and `#` (terminal, multi-level).

use crate::error::SessionError;
use protocol::mqtt::subscribe::RetainHandling;
use protocol::ProtocolError;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub client_id: String,
    pub topic_filter: String,
    pub qos: u8,
    pub subscription_identifier: Option<u32>,
    pub no_local: bool,
    pub retain_as_published: bool,
    /// The SUBSCRIBE option governing retained-message replay for this
    /// filter (§4.4, §4.5): always / only-if-new / never.
    pub retain_handling: RetainHandling,
}

/// Validates a filter per `sub_topic_check` (§4.4): `+` only as a whole
/// level, `#` only as the final whole level.
pub fn validate_topic_filter(filter: &str) -> Result<(), SessionError> {
    if filter.is_empty() {
        return Err(SessionError::Protocol(ProtocolError::protocol(
            "topic filter must not be empty",
        )));
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (i, level) in levels.iter().enumerate() {
        if level.contains('+') && *level != "+" {
            return Err(SessionError::Protocol(ProtocolError::protocol(
                "'+' must occupy a whole topic level",
            )));
        }
        if level.contains('#') {
            if *level != "#" || i != levels.len() - 1 {
                return Err(SessionError::Protocol(ProtocolError::protocol(
                    "'#' must be the final whole topic level",
                )));
            }
        }
    }
    Ok(())
}

/// Matches a single concrete `topic` against a single `filter`, the same
/// rules `SubscriptionIndex::matching` applies via the trie (§4.5). Used
/// for retained-message replay on SUBSCRIBE, where there's one filter and
/// potentially many retained topics rather than the other way around.
pub fn topic_matches_filter(topic: &str, filter: &str) -> bool {
    let topic_levels: Vec<&str> = topic.split('/').collect();
    let filter_levels: Vec<&str> = filter.split('/').collect();
    let mut t = topic_levels.iter();
    for (i, f) in filter_levels.iter().enumerate() {
        if *f == "#" && i == filter_levels.len() - 1 {
            return true;
        }
        match t.next() {
            Some(level) if *f == "+" || f == level => continue,
            _ => return false,
        }
    }
    t.next().is_none()
}

/// Validates a concrete publish topic per `pub_topic_check` (§4.4): no
/// wildcards, bounded length, bounded hierarchy depth.
pub fn validate_publish_topic(topic: &str) -> Result<(), SessionError> {
    if topic.contains('+') || topic.contains('#') {
        return Err(SessionError::Protocol(ProtocolError::protocol(
            "publish topic must not contain wildcards",
        )));
    }
    if topic.len() > 65535 {
        return Err(SessionError::Protocol(ProtocolError::protocol(
            "publish topic exceeds 65535 bytes",
        )));
    }
    if topic.split('/').count() > 200 {
        return Err(SessionError::Protocol(ProtocolError::protocol(
            "publish topic exceeds 200 hierarchy levels",
        )));
    }
    Ok(())
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    /// Subscriptions whose filter ends exactly at this level.
    subscribers: HashMap<String, Subscription>,
    /// Subscriptions whose filter ends in `#` at this level: matches this
    /// node and everything beneath it.
    hash_subscribers: HashMap<String, Subscription>,
}

#[derive(Debug, Default)]
pub struct SubscriptionIndex {
    root: TrieNode,
    /// Per-client view, used by UNSUBSCRIBE and session teardown.
    by_client: HashMap<String, HashMap<String, Subscription>>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscription: Subscription) -> Result<(), SessionError> {
        validate_topic_filter(&subscription.topic_filter)?;
        let levels: Vec<&str> = subscription.topic_filter.split('/').collect();
        let mut node = &mut self.root;
        for (i, level) in levels.iter().enumerate() {
            let is_last = i == levels.len() - 1;
            if *level == "#" && is_last {
                node.hash_subscribers
                    .insert(subscription.client_id.clone(), subscription.clone());
                self.by_client
                    .entry(subscription.client_id.clone())
                    .or_default()
                    .insert(subscription.topic_filter.clone(), subscription);
                return Ok(());
            }
            node = node.children.entry((*level).to_string()).or_default();
        }
        node.subscribers
            .insert(subscription.client_id.clone(), subscription.clone());
        self.by_client
            .entry(subscription.client_id.clone())
            .or_default()
            .insert(subscription.topic_filter.clone(), subscription);
        Ok(())
    }

    /// Removes `(client_id, topic_filter)`. Returns `true` if a subscription
    /// existed.
    pub fn unsubscribe(&mut self, client_id: &str, topic_filter: &str) -> bool {
        let existed = self
            .by_client
            .get_mut(client_id)
            .map(|m| m.remove(topic_filter).is_some())
            .unwrap_or(false);
        if !existed {
            return false;
        }
        let levels: Vec<&str> = topic_filter.split('/').collect();
        let mut node = &mut self.root;
        for (i, level) in levels.iter().enumerate() {
            let is_last = i == levels.len() - 1;
            if *level == "#" && is_last {
                node.hash_subscribers.remove(client_id);
                return true;
            }
            match node.children.get_mut(*level) {
                Some(child) => node = child,
                None => return true,
            }
        }
        node.subscribers.remove(client_id);
        true
    }

    /// Drops every subscription belonging to `client_id`, used on session
    /// destruction.
    pub fn remove_client(&mut self, client_id: &str) {
        let filters: Vec<String> = self
            .by_client
            .get(client_id)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        for filter in filters {
            self.unsubscribe(client_id, &filter);
        }
        self.by_client.remove(client_id);
    }

    /// All subscriptions matching a concrete publish `topic` (§4.5).
    pub fn matching(&self, topic: &str) -> Vec<&Subscription> {
        let levels: Vec<&str> = topic.split('/').collect();
        let mut out = Vec::new();
        Self::walk(&self.root, &levels, &mut out);
        out
    }

    fn walk<'a>(node: &'a TrieNode, levels: &[&str], out: &mut Vec<&'a Subscription>) {
        out.extend(node.hash_subscribers.values());

        match levels.split_first() {
            None => {
                out.extend(node.subscribers.values());
            }
            Some((head, rest)) => {
                if let Some(child) = node.children.get(*head) {
                    Self::walk(child, rest, out);
                }
                if let Some(child) = node.children.get("+") {
                    Self::walk(child, rest, out);
                }
            }
        }
    }

    pub fn client_subscriptions(&self, client_id: &str) -> Vec<&Subscription> {
        self.by_client
            .get(client_id)
            .map(|m| m.values().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(client: &str, filter: &str) -> Subscription {
        Subscription {
            client_id: client.into(),
            topic_filter: filter.into(),
            qos: 1,
            subscription_identifier: None,
            no_local: false,
            retain_as_published: false,
            retain_handling: RetainHandling::SendOnSubscribe,
        }
    }

    #[test]
    fn exact_match() {
        let mut idx = SubscriptionIndex::new();
        idx.subscribe(sub("c1", "a/b")).unwrap();
        let matches = idx.matching("a/b");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].client_id, "c1");
        assert!(idx.matching("a/c").is_empty());
    }

    #[test]
    fn plus_matches_single_level_only() {
        let mut idx = SubscriptionIndex::new();
        idx.subscribe(sub("c1", "a/+/c")).unwrap();
        assert_eq!(idx.matching("a/b/c").len(), 1);
        assert!(idx.matching("a/b/x/c").is_empty());
    }

    #[test]
    fn hash_matches_multiple_levels() {
        let mut idx = SubscriptionIndex::new();
        idx.subscribe(sub("c1", "a/#")).unwrap();
        assert_eq!(idx.matching("a").len(), 1);
        assert_eq!(idx.matching("a/b").len(), 1);
        assert_eq!(idx.matching("a/b/c").len(), 1);
        assert!(idx.matching("x/y").is_empty());
    }

    #[test]
    fn unsubscribe_removes_from_trie_and_client_view() {
        let mut idx = SubscriptionIndex::new();
        idx.subscribe(sub("c1", "a/b")).unwrap();
        assert!(idx.unsubscribe("c1", "a/b"));
        assert!(idx.matching("a/b").is_empty());
        assert!(!idx.unsubscribe("c1", "a/b"));
    }

    #[test]
    fn remove_client_clears_all_its_subscriptions() {
        let mut idx = SubscriptionIndex::new();
        idx.subscribe(sub("c1", "a/b")).unwrap();
        idx.subscribe(sub("c1", "x/#")).unwrap();
        idx.remove_client("c1");
        assert!(idx.matching("a/b").is_empty());
        assert!(idx.matching("x/y").is_empty());
        assert!(idx.client_subscriptions("c1").is_empty());
    }

    #[test]
    fn rejects_malformed_filters() {
        assert!(validate_topic_filter("a+/b").is_err());
        assert!(validate_topic_filter("a/#/b").is_err());
        assert!(validate_topic_filter("a/b#").is_err());
        assert!(validate_topic_filter("a/+").is_ok());
        assert!(validate_topic_filter("a/#").is_ok());
    }

    #[test]
    fn topic_matches_filter_handles_wildcards() {
        assert!(topic_matches_filter("a/b", "a/+"));
        assert!(topic_matches_filter("a/b/c", "a/#"));
        assert!(!topic_matches_filter("a/b", "a/b/c"));
        assert!(!topic_matches_filter("x/y", "a/+"));
    }

    #[test]
    fn rejects_wildcards_in_publish_topic() {
        assert!(validate_publish_topic("a/+").is_err());
        assert!(validate_publish_topic("a/#").is_err());
        assert!(validate_publish_topic("a/b").is_ok());
    }
}
