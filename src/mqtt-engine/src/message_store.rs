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

//! Per-session in-flight accounting for QoS 1/2 (§4.6).

use crate::stored_message::{ClientMessage, DeliveryState, StoredMessage};
use common_base::utils::time_util::EdgeTimestamp;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub struct MessageStore {
    /// Outbound deliveries: active (PublishQos0/WaitForPuback/...) plus
    /// `Queued` entries waiting for an in-flight slot.
    outbound: VecDeque<ClientMessage>,
    /// Inbound QoS 2 messages between PUBREC and PUBREL, keyed by mid.
    inbound: HashMap<u16, ClientMessage>,
    msgs_out_inflight_maximum: u16,
    max_inflight_bytes: Option<usize>,
    max_queued_bytes: Option<usize>,
    max_queued_messages: usize,
    next_mid: u16,
}

impl MessageStore {
    pub fn new(
        msgs_out_inflight_maximum: u16,
        max_inflight_bytes: Option<usize>,
        max_queued_bytes: Option<usize>,
        max_queued_messages: usize,
    ) -> Self {
        MessageStore {
            outbound: VecDeque::new(),
            inbound: HashMap::new(),
            msgs_out_inflight_maximum,
            max_inflight_bytes,
            max_queued_bytes,
            max_queued_messages,
            next_mid: 0,
        }
    }

    /// Per-client monotonic mid counter, wrapping `0 -> 1` (§4.5, §8
    /// invariant 7).
    pub fn next_mid(&mut self) -> u16 {
        self.next_mid = if self.next_mid == u16::MAX { 1 } else { self.next_mid + 1 };
        self.next_mid
    }

    fn inflight_count(&self) -> usize {
        self.outbound
            .iter()
            .filter(|m| m.state != DeliveryState::Queued)
            .count()
    }

    fn inflight_bytes(&self) -> usize {
        self.outbound
            .iter()
            .filter(|m| m.state != DeliveryState::Queued)
            .map(ClientMessage::byte_len)
            .sum()
    }

    fn queued_bytes(&self) -> usize {
        self.outbound
            .iter()
            .filter(|m| m.state == DeliveryState::Queued)
            .map(ClientMessage::byte_len)
            .sum()
    }

    fn queued_count(&self) -> usize {
        self.outbound
            .iter()
            .filter(|m| m.state == DeliveryState::Queued)
            .count()
    }

    /// Enqueues an outbound delivery for `qos`, applying expiry, quota and
    /// byte-budget policy (§4.6). Returns the `ClientMessage` actually
    /// stored, or `None` if it was dropped (expired, or over a byte
    /// budget).
    pub fn enqueue_outbound(
        &mut self,
        message: Arc<StoredMessage>,
        qos: u8,
        mid: u16,
        now: EdgeTimestamp,
    ) -> Option<ClientMessage> {
        if message.is_expired(now) {
            return None;
        }

        let initial_state = match qos {
            0 => DeliveryState::PublishQos0,
            1 => DeliveryState::WaitForPuback,
            _ => DeliveryState::WaitForPubrec,
        };

        if qos == 0 {
            return Some(ClientMessage::new_outbound(message, mid, initial_state));
        }

        let over_inflight_quota = self.inflight_count() >= self.msgs_out_inflight_maximum as usize;
        let state = if over_inflight_quota {
            DeliveryState::Queued
        } else {
            initial_state
        };

        let byte_len = message.payload.len();
        if state == DeliveryState::Queued {
            if let Some(limit) = self.max_queued_bytes {
                if self.queued_bytes() + byte_len > limit {
                    return None;
                }
            }
            if self.queued_count() >= self.max_queued_messages {
                return None;
            }
        } else if let Some(limit) = self.max_inflight_bytes {
            if self.inflight_bytes() + byte_len > limit {
                return None;
            }
        }

        let client_message = ClientMessage::new_outbound(message, mid, state);
        self.outbound.push_back(client_message.clone());
        Some(client_message)
    }

    /// Promotes the oldest `Queued` entry into an active in-flight slot,
    /// e.g. after a PUBACK/PUBCOMP frees one up. Returns it so the caller
    /// can (re)send it.
    pub fn promote_queued(&mut self) -> Option<ClientMessage> {
        if self.inflight_count() >= self.msgs_out_inflight_maximum as usize {
            return None;
        }
        let idx = self
            .outbound
            .iter()
            .position(|m| m.state == DeliveryState::Queued)?;
        if let Some(limit) = self.max_inflight_bytes {
            let byte_len = self.outbound[idx].message.payload.len();
            if self.inflight_bytes() + byte_len > limit {
                return None;
            }
        }
        let state = match self.outbound[idx].message.qos {
            1 => DeliveryState::WaitForPuback,
            _ => DeliveryState::WaitForPubrec,
        };
        self.outbound[idx].state = state;
        Some(self.outbound[idx].clone())
    }

    pub fn ack_puback(&mut self, mid: u16) -> bool {
        self.remove_outbound(mid, DeliveryState::WaitForPuback)
    }

    pub fn pubrec_received(&mut self, mid: u16) -> bool {
        match self
            .outbound
            .iter_mut()
            .find(|m| m.mid == mid && m.state == DeliveryState::WaitForPubrec)
        {
            Some(entry) => {
                entry.state = DeliveryState::WaitForPubcomp;
                true
            }
            None => false,
        }
    }

    pub fn ack_pubcomp(&mut self, mid: u16) -> bool {
        self.remove_outbound(mid, DeliveryState::WaitForPubcomp)
    }

    fn remove_outbound(&mut self, mid: u16, expected_state: DeliveryState) -> bool {
        if let Some(idx) = self
            .outbound
            .iter()
            .position(|m| m.mid == mid && m.state == expected_state)
        {
            self.outbound.remove(idx);
            true
        } else {
            false
        }
    }

    /// Records an inbound QoS 2 PUBLISH. Returns `true` if this is a replay
    /// of an already-tracked mid (the caller must resend PUBREC without
    /// re-delivering, §4.4).
    pub fn inbound_publish(&mut self, mid: u16, message: Arc<StoredMessage>) -> bool {
        if self.inbound.contains_key(&mid) {
            return true;
        }
        self.inbound.insert(
            mid,
            ClientMessage {
                message,
                direction: crate::stored_message::Direction::Inbound,
                state: DeliveryState::WaitForPubrel,
                dup: false,
                mid,
                timestamp: EdgeTimestamp::now(),
            },
        );
        false
    }

    /// Releases an inbound QoS 2 message on PUBREL, returning it for
    /// delivery to subscribers.
    pub fn release_pubrel(&mut self, mid: u16) -> Option<ClientMessage> {
        self.inbound.remove(&mid)
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    pub fn outbound_iter(&self) -> impl Iterator<Item = &ClientMessage> {
        self.outbound.iter()
    }
}
