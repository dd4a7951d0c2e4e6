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

//! `StoredMessage` is the single owned copy of a PUBLISH payload; every
//! subscriber's delivery record (`ClientMessage`) holds a reference rather
//! than a duplicate (§5, §9). The graph sender → StoredMessage ← many
//! ClientMessage is acyclic, so `Arc` is the right primitive; there are no
//! back-pointers from StoredMessage to its ClientMessages.

use common_base::utils::time_util::EdgeTimestamp;
use protocol::mqtt::PropertyBag;
use bytes::Bytes;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub topic: String,
    pub payload: Bytes,
    pub qos: u8,
    pub retain: bool,
    pub source_client_id: String,
    pub source_mid: u16,
    /// Absolute expiry instant; `None` means the message never expires.
    pub message_expiry_time: Option<EdgeTimestamp>,
    pub properties: PropertyBag,
}

impl StoredMessage {
    pub fn is_expired(&self, now: EdgeTimestamp) -> bool {
        match self.message_expiry_time {
            Some(expiry) => now.to_secs() > expiry.to_secs(),
            None => false,
        }
    }

    /// Remaining seconds to report in an outbound `MessageExpiryInterval`
    /// property, clamped to zero.
    pub fn remaining_expiry_secs(&self, now: EdgeTimestamp) -> Option<u32> {
        self.message_expiry_time.map(|expiry| {
            expiry
                .to_secs()
                .saturating_sub(now.to_secs())
                .min(u32::MAX as u64) as u32
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

/// Delivery state of one `ClientMessage` (§3). QoS 0 deliveries are
/// transient: they're handed to the transport and immediately dropped
/// rather than tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    PublishQos0,
    PublishQos1,
    WaitForPuback,
    PublishQos2,
    WaitForPubrec,
    ResendPubrel,
    WaitForPubrel,
    WaitForPubcomp,
    Queued,
}

#[derive(Debug, Clone)]
pub struct ClientMessage {
    pub message: Arc<StoredMessage>,
    pub direction: Direction,
    pub state: DeliveryState,
    pub dup: bool,
    pub mid: u16,
    pub timestamp: EdgeTimestamp,
}

impl ClientMessage {
    pub fn new_outbound(message: Arc<StoredMessage>, mid: u16, state: DeliveryState) -> Self {
        ClientMessage {
            message,
            direction: Direction::Outbound,
            state,
            dup: false,
            mid,
            timestamp: EdgeTimestamp::now(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.message.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredMessage {
        StoredMessage {
            topic: "a/b".into(),
            payload: Bytes::from_static(b"x"),
            qos: 1,
            retain: false,
            source_client_id: "pub1".into(),
            source_mid: 1,
            message_expiry_time: None,
            properties: PropertyBag::new(),
        }
    }

    #[test]
    fn never_expires_without_expiry_time() {
        assert!(!sample().is_expired(EdgeTimestamp::now()));
    }

    #[test]
    fn expires_after_absolute_instant() {
        let mut msg = sample();
        msg.message_expiry_time = Some(EdgeTimestamp::zero());
        assert!(msg.is_expired(EdgeTimestamp::now()));
    }

    #[test]
    fn shared_ownership_drops_when_last_reference_goes() {
        let msg = Arc::new(sample());
        let cm1 = ClientMessage::new_outbound(msg.clone(), 1, DeliveryState::WaitForPuback);
        let cm2 = ClientMessage::new_outbound(msg.clone(), 2, DeliveryState::WaitForPuback);
        assert_eq!(Arc::strong_count(&msg), 3);
        drop(cm1);
        assert_eq!(Arc::strong_count(&msg), 2);
        drop(cm2);
        assert_eq!(Arc::strong_count(&msg), 1);
    }
}
