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

//! `MqttSession`: the per-connection state machine (§4.4). A session never
//! reaches into another session's queues; cross-session delivery happens
//! through `Delivery` values the caller routes into each target session's
//! own `receive_delivery` (§5).

pub mod connect;
pub mod publish;
pub mod subscribe;

use crate::error::SessionError;
use crate::message_store::MessageStore;
use crate::stored_message::StoredMessage;
use common_base::config::broker::BrokerConfig;
use common_base::utils::time_util::EdgeTimestamp;
use protocol::mqtt::connect::Will;
use protocol::mqtt::disconnect::Disconnect;
use protocol::mqtt::packet::{Packet, ProtocolVersion};
use protocol::ProtocolError;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    WaitingFrameHeader,
    WaitingPayloadData,
}

/// A matched subscriber's copy of a published message, handed off by the
/// publishing session for the caller to route to the target session.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub client_id: String,
    pub message: Arc<StoredMessage>,
    pub qos: u8,
    pub subscription_identifier: Option<u32>,
    pub retain_as_published: bool,
}

pub struct MqttSession {
    pub state: SessionState,
    pub config: Arc<BrokerConfig>,
    pub protocol_version: ProtocolVersion,
    pub client_id: String,
    pub assigned_client_id: bool,
    pub clean_start: bool,
    pub keepalive: u16,
    pub session_expiry_interval: u32,
    pub will: Option<Will>,
    pub max_qos: u8,
    pub max_topic_alias: u16,
    pub maximum_packet_size: Option<u32>,
    pub message_store: MessageStore,
    /// Topic-alias table populated by incoming PUBLISH frames (§4.4).
    pub incoming_topic_aliases: HashMap<u16, String>,
    pub connected: bool,
    /// Timestamp of the last inbound frame, advanced by `record_activity`;
    /// the keepalive clock the 1.5x timeout in `check_keepalive_timeout`
    /// measures against (§4.4).
    pub last_activity: EdgeTimestamp,
}

impl MqttSession {
    pub fn new(config: Arc<BrokerConfig>) -> Self {
        let inflight_max = config.max_inflight_messages;
        let max_inflight_bytes = config.max_inflight_bytes.map(|v| v as usize);
        let max_queued_bytes = config.max_queued_bytes.map(|v| v as usize);
        let max_queued_messages = config.max_queued_messages as usize;
        MqttSession {
            state: SessionState::Disconnected,
            max_qos: config.max_qos,
            config,
            protocol_version: ProtocolVersion::V311,
            client_id: String::new(),
            assigned_client_id: false,
            clean_start: true,
            keepalive: 0,
            session_expiry_interval: 0,
            will: None,
            max_topic_alias: 0,
            maximum_packet_size: None,
            message_store: MessageStore::new(
                inflight_max,
                max_inflight_bytes,
                max_queued_bytes,
                max_queued_messages,
            ),
            incoming_topic_aliases: HashMap::new(),
            connected: false,
            last_activity: EdgeTimestamp::now(),
        }
    }

    pub fn on_transport_connected(&mut self) {
        self.state = SessionState::WaitingFrameHeader;
    }

    /// Marks `now` as the last time a frame was received from this client;
    /// the caller invokes this for every inbound frame, PINGREQ included
    /// (§4.4 keepalive).
    pub fn record_activity(&mut self, now: EdgeTimestamp) {
        self.last_activity = now;
    }

    /// Checks the 1.5x-keepalive idle timeout (§4.4). A `keepalive` of zero
    /// disables the check, per the MQTT spec. Callers invoke this
    /// periodically (e.g. on a timer tick); on timeout the session is
    /// failed and `SessionError::KeepAliveTimeout` is returned for the
    /// caller to translate into a DISCONNECT/connection drop.
    pub fn check_keepalive_timeout(&mut self, now: EdgeTimestamp) -> Result<(), SessionError> {
        if self.keepalive == 0 {
            return Ok(());
        }
        let timeout_secs = (u64::from(self.keepalive) * 3) / 2;
        if self.last_activity.plus_secs(timeout_secs).is_past(now) {
            let error = SessionError::KeepAliveTimeout;
            self.fail(&error);
            return Err(error);
        }
        Ok(())
    }

    pub fn on_transport_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
        self.connected = false;
    }

    pub fn fail(&mut self, error: &SessionError) {
        tracing::warn!(client_id = %self.client_id, error = %error, "session error, dropping connection");
        self.state = SessionState::Disconnected;
        self.connected = false;
    }

    /// Hands a matched publish to this session: assigns a fresh mid,
    /// enqueues it in this session's own `MessageStore`, and returns the
    /// PUBLISH packet to send on this session's transport (§4.5).
    pub fn receive_delivery(&mut self, delivery: Delivery) -> Option<Packet> {
        let effective_qos = delivery.qos.min(self.max_qos);
        let mid = if effective_qos > 0 {
            self.message_store.next_mid()
        } else {
            0
        };
        let now = common_base::utils::time_util::EdgeTimestamp::now();
        let client_message = self
            .message_store
            .enqueue_outbound(delivery.message.clone(), effective_qos, mid, now)?;

        let mut properties = protocol::mqtt::PropertyBag::new();
        if let Some(sub_id) = delivery.subscription_identifier {
            let _ = properties.add(protocol::mqtt::property::Property::VarInt(
                protocol::mqtt::property::PropertyId::SubscriptionIdentifier,
                sub_id,
            ));
        }
        if let Some(remaining) = delivery.message.remaining_expiry_secs(now) {
            let _ = properties.add(protocol::mqtt::property::Property::Int32(
                protocol::mqtt::property::PropertyId::MessageExpiryInterval,
                remaining,
            ));
        }

        Some(Packet::Publish(protocol::mqtt::publish::Publish {
            dup: client_message.dup,
            qos: effective_qos,
            retain: delivery.message.retain && delivery.retain_as_published,
            topic: delivery.message.topic.clone(),
            mid: if effective_qos > 0 { Some(mid) } else { None },
            properties,
            payload: delivery.message.payload.clone(),
        }))
    }

    pub fn handle_pingreq(&mut self, now: EdgeTimestamp) -> Packet {
        self.record_activity(now);
        Packet::Pingresp
    }

    /// DISCONNECT (§4.4). `SessionExpiryInterval` may move nonzero→zero or
    /// stay put; a zero→nonzero transition is a protocol violation the
    /// caller should treat as a dropped connection rather than a clean one.
    pub fn handle_disconnect(&mut self, disconnect: Disconnect) -> Result<(), SessionError> {
        if let Some(new_expiry) = disconnect
            .properties
            .get_int32(protocol::mqtt::property::PropertyId::SessionExpiryInterval)
        {
            if self.session_expiry_interval == 0 && new_expiry != 0 {
                return Err(SessionError::Protocol(ProtocolError::protocol(
                    "session expiry interval cannot move from zero to nonzero on disconnect",
                )));
            }
            self.session_expiry_interval = new_expiry;
        }
        self.state = SessionState::Disconnected;
        self.connected = false;
        Ok(())
    }
}
