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

//! CONNECT handling algorithm (§4.4 steps 1-11). Wire parsing already
//! happened in `protocol::mqtt::connect::Connect::decode`; this module only
//! does the session-level semantics: client-id policy, quota negotiation,
//! password check, and CONNACK construction.

use super::{MqttSession, SessionState};
use crate::auth::password::{check_password, CredentialRecord};
use common_base::utils::time_util::EdgeTimestamp;
use protocol::mqtt::connect::Connect;
use protocol::mqtt::connack::Connack;
use protocol::mqtt::packet::{Packet, ProtocolVersion};
use protocol::mqtt::property::{Property, PropertyBag, PropertyId};
use protocol::mqtt::reason_code::ConnectReasonCode;

pub struct ConnectResult {
    pub connack: Packet,
    pub accepted: bool,
}

impl MqttSession {
    /// Runs the full CONNECT algorithm. `prior_session_existed` tells
    /// whether the caller's session registry already held a session for
    /// this client id (used for `session_present` and takeover, step 10);
    /// the caller is responsible for actually dropping that connection and
    /// for clearing the `SubscriptionIndex`/outbound queue when
    /// `clean_start` is set.
    pub fn handle_connect(
        &mut self,
        mut connect: Connect,
        prior_session_existed: bool,
        credential_records: &[CredentialRecord],
    ) -> ConnectResult {
        self.protocol_version = connect.protocol_version;
        let version = connect.protocol_version;

        // step 3: v3 clean_start=false sessions never expire on their own.
        self.session_expiry_interval = if version == ProtocolVersion::V3 && !connect.clean_start {
            u32::MAX
        } else {
            connect
                .properties
                .get_int32(PropertyId::SessionExpiryInterval)
                .unwrap_or(0)
        };
        self.clean_start = connect.clean_start;
        // step 4: keepalive is clamped to the server's maximum; `keepalive_enforced`
        // records whether the client actually asked for more than that, which
        // gates whether ServerKeepAlive is reported back below.
        self.keepalive = connect.keepalive.min(self.config.max_keepalive);
        let keepalive_enforced = connect.keepalive > self.config.max_keepalive;
        self.last_activity = EdgeTimestamp::now();

        // step 5: empty client id policy.
        let mut assigned_client_id = false;
        if connect.client_id.is_empty() {
            if version == ProtocolVersion::V3 {
                return self.reject(version, ConnectReasonCode::ClientIdentifierNotValid);
            }
            if !self.config.allow_zero_length_clientid {
                return self.reject(version, ConnectReasonCode::ClientIdentifierNotValid);
            }
            connect.client_id = uuid::Uuid::new_v4().to_string();
            assigned_client_id = true;
        }

        // step 6: use_username_as_clientid.
        if self.config.use_username_as_clientid {
            match &connect.username {
                Some(username) if !username.is_empty() => {
                    connect.client_id = username.clone();
                    assigned_client_id = false;
                }
                _ => return self.reject(version, ConnectReasonCode::NotAuthorized),
            }
        }

        // step 7: retain-not-available + will_retain.
        if !self.config.retain_available {
            if let Some(will) = &connect.will {
                if will.retain {
                    return self.reject(version, ConnectReasonCode::RetainNotSupported);
                }
            }
        }

        // step 8: will_qos > max_qos.
        if let Some(will) = &connect.will {
            if will.qos > self.config.max_qos {
                return self.reject(version, ConnectReasonCode::QosNotSupported);
            }
        }

        // step 9: password check.
        let password = connect
            .password
            .as_ref()
            .and_then(|p| std::str::from_utf8(p).ok());
        if !check_password(password, credential_records, self.config.allow_anonymous) {
            return self.reject(version, ConnectReasonCode::BadUsernameOrPassword);
        }

        self.client_id = connect.client_id;
        self.assigned_client_id = assigned_client_id;
        self.will = connect.will;
        self.max_qos = self.config.max_qos;
        self.max_topic_alias = self.config.max_topic_alias;
        self.maximum_packet_size = self.config.max_packet_size;
        if let Some(receive_max) = connect.properties.get_int16(PropertyId::ReceiveMaximum) {
            self.message_store = crate::message_store::MessageStore::new(
                receive_max.min(self.config.max_inflight_messages),
                self.config.max_inflight_bytes.map(|v| v as usize),
                self.config.max_queued_bytes.map(|v| v as usize),
                self.config.max_queued_messages as usize,
            );
        }
        self.connected = true;
        self.state = SessionState::WaitingFrameHeader;

        // step 11: CONNACK.
        let session_present = prior_session_existed && !self.clean_start;
        let mut properties = PropertyBag::new();
        if version.is_v5() {
            if self.config.max_qos < 2 {
                let _ = properties.add(Property::Byte(PropertyId::MaximumQos, self.config.max_qos));
            }
            if !self.config.retain_available {
                let _ = properties.add(Property::Byte(PropertyId::RetainAvailable, 0));
            }
            if let Some(max_packet_size) = self.config.max_packet_size {
                let _ = properties.add(Property::Int32(PropertyId::MaximumPacketSize, max_packet_size));
            }
            let _ = properties.add(Property::Int16(
                PropertyId::ReceiveMaximum,
                self.config.max_inflight_messages,
            ));
            if keepalive_enforced {
                let _ = properties.add(Property::Int16(PropertyId::ServerKeepAlive, self.keepalive));
            }
            let _ = properties.add(Property::Int16(PropertyId::TopicAliasMaximum, self.max_topic_alias));
            if assigned_client_id {
                let _ = properties.add(Property::String(
                    PropertyId::AssignedClientIdentifier,
                    self.client_id.clone(),
                ));
            }
        }

        ConnectResult {
            connack: Packet::Connack(Connack {
                session_present,
                reason_code: ConnectReasonCode::Success.as_v5_or_v3(version),
                properties,
            }),
            accepted: true,
        }
    }

    fn reject(&mut self, version: ProtocolVersion, reason: ConnectReasonCode) -> ConnectResult {
        self.state = SessionState::Disconnected;
        self.connected = false;
        ConnectResult {
            connack: Packet::Connack(Connack {
                session_present: false,
                reason_code: reason.as_v5_or_v3(version),
                properties: PropertyBag::new(),
            }),
            accepted: false,
        }
    }
}

trait ReasonCodeForVersion {
    fn as_v5_or_v3(self, version: ProtocolVersion) -> u8;
}

impl ReasonCodeForVersion for ConnectReasonCode {
    fn as_v5_or_v3(self, version: ProtocolVersion) -> u8 {
        if version.is_v5() {
            self.as_u8()
        } else {
            self.as_v3_return_code()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MqttSession;
    use bytes::Bytes;
    use common_base::config::broker::BrokerConfig;
    use protocol::mqtt::connect::Will;
    use std::sync::Arc;

    fn connect(version: ProtocolVersion, client_id: &str) -> Connect {
        Connect {
            protocol_version: version,
            is_bridge: false,
            clean_start: true,
            keepalive: 60,
            properties: PropertyBag::new(),
            client_id: client_id.to_string(),
            will: None,
            username: None,
            password: None,
        }
    }

    #[test]
    fn accepts_plain_connect() {
        let mut session = MqttSession::new(Arc::new(BrokerConfig::default()));
        let result = session.handle_connect(connect(ProtocolVersion::V311, "device-1"), false, &[]);
        assert!(result.accepted);
        assert!(session.connected);
        assert_eq!(session.client_id, "device-1");
    }

    #[test]
    fn generates_client_id_when_allowed() {
        let mut config = BrokerConfig::default();
        config.allow_zero_length_clientid = true;
        let mut session = MqttSession::new(Arc::new(config));
        let result = session.handle_connect(connect(ProtocolVersion::V311, ""), false, &[]);
        assert!(result.accepted);
        assert!(session.assigned_client_id);
        assert!(!session.client_id.is_empty());
    }

    #[test]
    fn rejects_empty_client_id_by_default() {
        let mut session = MqttSession::new(Arc::new(BrokerConfig::default()));
        let result = session.handle_connect(connect(ProtocolVersion::V311, ""), false, &[]);
        assert!(!result.accepted);
        assert!(!session.connected);
    }

    #[test]
    fn rejects_will_qos_above_server_max() {
        let mut config = BrokerConfig::default();
        config.max_qos = 1;
        let mut session = MqttSession::new(Arc::new(config));
        let mut c = connect(ProtocolVersion::V5, "device-1");
        c.will = Some(Will {
            properties: PropertyBag::new(),
            topic: "status".into(),
            payload: Bytes::from_static(b"down"),
            qos: 2,
            retain: false,
        });
        let result = session.handle_connect(c, false, &[]);
        assert!(!result.accepted);
    }

    #[test]
    fn keepalive_is_clamped_and_reported_when_enforced() {
        let mut config = BrokerConfig::default();
        config.max_keepalive = 40;
        let mut session = MqttSession::new(Arc::new(config));
        let mut c = connect(ProtocolVersion::V5, "device-1");
        c.keepalive = 60;
        let result = session.handle_connect(c, false, &[]);
        assert_eq!(session.keepalive, 40);
        match result.connack {
            Packet::Connack(ack) => {
                let server_keepalive = ack
                    .properties
                    .get_int16(PropertyId::ServerKeepAlive)
                    .expect("server keepalive reported when enforced");
                assert_eq!(server_keepalive, 40);
            }
            _ => panic!("expected connack"),
        }
    }

    #[test]
    fn keepalive_within_server_max_is_not_reported() {
        let mut config = BrokerConfig::default();
        config.max_keepalive = 40;
        let mut session = MqttSession::new(Arc::new(config));
        let mut c = connect(ProtocolVersion::V5, "device-1");
        c.keepalive = 30;
        let result = session.handle_connect(c, false, &[]);
        assert_eq!(session.keepalive, 30);
        match result.connack {
            Packet::Connack(ack) => {
                assert!(ack.properties.get_int16(PropertyId::ServerKeepAlive).is_none());
            }
            _ => panic!("expected connack"),
        }
    }

    #[test]
    fn session_present_true_only_without_clean_start_and_prior_session() {
        let mut session = MqttSession::new(Arc::new(BrokerConfig::default()));
        let mut c = connect(ProtocolVersion::V311, "device-1");
        c.clean_start = false;
        let result = session.handle_connect(c, true, &[]);
        match result.connack {
            Packet::Connack(ack) => assert!(ack.session_present),
            _ => panic!("expected connack"),
        }
    }
}
