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

//! Wire-level error taxonomy, §7. Every decode operation is total: on any
//! under-read it returns `MalformedPacket` without consuming bytes beyond
//! the point of failure (the caller holds the buffer, we never partially
//! advance it on error).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("not authorized")]
    NotAuthorized,

    #[error("requested qos not supported by server")]
    QosNotSupported,

    #[error("retain not supported by server")]
    RetainNotSupported,

    #[error("topic alias invalid")]
    TopicAliasInvalid,

    #[error("packet exceeds configured size limit")]
    PacketTooLarge,

    #[error("unspecified internal error: {0}")]
    Unspecified(String),

    #[error("out of memory")]
    Nomem,
}

impl ProtocolError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ProtocolError::MalformedPacket(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        ProtocolError::Protocol(msg.into())
    }

    /// MQTT 5 DISCONNECT reason code for this error, per §7. Errors with no
    /// assigned v5 reason (e.g. `Nomem`) fall back to Unspecified error
    /// (0x80).
    pub fn v5_disconnect_reason(&self) -> u8 {
        match self {
            ProtocolError::MalformedPacket(_) => 0x81,
            ProtocolError::Protocol(_) => 0x82,
            ProtocolError::NotAuthorized => 0x87,
            ProtocolError::QosNotSupported => 0x9B,
            ProtocolError::RetainNotSupported => 0x9A,
            ProtocolError::TopicAliasInvalid => 0x94,
            ProtocolError::PacketTooLarge => 0x95,
            ProtocolError::Unspecified(_) | ProtocolError::Nomem => 0x80,
        }
    }

    /// MQTT 3.x CONNACK return code for this error when it occurs during
    /// CONNECT handling (§4.4 step 9, §7).
    pub fn v3_connack_reason(&self) -> u8 {
        match self {
            ProtocolError::NotAuthorized => 5,
            ProtocolError::QosNotSupported | ProtocolError::RetainNotSupported => 5,
            _ => 2,
        }
    }
}
