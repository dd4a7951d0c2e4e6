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

//! Packet kind tags used by `PropertyBag`'s command-legality table (§4.3),
//! and the MQTT 5 reason codes each ack-style packet carries.

/// Every MQTT command that can carry a property set, plus the pseudo-command
/// `Will`, which gates `WillDelayInterval` and the per-will copies of the
/// publish-shaped properties embedded in CONNECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Connect,
    Connack,
    Publish,
    Puback,
    Pubrec,
    Pubrel,
    Pubcomp,
    Subscribe,
    Suback,
    Unsubscribe,
    Unsuback,
    Disconnect,
    Auth,
    Will,
}

/// CONNACK / v3 return codes (§7, §8 scenario 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectReasonCode {
    Success = 0,
    UnspecifiedError = 0x80,
    MalformedPacket = 0x81,
    ProtocolError = 0x82,
    NotAuthorized = 0x87,
    BadUsernameOrPassword = 0x86,
    ClientIdentifierNotValid = 0x85,
    UnsupportedProtocolVersion = 0x84,
    QosNotSupported = 0x9B,
    RetainNotSupported = 0x9A,
}

impl ConnectReasonCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The v3.1/v3.1.1 CONNACK return code equivalent, used when the
    /// session's negotiated protocol version predates MQTT 5 reason codes.
    pub fn as_v3_return_code(self) -> u8 {
        match self {
            ConnectReasonCode::Success => 0,
            ConnectReasonCode::UnsupportedProtocolVersion => 1,
            ConnectReasonCode::ClientIdentifierNotValid => 2,
            ConnectReasonCode::NotAuthorized | ConnectReasonCode::BadUsernameOrPassword => {
                if matches!(self, ConnectReasonCode::BadUsernameOrPassword) {
                    4
                } else {
                    5
                }
            }
            _ => 3,
        }
    }
}

/// PUBACK / PUBREC / PUBREL / PUBCOMP reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckReasonCode {
    Success = 0,
    NoMatchingSubscribers = 0x10,
    UnspecifiedError = 0x80,
    PacketIdentifierNotFound = 0x92,
}

impl AckReasonCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// SUBACK per-filter reason: granted QoS 0/1/2, or 0x80 on deny.
pub const SUBACK_FAILURE: u8 = 0x80;

/// UNSUBACK per-filter reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubackReasonCode {
    Success = 0,
    NoSubscriptionExisted = 0x11,
}

impl UnsubackReasonCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
