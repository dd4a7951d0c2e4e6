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

//! CONNECT packet wire format (§4.4 steps 1-4). Business rules (empty
//! client-id policy, session takeover, password check) live in the engine;
//! this module only knows how to read and write the bytes.

use crate::error::ProtocolError;
use crate::mqtt::packet::ProtocolVersion;
use crate::mqtt::reason_code::Command;
use crate::mqtt::property::PropertyBag;
use crate::primitives::{read_binary, read_string, read_u16, read_u8, write_binary, write_string, write_u16, write_u8};
use bytes::{Buf, Bytes};

#[derive(Debug, Clone, PartialEq)]
pub struct Will {
    pub properties: PropertyBag,
    pub topic: String,
    pub payload: Bytes,
    pub qos: u8,
    pub retain: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connect {
    pub protocol_version: ProtocolVersion,
    pub is_bridge: bool,
    pub clean_start: bool,
    pub keepalive: u16,
    pub properties: PropertyBag,
    pub client_id: String,
    pub will: Option<Will>,
    pub username: Option<String>,
    pub password: Option<Bytes>,
}

impl Connect {
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let protocol_name = read_string(buf)?;
        let level_byte = read_u8(buf)?;
        let level = level_byte & 0x7F;
        let is_bridge = level_byte & 0x80 != 0;

        let protocol_version = match (protocol_name.as_str(), level) {
            ("MQIsdp", 3) => ProtocolVersion::V3,
            ("MQTT", 4) => ProtocolVersion::V311,
            ("MQTT", 5) => ProtocolVersion::V5,
            _ => {
                return Err(ProtocolError::protocol(format!(
                    "unsupported protocol name/level {protocol_name:?}/{level}"
                )))
            }
        };

        let flags = read_u8(buf)?;
        if protocol_version != ProtocolVersion::V3 && flags & 0x01 != 0 {
            return Err(ProtocolError::malformed("connect flags reserved bit set"));
        }
        let clean_start = flags & 0x02 != 0;
        let will_flag = flags & 0x04 != 0;
        let will_qos = (flags & 0x18) >> 3;
        let will_retain = flags & 0x20 != 0;
        let password_flag = flags & 0x40 != 0;
        let username_flag = flags & 0x80 != 0;
        if will_qos == 3 {
            return Err(ProtocolError::malformed("will qos 3 is reserved"));
        }

        let keepalive = read_u16(buf)?;

        let properties = if protocol_version.is_v5() {
            PropertyBag::decode(buf, Command::Connect)?
        } else {
            PropertyBag::new()
        };

        let client_id = read_string(buf)?;

        let will = if will_flag {
            let will_properties = if protocol_version.is_v5() {
                PropertyBag::decode(buf, Command::Will)?
            } else {
                PropertyBag::new()
            };
            let topic = read_string(buf)?;
            let payload = read_binary(buf)?;
            Some(Will {
                properties: will_properties,
                topic,
                payload,
                qos: will_qos,
                retain: will_retain,
            })
        } else {
            None
        };

        let username = if username_flag {
            Some(read_string(buf)?)
        } else {
            None
        };
        let password = if password_flag {
            Some(read_binary(buf)?)
        } else {
            None
        };

        Ok(Connect {
            protocol_version,
            is_bridge,
            clean_start,
            keepalive,
            properties,
            client_id,
            will,
            username,
            password,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let (name, level) = match self.protocol_version {
            ProtocolVersion::V3 => ("MQIsdp", 3u8),
            ProtocolVersion::V311 => ("MQTT", 4),
            ProtocolVersion::V5 => ("MQTT", 5),
        };
        write_string(buf, name)?;
        write_u8(buf, level | if self.is_bridge { 0x80 } else { 0 });

        let mut flags = 0u8;
        if self.clean_start {
            flags |= 0x02;
        }
        if let Some(will) = &self.will {
            flags |= 0x04;
            flags |= will.qos << 3;
            if will.retain {
                flags |= 0x20;
            }
        }
        if self.password.is_some() {
            flags |= 0x40;
        }
        if self.username.is_some() {
            flags |= 0x80;
        }
        write_u8(buf, flags);
        write_u16(buf, self.keepalive);

        if self.protocol_version.is_v5() {
            self.properties.encode(buf)?;
        }
        write_string(buf, &self.client_id)?;

        if let Some(will) = &self.will {
            if self.protocol_version.is_v5() {
                will.properties.encode(buf)?;
            }
            write_string(buf, &will.topic)?;
            write_binary(buf, &will.payload)?;
        }
        if let Some(username) = &self.username {
            write_string(buf, username)?;
        }
        if let Some(password) = &self.password {
            write_binary(buf, password)?;
        }
        Ok(())
    }
}
