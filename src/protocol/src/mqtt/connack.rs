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

use crate::error::ProtocolError;
use crate::mqtt::packet::ProtocolVersion;
use crate::mqtt::property::PropertyBag;
use crate::mqtt::reason_code::Command;
use crate::primitives::{read_u8, write_u8};
use bytes::Buf;

#[derive(Debug, Clone, PartialEq)]
pub struct Connack {
    pub session_present: bool,
    pub reason_code: u8,
    pub properties: PropertyBag,
}

impl Connack {
    pub fn decode(buf: &mut impl Buf, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let ack_flags = read_u8(buf)?;
        if ack_flags & 0xFE != 0 {
            return Err(ProtocolError::malformed("connack flags reserved bits set"));
        }
        let session_present = ack_flags & 0x01 != 0;
        let reason_code = read_u8(buf)?;
        let properties = if version.is_v5() {
            PropertyBag::decode(buf, Command::Connack)?
        } else {
            PropertyBag::new()
        };
        Ok(Connack {
            session_present,
            reason_code,
            properties,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>, version: ProtocolVersion) -> Result<(), ProtocolError> {
        write_u8(buf, if self.session_present { 0x01 } else { 0 });
        write_u8(buf, self.reason_code);
        if version.is_v5() {
            self.properties.encode(buf)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_v5_connack() {
        let original = Connack {
            session_present: false,
            reason_code: 0,
            properties: PropertyBag::new(),
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V5).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Connack::decode(&mut bytes, ProtocolVersion::V5).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn round_trips_v311_connack_with_session_present() {
        let original = Connack {
            session_present: true,
            reason_code: 0,
            properties: PropertyBag::new(),
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V311).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Connack::decode(&mut bytes, ProtocolVersion::V311).unwrap();
        assert_eq!(decoded, original);
    }
}
