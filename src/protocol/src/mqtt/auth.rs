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

//! AUTH (MQTT 5 only). The wire format is parsed for completeness but no
//! SASL method is implemented; the session rejects any AUTH it receives
//! with a `Protocol` error (§9 open questions).

use crate::error::ProtocolError;
use crate::mqtt::packet::ProtocolVersion;
use crate::mqtt::property::PropertyBag;
use crate::mqtt::reason_code::Command;
use crate::primitives::{read_u8, write_u8};
use bytes::Buf;

#[derive(Debug, Clone, PartialEq)]
pub struct Auth {
    pub reason_code: u8,
    pub properties: PropertyBag,
}

impl Auth {
    pub fn decode(
        buf: &mut impl Buf,
        remaining_len: usize,
        version: ProtocolVersion,
    ) -> Result<Self, ProtocolError> {
        if !version.is_v5() {
            return Err(ProtocolError::protocol("AUTH is not valid before mqtt 5"));
        }
        if remaining_len == 0 {
            return Ok(Auth {
                reason_code: 0,
                properties: PropertyBag::new(),
            });
        }
        let reason_code = read_u8(buf)?;
        let properties = if remaining_len > 1 {
            PropertyBag::decode(buf, Command::Auth)?
        } else {
            PropertyBag::new()
        };
        Ok(Auth {
            reason_code,
            properties,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>, _version: ProtocolVersion) -> Result<(), ProtocolError> {
        if self.reason_code != 0 || !self.properties.is_empty() {
            write_u8(buf, self.reason_code);
            if !self.properties.is_empty() {
                self.properties.encode(buf)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn rejects_auth_before_v5() {
        let mut buf = BytesMut::new();
        assert!(Auth::decode(&mut buf, 0, ProtocolVersion::V311).is_err());
    }

    #[test]
    fn round_trips_v5_auth() {
        let original = Auth {
            reason_code: 0x18,
            properties: PropertyBag::new(),
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V5).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Auth::decode(&mut bytes, buf.len(), ProtocolVersion::V5).unwrap();
        assert_eq!(decoded, original);
    }
}
