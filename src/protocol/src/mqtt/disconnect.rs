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

//! DISCONNECT (§4.4). A v3.1.1 DISCONNECT is a bare zero-length packet; v5
//! adds an optional reason code and property set. `SessionExpiryInterval`
//! may only move nonzero→zero or stay put, never zero→nonzero; the session
//! enforces that rule since it alone knows the prior value.

use crate::error::ProtocolError;
use crate::mqtt::packet::ProtocolVersion;
use crate::mqtt::property::PropertyBag;
use crate::mqtt::reason_code::Command;
use crate::primitives::{read_u8, write_u8};
use bytes::Buf;

#[derive(Debug, Clone, PartialEq)]
pub struct Disconnect {
    pub reason_code: u8,
    pub properties: PropertyBag,
}

impl Disconnect {
    pub fn decode(
        buf: &mut impl Buf,
        remaining_len: usize,
        version: ProtocolVersion,
    ) -> Result<Self, ProtocolError> {
        if !version.is_v5() {
            if remaining_len != 0 {
                return Err(ProtocolError::malformed(
                    "disconnect must be zero-length before mqtt 5",
                ));
            }
            return Ok(Disconnect {
                reason_code: 0,
                properties: PropertyBag::new(),
            });
        }
        if remaining_len == 0 {
            return Ok(Disconnect {
                reason_code: 0,
                properties: PropertyBag::new(),
            });
        }
        let reason_code = read_u8(buf)?;
        let properties = if remaining_len > 1 {
            PropertyBag::decode(buf, Command::Disconnect)?
        } else {
            PropertyBag::new()
        };
        Ok(Disconnect {
            reason_code,
            properties,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>, version: ProtocolVersion) -> Result<(), ProtocolError> {
        if version.is_v5() && (self.reason_code != 0 || !self.properties.is_empty()) {
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
    fn v311_disconnect_is_empty() {
        let original = Disconnect {
            reason_code: 0,
            properties: PropertyBag::new(),
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V311).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn v5_disconnect_round_trips_reason() {
        let original = Disconnect {
            reason_code: 0x81,
            properties: PropertyBag::new(),
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V5).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Disconnect::decode(&mut bytes, buf.len(), ProtocolVersion::V5).unwrap();
        assert_eq!(decoded, original);
    }
}
