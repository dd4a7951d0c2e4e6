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

//! PUBREL (§4.4 QoS 2 path, step 2). Fixed header flags MUST be `0010`.

use crate::error::ProtocolError;
use crate::mqtt::packet::ProtocolVersion;
use crate::mqtt::property::PropertyBag;
use crate::mqtt::reason_code::Command;
use crate::primitives::{read_u16, read_u8, write_u16, write_u8};
use bytes::Buf;

#[derive(Debug, Clone, PartialEq)]
pub struct Pubrel {
    pub mid: u16,
    pub reason_code: u8,
    pub properties: PropertyBag,
}

impl Pubrel {
    pub fn decode(
        buf: &mut impl Buf,
        remaining_len: usize,
        version: ProtocolVersion,
    ) -> Result<Self, ProtocolError> {
        let mid = read_u16(buf)?;
        if !version.is_v5() || remaining_len == 2 {
            return Ok(Pubrel {
                mid,
                reason_code: 0,
                properties: PropertyBag::new(),
            });
        }
        let reason_code = read_u8(buf)?;
        let properties = if remaining_len > 3 {
            PropertyBag::decode(buf, Command::Pubrel)?
        } else {
            PropertyBag::new()
        };
        Ok(Pubrel {
            mid,
            reason_code,
            properties,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>, version: ProtocolVersion) -> Result<(), ProtocolError> {
        write_u16(buf, self.mid);
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
    fn round_trips_short_form() {
        let original = Pubrel {
            mid: 10,
            reason_code: 0,
            properties: PropertyBag::new(),
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V5).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Pubrel::decode(&mut bytes, buf.len(), ProtocolVersion::V5).unwrap();
        assert_eq!(decoded, original);
    }
}
