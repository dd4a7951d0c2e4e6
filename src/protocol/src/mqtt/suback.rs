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
use crate::primitives::{read_u16, read_u8, write_u16, write_u8};
use bytes::Buf;

#[derive(Debug, Clone, PartialEq)]
pub struct Suback {
    pub mid: u16,
    pub properties: PropertyBag,
    pub reason_codes: Vec<u8>,
}

impl Suback {
    pub fn decode(buf: &mut impl Buf, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let mid = read_u16(buf)?;
        let properties = if version.is_v5() {
            PropertyBag::decode(buf, Command::Suback)?
        } else {
            PropertyBag::new()
        };
        let mut reason_codes = Vec::new();
        while buf.has_remaining() {
            reason_codes.push(read_u8(buf)?);
        }
        if reason_codes.is_empty() {
            return Err(ProtocolError::malformed("suback must carry at least one reason code"));
        }
        Ok(Suback {
            mid,
            properties,
            reason_codes,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>, version: ProtocolVersion) -> Result<(), ProtocolError> {
        write_u16(buf, self.mid);
        if version.is_v5() {
            self.properties.encode(buf)?;
        }
        for code in &self.reason_codes {
            write_u8(buf, *code);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_mixed_grants_and_denials() {
        let original = Suback {
            mid: 5,
            properties: PropertyBag::new(),
            reason_codes: vec![0, 1, 2, 0x80],
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V311).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Suback::decode(&mut bytes, ProtocolVersion::V311).unwrap();
        assert_eq!(decoded, original);
    }
}
