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

//! SUBSCRIBE (§4.4). Topic-filter well-formedness (`sub_topic_check`) is
//! enforced by the session, which owns the subscription index; this module
//! only unpacks the wire shape.

use crate::error::ProtocolError;
use crate::mqtt::packet::ProtocolVersion;
use crate::mqtt::property::PropertyBag;
use crate::mqtt::reason_code::Command;
use crate::primitives::{read_string, read_u16, read_u8, write_string, write_u16, write_u8};
use bytes::Buf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainHandling {
    SendOnSubscribe,
    SendIfNew,
    Never,
}

impl RetainHandling {
    fn from_bits(bits: u8) -> Result<Self, ProtocolError> {
        match bits {
            0 => Ok(RetainHandling::SendOnSubscribe),
            1 => Ok(RetainHandling::SendIfNew),
            2 => Ok(RetainHandling::Never),
            _ => Err(ProtocolError::malformed("retain handling value 3 is reserved")),
        }
    }

    fn as_bits(self) -> u8 {
        match self {
            RetainHandling::SendOnSubscribe => 0,
            RetainHandling::SendIfNew => 1,
            RetainHandling::Never => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeFilter {
    pub topic_filter: String,
    pub qos: u8,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscribe {
    pub mid: u16,
    pub properties: PropertyBag,
    pub filters: Vec<SubscribeFilter>,
}

impl Subscribe {
    pub fn decode(buf: &mut impl Buf, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let mid = read_u16(buf)?;
        if mid == 0 {
            return Err(ProtocolError::protocol("subscribe mid must not be zero"));
        }
        let properties = if version.is_v5() {
            PropertyBag::decode(buf, Command::Subscribe)?
        } else {
            PropertyBag::new()
        };

        let mut filters = Vec::new();
        while buf.has_remaining() {
            let topic_filter = read_string(buf)?;
            let options = read_u8(buf)?;
            if options & 0xC0 != 0 {
                return Err(ProtocolError::malformed(
                    "subscribe options reserved bits 6-7 must be zero",
                ));
            }
            let qos = options & 0x03;
            if qos == 3 {
                return Err(ProtocolError::malformed("subscribe qos 3 is reserved"));
            }
            let no_local = options & 0x04 != 0;
            let retain_as_published = options & 0x08 != 0;
            let retain_handling = RetainHandling::from_bits((options & 0x30) >> 4)?;
            filters.push(SubscribeFilter {
                topic_filter,
                qos,
                no_local,
                retain_as_published,
                retain_handling,
            });
        }

        if filters.is_empty() && version != ProtocolVersion::V3 {
            return Err(ProtocolError::protocol(
                "subscribe must contain at least one topic filter",
            ));
        }

        Ok(Subscribe {
            mid,
            properties,
            filters,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>, version: ProtocolVersion) -> Result<(), ProtocolError> {
        write_u16(buf, self.mid);
        if version.is_v5() {
            self.properties.encode(buf)?;
        }
        for filter in &self.filters {
            write_string(buf, &filter.topic_filter)?;
            let mut options = filter.qos & 0x03;
            if filter.no_local {
                options |= 0x04;
            }
            if filter.retain_as_published {
                options |= 0x08;
            }
            options |= filter.retain_handling.as_bits() << 4;
            write_u8(buf, options);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_multiple_filters() {
        let original = Subscribe {
            mid: 5,
            properties: PropertyBag::new(),
            filters: vec![
                SubscribeFilter {
                    topic_filter: "a/b".into(),
                    qos: 1,
                    no_local: true,
                    retain_as_published: false,
                    retain_handling: RetainHandling::SendIfNew,
                },
                SubscribeFilter {
                    topic_filter: "c/#".into(),
                    qos: 2,
                    no_local: false,
                    retain_as_published: true,
                    retain_handling: RetainHandling::Never,
                },
            ],
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V5).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Subscribe::decode(&mut bytes, ProtocolVersion::V5).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn rejects_zero_mid() {
        let mut buf = BytesMut::new();
        write_u16(&mut buf, 0);
        assert!(Subscribe::decode(&mut buf, ProtocolVersion::V311).is_err());
    }

    #[test]
    fn rejects_empty_filter_list_in_v311() {
        let mut buf = BytesMut::new();
        write_u16(&mut buf, 1);
        assert!(Subscribe::decode(&mut buf, ProtocolVersion::V311).is_err());
    }
}
