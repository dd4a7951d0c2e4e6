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

//! PUBLISH (§4.4). Topic may be empty in MQTT 5 only when a `TopicAlias`
//! property resolves it; that rule is enforced by the session, not here.

use crate::error::ProtocolError;
use crate::mqtt::packet::ProtocolVersion;
use crate::mqtt::property::PropertyBag;
use crate::mqtt::reason_code::Command;
use crate::primitives::{read_string, read_u16, write_string, write_u16};
use bytes::{Buf, BufMut, Bytes};

#[derive(Debug, Clone, PartialEq)]
pub struct Publish {
    pub dup: bool,
    pub qos: u8,
    pub retain: bool,
    pub topic: String,
    pub mid: Option<u16>,
    pub properties: PropertyBag,
    pub payload: Bytes,
}

impl Publish {
    pub fn flags(&self) -> u8 {
        let mut flags = self.qos << 1;
        if self.retain {
            flags |= 0x01;
        }
        if self.dup {
            flags |= 0x08;
        }
        flags
    }

    pub fn decode(
        buf: &mut impl Buf,
        header_flags: u8,
        version: ProtocolVersion,
    ) -> Result<Self, ProtocolError> {
        let retain = header_flags & 0x01 != 0;
        let qos = (header_flags >> 1) & 0x03;
        let dup = header_flags & 0x08 != 0;
        if qos == 3 {
            return Err(ProtocolError::malformed("publish qos 3 is reserved"));
        }
        if qos == 0 && dup {
            return Err(ProtocolError::malformed("dup set on a qos 0 publish"));
        }

        let topic = read_string(buf)?;
        let mid = if qos > 0 { Some(read_u16(buf)?) } else { None };

        let properties = if version.is_v5() {
            PropertyBag::decode(buf, Command::Publish)?
        } else {
            PropertyBag::new()
        };

        let payload = buf.copy_to_bytes(buf.remaining());

        Ok(Publish {
            dup,
            qos,
            retain,
            topic,
            mid,
            properties,
            payload,
        })
    }

    pub fn encode(&self, buf: &mut Vec<u8>, version: ProtocolVersion) -> Result<(), ProtocolError> {
        write_string(buf, &self.topic)?;
        if let Some(mid) = self.mid {
            write_u16(buf, mid);
        }
        if version.is_v5() {
            self.properties.encode(buf)?;
        }
        buf.put_slice(&self.payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_qos1_publish() {
        let original = Publish {
            dup: false,
            qos: 1,
            retain: false,
            topic: "a/b".into(),
            mid: Some(42),
            properties: PropertyBag::new(),
            payload: Bytes::from_static(b"x"),
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V311).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Publish::decode(&mut bytes, original.flags(), ProtocolVersion::V311).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn qos0_publish_has_no_mid() {
        let original = Publish {
            dup: false,
            qos: 0,
            retain: false,
            topic: "a/b".into(),
            mid: None,
            properties: PropertyBag::new(),
            payload: Bytes::from_static(b"x"),
        };
        let mut buf = Vec::new();
        original.encode(&mut buf, ProtocolVersion::V311).unwrap();
        let mut bytes = BytesMut::from(&buf[..]);
        let decoded = Publish::decode(&mut bytes, original.flags(), ProtocolVersion::V311).unwrap();
        assert_eq!(decoded.mid, None);
    }

    #[test]
    fn rejects_dup_on_qos0() {
        let mut buf = BytesMut::new();
        write_string(&mut buf, "a/b").unwrap();
        assert!(Publish::decode(&mut buf, 0x08, ProtocolVersion::V311).is_err());
    }
}
