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

//! UNSUBSCRIBE (§4.4): same wire shape as SUBSCRIBE without the options
//! byte per filter.

use crate::error::ProtocolError;
use crate::mqtt::packet::ProtocolVersion;
use crate::mqtt::property::PropertyBag;
use crate::mqtt::reason_code::Command;
use crate::primitives::{read_string, read_u16, write_string, write_u16};
use bytes::Buf;

#[derive(Debug, Clone, PartialEq)]
pub struct Unsubscribe {
    pub mid: u16,
    pub properties: PropertyBag,
    pub filters: Vec<String>,
}

impl Unsubscribe {
    pub fn decode(buf: &mut impl Buf, version: ProtocolVersion) -> Result<Self, ProtocolError> {
        let mid = read_u16(buf)?;
        if mid == 0 {
            return Err(ProtocolError::protocol("unsubscribe mid must not be zero"));
        }
        let properties = if version.is_v5() {
            PropertyBag::decode(buf, Command::Unsubscribe)?
        } else {
            PropertyBag::new()
        };
        let mut filters = Vec::new();
        while buf.has_remaining() {
            filters.push(read_string(buf)?);
        }
        if filters.is_empty() {
            return Err(ProtocolError::protocol(
                "unsubscribe must contain at least one topic filter",
            ));
        }
        Ok(Unsubscribe {
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
            write_string(buf, filter)?;
        }
        Ok(())
    }
}
