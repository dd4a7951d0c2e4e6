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

//! The top-level `Packet` sum type and fixed-header command codes (§3, §6).

use crate::error::ProtocolError;
use crate::fixed_header::{parse_fixed_header, FixedHeader};
use crate::mqtt::auth::Auth;
use crate::mqtt::connack::Connack;
use crate::mqtt::connect::Connect;
use crate::mqtt::disconnect::Disconnect;
use crate::mqtt::puback::Puback;
use crate::mqtt::pubcomp::Pubcomp;
use crate::mqtt::publish::Publish;
use crate::mqtt::pubrec::Pubrec;
use crate::mqtt::pubrel::Pubrel;
use crate::mqtt::suback::Suback;
use crate::mqtt::subscribe::Subscribe;
use crate::mqtt::unsuback::Unsuback;
use crate::mqtt::unsubscribe::Unsubscribe;
use bytes::{Buf, BufMut, Bytes};

pub const CONNECT: u8 = 1;
pub const CONNACK: u8 = 2;
pub const PUBLISH: u8 = 3;
pub const PUBACK: u8 = 4;
pub const PUBREC: u8 = 5;
pub const PUBREL: u8 = 6;
pub const PUBCOMP: u8 = 7;
pub const SUBSCRIBE: u8 = 8;
pub const SUBACK: u8 = 9;
pub const UNSUBSCRIBE: u8 = 10;
pub const UNSUBACK: u8 = 11;
pub const PINGREQ: u8 = 12;
pub const PINGRESP: u8 = 13;
pub const DISCONNECT: u8 = 14;
pub const AUTH: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    V3,
    V311,
    V5,
}

impl ProtocolVersion {
    pub fn is_v5(self) -> bool {
        matches!(self, ProtocolVersion::V5)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Connect(Connect),
    Connack(Connack),
    Publish(Publish),
    Puback(Puback),
    Pubrec(Pubrec),
    Pubrel(Pubrel),
    Pubcomp(Pubcomp),
    Subscribe(Subscribe),
    Suback(Suback),
    Unsubscribe(Unsubscribe),
    Unsuback(Unsuback),
    Pingreq,
    Pingresp,
    Disconnect(Disconnect),
    Auth(Auth),
}

impl Packet {
    /// Decodes a complete packet from `input`, given the fixed header
    /// already peeled off by the `FrameAssembler` and the session's current
    /// protocol version (CONNECT itself establishes the version, so callers
    /// decoding a CONNECT pass `ProtocolVersion::V311` as a placeholder; the
    /// real version is read from the packet body).
    pub fn decode(
        header: FixedHeader,
        mut input: Bytes,
        version: ProtocolVersion,
    ) -> Result<Self, ProtocolError> {
        if input.remaining() != header.remaining_len {
            return Err(ProtocolError::malformed(
                "payload length does not match fixed header remaining length",
            ));
        }
        Ok(match header.command {
            CONNECT => Packet::Connect(Connect::decode(&mut input)?),
            CONNACK => Packet::Connack(Connack::decode(&mut input, version)?),
            PUBLISH => Packet::Publish(Publish::decode(&mut input, header.flags, version)?),
            PUBACK => Packet::Puback(Puback::decode(&mut input, header.remaining_len, version)?),
            PUBREC => Packet::Pubrec(Pubrec::decode(&mut input, header.remaining_len, version)?),
            PUBREL => {
                expect_flags(header, 0x02, "PUBREL")?;
                Packet::Pubrel(Pubrel::decode(&mut input, header.remaining_len, version)?)
            }
            PUBCOMP => {
                Packet::Pubcomp(Pubcomp::decode(&mut input, header.remaining_len, version)?)
            }
            SUBSCRIBE => {
                expect_flags(header, 0x02, "SUBSCRIBE")?;
                Packet::Subscribe(Subscribe::decode(&mut input, version)?)
            }
            SUBACK => Packet::Suback(Suback::decode(&mut input, version)?),
            UNSUBSCRIBE => {
                expect_flags(header, 0x02, "UNSUBSCRIBE")?;
                Packet::Unsubscribe(Unsubscribe::decode(&mut input, version)?)
            }
            UNSUBACK => Packet::Unsuback(Unsuback::decode(&mut input, version)?),
            PINGREQ => {
                expect_empty(header, "PINGREQ")?;
                Packet::Pingreq
            }
            PINGRESP => {
                expect_empty(header, "PINGRESP")?;
                Packet::Pingresp
            }
            DISCONNECT => {
                Packet::Disconnect(Disconnect::decode(&mut input, header.remaining_len, version)?)
            }
            AUTH => Packet::Auth(Auth::decode(&mut input, header.remaining_len, version)?),
            other => return Err(ProtocolError::malformed(format!("unknown command {other}"))),
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut, version: ProtocolVersion) -> Result<(), ProtocolError> {
        match self {
            Packet::Connect(p) => encode_with_header(buf, CONNECT, 0, |b| p.encode(b)),
            Packet::Connack(p) => encode_with_header(buf, CONNACK, 0, |b| p.encode(b, version)),
            Packet::Publish(p) => {
                let flags = p.flags();
                encode_with_header(buf, PUBLISH, flags, |b| p.encode(b, version))
            }
            Packet::Puback(p) => encode_with_header(buf, PUBACK, 0, |b| p.encode(b, version)),
            Packet::Pubrec(p) => encode_with_header(buf, PUBREC, 0, |b| p.encode(b, version)),
            Packet::Pubrel(p) => encode_with_header(buf, PUBREL, 0x02, |b| p.encode(b, version)),
            Packet::Pubcomp(p) => encode_with_header(buf, PUBCOMP, 0, |b| p.encode(b, version)),
            Packet::Subscribe(p) => encode_with_header(buf, SUBSCRIBE, 0x02, |b| p.encode(b, version)),
            Packet::Suback(p) => encode_with_header(buf, SUBACK, 0, |b| p.encode(b, version)),
            Packet::Unsubscribe(p) => {
                encode_with_header(buf, UNSUBSCRIBE, 0x02, |b| p.encode(b, version))
            }
            Packet::Unsuback(p) => encode_with_header(buf, UNSUBACK, 0, |b| p.encode(b, version)),
            Packet::Pingreq => encode_with_header(buf, PINGREQ, 0, |_| Ok(())),
            Packet::Pingresp => encode_with_header(buf, PINGRESP, 0, |_| Ok(())),
            Packet::Disconnect(p) => encode_with_header(buf, DISCONNECT, 0, |b| p.encode(b, version)),
            Packet::Auth(p) => encode_with_header(buf, AUTH, 0, |b| p.encode(b, version)),
        }
    }
}

fn expect_empty(header: FixedHeader, name: &str) -> Result<(), ProtocolError> {
    if header.flags != 0 || header.remaining_len != 0 {
        return Err(ProtocolError::malformed(format!(
            "{name} must have zero flags and zero length"
        )));
    }
    Ok(())
}

fn expect_flags(header: FixedHeader, expected: u8, name: &str) -> Result<(), ProtocolError> {
    if header.flags != expected {
        return Err(ProtocolError::malformed(format!(
            "{name} fixed header flags must be {expected:#06b}"
        )));
    }
    Ok(())
}

fn encode_with_header(
    out: &mut impl BufMut,
    command: u8,
    flags: u8,
    write_body: impl FnOnce(&mut Vec<u8>) -> Result<(), ProtocolError>,
) -> Result<(), ProtocolError> {
    let mut body = Vec::new();
    write_body(&mut body)?;
    out.put_u8((command << 4) | flags);
    crate::varint::write_variable_int(out, body.len() as u32)?;
    out.put_slice(&body);
    Ok(())
}

/// Peels off a fixed header and returns `(header, body)` if a complete frame
/// is present; used by tests and by the `FrameAssembler`'s MQTT profile.
pub fn split_frame(buf: &[u8]) -> Result<Option<(FixedHeader, Bytes)>, ProtocolError> {
    let header = match parse_fixed_header(buf)? {
        Some(h) => h,
        None => return Ok(None),
    };
    if buf.len() < header.total_len() {
        return Ok(None);
    }
    let body = Bytes::copy_from_slice(&buf[header.header_len..header.total_len()]);
    Ok(Some((header, body)))
}
