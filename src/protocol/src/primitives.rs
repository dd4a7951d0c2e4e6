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

//! WireCodec primitives: fixed-size integers, length-prefixed binary data
//! and UTF-8 strings (§4.1).

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes};

pub fn read_u8(buf: &mut impl Buf) -> Result<u8, ProtocolError> {
    if buf.remaining() < 1 {
        return Err(ProtocolError::malformed("expected 1 byte, buffer empty"));
    }
    Ok(buf.get_u8())
}

pub fn read_u16(buf: &mut impl Buf) -> Result<u16, ProtocolError> {
    if buf.remaining() < 2 {
        return Err(ProtocolError::malformed("expected 2 bytes for u16"));
    }
    Ok(buf.get_u16())
}

pub fn read_u32(buf: &mut impl Buf) -> Result<u32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::malformed("expected 4 bytes for u32"));
    }
    Ok(buf.get_u32())
}

pub fn write_u8(buf: &mut impl BufMut, value: u8) {
    buf.put_u8(value);
}

pub fn write_u16(buf: &mut impl BufMut, value: u16) {
    buf.put_u16(value);
}

pub fn write_u32(buf: &mut impl BufMut, value: u32) {
    buf.put_u32(value);
}

/// Reads a `[len:u16][bytes]` binary blob.
pub fn read_binary(buf: &mut impl Buf) -> Result<Bytes, ProtocolError> {
    let len = read_u16(buf)? as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::malformed(format!(
            "binary data declares {len} bytes, only {} remain",
            buf.remaining()
        )));
    }
    Ok(buf.copy_to_bytes(len))
}

pub fn write_binary(buf: &mut impl BufMut, data: &[u8]) -> Result<(), ProtocolError> {
    if data.len() > u16::MAX as usize {
        return Err(ProtocolError::malformed("binary data exceeds 65535 bytes"));
    }
    write_u16(buf, data.len() as u16);
    buf.put_slice(data);
    Ok(())
}

/// Reads a `[len:u16][utf-8 bytes]` string, validating its contents per
/// `validate_utf8_str`.
pub fn read_string(buf: &mut impl Buf) -> Result<String, ProtocolError> {
    let data = read_binary(buf)?;
    let s = std::str::from_utf8(&data)
        .map_err(|_| ProtocolError::malformed("string is not valid utf-8"))?;
    validate_mqtt_str(s)?;
    Ok(s.to_string())
}

pub fn write_string(buf: &mut impl BufMut, value: &str) -> Result<(), ProtocolError> {
    validate_mqtt_str(value)?;
    write_binary(buf, value.as_bytes())
}

/// MQTT-specific UTF-8 string validation (§4.1): beyond well-formed UTF-8
/// (guaranteed by `str::from_utf8`, which already rejects surrogate halves
/// and overlong byte sequences), MQTT additionally rejects NUL, control
/// characters, and the Unicode non-character code points.
pub fn validate_mqtt_str(s: &str) -> Result<(), ProtocolError> {
    for c in s.chars() {
        let cp = c as u32;

        if cp == 0x0000 {
            return Err(ProtocolError::malformed("string contains NUL"));
        }

        if (0x0000..=0x001F).contains(&cp) || (0x007F..=0x009F).contains(&cp) {
            return Err(ProtocolError::malformed("string contains a control character"));
        }

        if (0xFDD0..=0xFDEF).contains(&cp) {
            return Err(ProtocolError::malformed("string contains a non-character"));
        }

        if cp & 0xFFFE == 0xFFFE {
            // Matches U+xFFFE / U+xFFFF for every plane x in 0..=16.
            return Err(ProtocolError::malformed("string contains a non-character"));
        }
    }
    Ok(())
}
