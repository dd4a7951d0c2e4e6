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

//! MQTT variable-length integer: used for both the fixed-header remaining
//! length and the property-set length prefix (§4.1, §4.3). 1-4 bytes, each
//! byte's top bit is a continuation flag, max encodable value 268,435,455.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut};

pub const MAX_VARINT_VALUE: u32 = 268_435_455;

/// Reads a variable-length integer, returning the decoded value and the
/// number of bytes consumed. Fails with `MalformedPacket` if a fourth byte
/// still carries the continuation bit, or if the buffer runs out before a
/// terminating byte is seen.
pub fn read_variable_int(buf: &mut impl Buf) -> Result<(u32, usize), ProtocolError> {
    let mut multiplier: u32 = 1;
    let mut value: u32 = 0;
    let mut consumed = 0;

    loop {
        if !buf.has_remaining() {
            return Err(ProtocolError::malformed(
                "buffer exhausted while reading variable-length integer",
            ));
        }
        let byte = buf.get_u8();
        consumed += 1;

        value += u32::from(byte & 0x7F) * multiplier;

        if byte & 0x80 == 0 {
            break;
        }

        if consumed == 4 {
            return Err(ProtocolError::malformed(
                "variable-length integer continues past 4 bytes",
            ));
        }

        multiplier *= 128;
    }

    if consumed != variable_int_len(value) {
        return Err(ProtocolError::malformed(
            "overlong variable-length integer encoding",
        ));
    }

    Ok((value, consumed))
}

/// Writes `value` as a variable-length integer, returning the number of
/// bytes written. Errors if `value` exceeds the 4-byte/268,435,455 limit.
pub fn write_variable_int(buf: &mut impl BufMut, value: u32) -> Result<usize, ProtocolError> {
    if value > MAX_VARINT_VALUE {
        return Err(ProtocolError::malformed(format!(
            "variable-length integer {value} exceeds maximum {MAX_VARINT_VALUE}"
        )));
    }

    let mut value = value;
    let mut written = 0;
    loop {
        let mut byte = (value % 128) as u8;
        value /= 128;
        if value > 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        written += 1;
        if value == 0 {
            break;
        }
    }
    Ok(written)
}

/// Number of bytes `write_variable_int` would emit for `value`, without
/// writing anything. Used by packet `len()` implementations to size the
/// fixed header up front.
pub fn variable_int_len(value: u32) -> usize {
    match value {
        0..=127 => 1,
        128..=16_383 => 2,
        16_384..=2_097_151 => 3,
        _ => 4,
    }
}
