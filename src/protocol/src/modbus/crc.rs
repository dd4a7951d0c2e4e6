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

//! CRC-16/MODBUS (§4.1): table-driven, two 256-entry tables for the high
//! and low result bytes, built once from the 0xA001 reversed polynomial.
//! Initial register 0xFFFF; the 16-bit result is transmitted low-byte
//! first on the wire (§6).

use std::sync::LazyLock;

static CRC_HI_TABLE: LazyLock<[u8; 256]> = LazyLock::new(|| split_table().0);
static CRC_LO_TABLE: LazyLock<[u8; 256]> = LazyLock::new(|| split_table().1);

fn split_table() -> ([u8; 256], [u8; 256]) {
    let mut hi = [0u8; 256];
    let mut lo = [0u8; 256];
    for i in 0..256usize {
        let mut crc: u16 = i as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
        hi[i] = (crc >> 8) as u8;
        lo[i] = (crc & 0xFF) as u8;
    }
    (hi, lo)
}

/// Computes the CRC-16/MODBUS checksum of `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        let index = ((crc ^ u16::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ (u16::from(CRC_HI_TABLE[index]) << 8 | u16::from(CRC_LO_TABLE[index]));
    }
    crc
}

/// `true` if `frame` (message bytes followed by its little-endian CRC) is
/// self-consistent, per the well-known `crc16(msg || crc16(msg)) == 0`
/// identity (§8 invariant 4).
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    crc16(frame) == 0
}

/// Appends the CRC to `message` in transmitted (low-byte-first) order.
pub fn append_crc(message: &mut Vec<u8>) {
    let crc = crc16(message);
    message.push((crc & 0xFF) as u8);
    message.push((crc >> 8) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_of_message_plus_its_own_crc_is_zero() {
        let msg = [0x01u8, 0x03, 0x00, 0x00, 0x00, 0x04];
        let crc = crc16(&msg);
        let mut framed = msg.to_vec();
        framed.push((crc & 0xFF) as u8);
        framed.push((crc >> 8) as u8);
        assert_eq!(crc16(&framed), 0);
        assert!(verify(&framed));
    }

    #[test]
    fn append_crc_matches_verify() {
        let mut framed = vec![0x11u8, 0x01, 0x00, 0x13, 0x00, 0x25];
        append_crc(&mut framed);
        assert!(verify(&framed));
    }

    #[test]
    fn tampered_frame_fails_verification() {
        let mut framed = vec![0x11u8, 0x01, 0x00, 0x13, 0x00, 0x25];
        append_crc(&mut framed);
        let last = framed.len() - 1;
        framed[last] ^= 0xFF;
        assert!(!verify(&framed));
    }
}
