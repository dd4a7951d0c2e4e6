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

//! Modbus ADU shapes (§4.2, §6): a TCP MBAP header plus PDU, or an RTU/ASCII
//! 3-byte header plus PDU, with a CRC trailer on RTU only. The high bit of
//! the function byte flags an exception frame carrying a 1-byte reason in
//! place of the data that would otherwise follow.

use crate::error::ProtocolError;
use crate::modbus::crc;
use bytes::{Buf, BufMut, Bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
}

impl FunctionCode {
    pub fn as_u8(self) -> u8 {
        match self {
            FunctionCode::ReadCoils => 0x01,
            FunctionCode::ReadDiscreteInputs => 0x02,
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
        }
    }

    pub fn from_u8(code: u8) -> Result<Self, ProtocolError> {
        match code & 0x7F {
            0x01 => Ok(FunctionCode::ReadCoils),
            0x02 => Ok(FunctionCode::ReadDiscreteInputs),
            0x03 => Ok(FunctionCode::ReadHoldingRegisters),
            0x04 => Ok(FunctionCode::ReadInputRegisters),
            other => Err(ProtocolError::protocol(format!(
                "unsupported modbus function code {other}"
            ))),
        }
    }

    /// Per-function size caps enforced by the scheduler (§4.8 step 1):
    /// bit-addressed functions allow up to 2000 points, register-addressed
    /// ones up to 125.
    pub fn max_request_size(self) -> u16 {
        match self {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => 2000,
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => 125,
        }
    }

    pub fn is_bit_oriented(self) -> bool {
        matches!(self, FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs)
    }
}

/// Expected response byte_count for a request of `size` points against
/// `function` (§4.8 step 3): bits pack 8-per-byte, registers are 2 bytes
/// each.
pub fn expected_byte_count(function: FunctionCode, size: u16) -> u8 {
    if function.is_bit_oriented() {
        (size as usize).div_ceil(8) as u8
    } else {
        (size as u16 * 2) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    Request {
        function: FunctionCode,
        address: u16,
        quantity: u16,
    },
    Response {
        function: FunctionCode,
        data: Bytes,
    },
    Exception {
        function: FunctionCode,
        exception_code: u8,
    },
}

impl Pdu {
    pub fn encode_request(buf: &mut impl BufMut, function: FunctionCode, address: u16, quantity: u16) {
        buf.put_u8(function.as_u8());
        buf.put_u16(address);
        buf.put_u16(quantity);
    }

    /// Parses a response or exception PDU. `byte_count` for a normal
    /// response is implied by the first data byte; callers compare it
    /// against `expected_byte_count` for the outstanding request.
    pub fn decode_response(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        if !buf.has_remaining() {
            return Err(ProtocolError::malformed("empty modbus pdu"));
        }
        let raw_function = buf.get_u8();
        if raw_function & 0x80 != 0 {
            if !buf.has_remaining() {
                return Err(ProtocolError::malformed("exception pdu missing exception code"));
            }
            let exception_code = buf.get_u8();
            return Ok(Pdu::Exception {
                function: FunctionCode::from_u8(raw_function)?,
                exception_code,
            });
        }
        let function = FunctionCode::from_u8(raw_function)?;
        if !buf.has_remaining() {
            return Err(ProtocolError::malformed("response missing byte count"));
        }
        let byte_count = buf.get_u8() as usize;
        if buf.remaining() < byte_count {
            return Err(ProtocolError::malformed("response data shorter than byte count"));
        }
        let data = buf.copy_to_bytes(byte_count);
        Ok(Pdu::Response { function, data })
    }
}

/// A Modbus TCP ADU: `[txn_id:u16][proto:u16=0][length:u16][unit_id:u8][pdu]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpAdu {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub function: u8,
    pub body: Bytes,
}

impl TcpAdu {
    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::with_capacity(7 + self.body.len());
        buf.put_u16(self.transaction_id);
        buf.put_u16(0); // protocol identifier, always 0 for Modbus
        buf.put_u16((2 + self.body.len()) as u16);
        buf.put_u8(self.unit_id);
        buf.put_u8(self.function);
        buf.put_slice(&self.body);
        Bytes::from(buf)
    }

    pub fn decode(mut buf: Bytes) -> Result<Self, ProtocolError> {
        if buf.remaining() < 8 {
            return Err(ProtocolError::malformed("tcp adu shorter than mbap header"));
        }
        let transaction_id = buf.get_u16();
        let protocol_id = buf.get_u16();
        if protocol_id != 0 {
            return Err(ProtocolError::protocol("modbus tcp protocol id must be 0"));
        }
        let length = buf.get_u16() as usize;
        if length < 2 || buf.remaining() != length - 1 {
            return Err(ProtocolError::malformed("tcp adu length field mismatch"));
        }
        let unit_id = buf.get_u8();
        let function = buf.get_u8();
        let body = buf.copy_to_bytes(buf.remaining());
        Ok(TcpAdu {
            transaction_id,
            unit_id,
            function,
            body,
        })
    }
}

/// A Modbus RTU ADU: `[slave_id][function][data...][crc:u16 LSB-first]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtuAdu {
    pub slave_id: u8,
    pub function: u8,
    pub body: Bytes,
}

impl RtuAdu {
    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::with_capacity(2 + self.body.len() + 2);
        buf.put_u8(self.slave_id);
        buf.put_u8(self.function);
        buf.put_slice(&self.body);
        crc::append_crc(&mut buf);
        Bytes::from(buf)
    }

    /// Verifies the trailing CRC before parsing the header; rejects with
    /// `MalformedPacket` on mismatch (§9 open question: this core chooses
    /// to reject rather than accept unverified responses).
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < 4 {
            return Err(ProtocolError::malformed("rtu frame shorter than minimum size"));
        }
        if !crc::verify(frame) {
            return Err(ProtocolError::malformed("rtu frame failed crc verification"));
        }
        let slave_id = frame[0];
        let function = frame[1];
        let body = Bytes::copy_from_slice(&frame[2..frame.len() - 2]);
        Ok(RtuAdu {
            slave_id,
            function,
            body,
        })
    }
}

/// A Modbus ASCII ADU shares the RTU header shape but carries no CRC
/// trailer in this core; the hex/LRC/CRLF framing is a transport concern
/// (§1 out of scope).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiAdu {
    pub slave_id: u8,
    pub function: u8,
    pub body: Bytes,
}

impl AsciiAdu {
    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::with_capacity(2 + self.body.len());
        buf.put_u8(self.slave_id);
        buf.put_u8(self.function);
        buf.put_slice(&self.body);
        Bytes::from(buf)
    }

    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        if frame.len() < 2 {
            return Err(ProtocolError::malformed("ascii frame shorter than minimum size"));
        }
        Ok(AsciiAdu {
            slave_id: frame[0],
            function: frame[1],
            body: Bytes::copy_from_slice(&frame[2..]),
        })
    }
}

/// A decoded ADU regardless of transport, normalized to slave id + PDU for
/// the scheduler to consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adu {
    pub slave_id: u8,
    pub function: u8,
    pub body: Bytes,
}

impl From<TcpAdu> for Adu {
    fn from(tcp: TcpAdu) -> Self {
        Adu {
            slave_id: tcp.unit_id,
            function: tcp.function,
            body: tcp.body,
        }
    }
}

impl From<RtuAdu> for Adu {
    fn from(rtu: RtuAdu) -> Self {
        Adu {
            slave_id: rtu.slave_id,
            function: rtu.function,
            body: rtu.body,
        }
    }
}

impl From<AsciiAdu> for Adu {
    fn from(ascii: AsciiAdu) -> Self {
        Adu {
            slave_id: ascii.slave_id,
            function: ascii.function,
            body: ascii.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_tcp_adu() {
        let original = TcpAdu {
            transaction_id: 7,
            unit_id: 3,
            function: 0x03,
            body: Bytes::from_static(&[0x10, 0x00, 0x00, 0x04]),
        };
        let encoded = original.encode();
        let decoded = TcpAdu::decode(encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn matches_scenario_5_request_bytes() {
        let mut body = Vec::new();
        Pdu::encode_request(&mut body, FunctionCode::ReadHoldingRegisters, 0x1000, 4);
        let adu = TcpAdu {
            transaction_id: 1,
            unit_id: 3,
            function: 0x03,
            body: Bytes::from(body),
        };
        let encoded = adu.encode();
        assert_eq!(
            &encoded[..],
            &[0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x03, 0x03, 0x10, 0x00, 0x00, 0x04][..]
        );
    }

    #[test]
    fn round_trips_rtu_adu_and_rejects_bad_crc() {
        let original = RtuAdu {
            slave_id: 3,
            function: 0x03,
            body: Bytes::from_static(&[0x02, 0x00, 0x2A]),
        };
        let mut encoded = original.encode().to_vec();
        let decoded = RtuAdu::decode(&encoded).unwrap();
        assert_eq!(decoded, original);

        let last = encoded.len() - 1;
        encoded[last] ^= 0xFF;
        assert!(RtuAdu::decode(&encoded).is_err());
    }

    #[test]
    fn decodes_exception_pdu() {
        let mut buf = Bytes::from_static(&[0x83, 0x02]);
        let pdu = Pdu::decode_response(&mut buf).unwrap();
        assert_eq!(
            pdu,
            Pdu::Exception {
                function: FunctionCode::ReadHoldingRegisters,
                exception_code: 0x02,
            }
        );
    }

    #[test]
    fn expected_byte_count_matches_scenario_5() {
        assert_eq!(
            expected_byte_count(FunctionCode::ReadHoldingRegisters, 4),
            8
        );
        assert_eq!(expected_byte_count(FunctionCode::ReadCoils, 10), 2);
    }
}
