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

//! Resumable byte-stream to frame assembly for the Modbus transports
//! (§4.2), the Modbus sibling of `mqtt_engine::frame_assembler`. Unlike
//! MQTT's single var-int-delimited header, each transport has its own
//! fixed layout, so the assembler is parameterized over `ModbusTransport`
//! rather than sharing one state machine.

use bytes::{Bytes, BytesMut};
use common_base::config::modbus::ModbusTransport;

#[derive(Debug)]
pub struct ModbusFrameAssembler {
    transport: ModbusTransport,
    buf: BytesMut,
}

impl ModbusFrameAssembler {
    pub fn new(transport: ModbusTransport) -> Self {
        ModbusFrameAssembler {
            transport,
            buf: BytesMut::new(),
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Returns the next complete raw ADU, still CRC-trailer-and-all for
    /// RTU, for the caller to hand to `TcpAdu`/`RtuAdu`/`AsciiAdu::decode`.
    pub fn poll_frame(&mut self) -> Option<Bytes> {
        match self.transport {
            ModbusTransport::Tcp => self.poll_tcp(),
            ModbusTransport::Rtu => self.poll_fixed_header(true),
            ModbusTransport::Ascii => self.poll_fixed_header(false),
        }
    }

    /// TCP MBAP header: `[txn:u16][proto:u16][length:u16][unit_id][pdu...]`
    /// (§4.2, §6). `length` counts unit_id plus everything after it.
    fn poll_tcp(&mut self) -> Option<Bytes> {
        if self.buf.len() < 6 {
            return None;
        }
        let length = u16::from_be_bytes([self.buf[4], self.buf[5]]) as usize;
        let total = 6 + length;
        if self.buf.len() < total {
            return None;
        }
        Some(self.buf.split_to(total).freeze())
    }

    /// RTU/ASCII header: `[slave_id][function][byte_count][data...]`, or
    /// `[slave_id][function|0x80][exception_code]` for an exception frame,
    /// plus a 2-byte CRC trailer when `has_crc` (RTU only).
    fn poll_fixed_header(&mut self, has_crc: bool) -> Option<Bytes> {
        if self.buf.len() < 2 {
            return None;
        }
        let function = self.buf[1];
        let is_exception = function & 0x80 != 0;
        let fixed_len = if is_exception {
            3
        } else {
            if self.buf.len() < 3 {
                return None;
            }
            3 + self.buf[2] as usize
        };
        let total = fixed_len + if has_crc { 2 } else { 0 };
        if self.buf.len() < total {
            return None;
        }
        Some(self.buf.split_to(total).freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::modbus::adu::{FunctionCode, Pdu, TcpAdu};
    use protocol::modbus::crc;

    #[test]
    fn assembles_a_tcp_frame_split_across_pushes() {
        let mut body = Vec::new();
        Pdu::encode_request(&mut body, FunctionCode::ReadHoldingRegisters, 0x1000, 4);
        let adu = TcpAdu {
            transaction_id: 1,
            unit_id: 3,
            function: 0x03,
            body: Bytes::from(body),
        };
        let bytes = adu.encode();

        let mut assembler = ModbusFrameAssembler::new(ModbusTransport::Tcp);
        assembler.push(&bytes[..4]);
        assert!(assembler.poll_frame().is_none());
        assembler.push(&bytes[4..]);
        let frame = assembler.poll_frame().unwrap();
        assert_eq!(frame, bytes);
        assert!(assembler.poll_frame().is_none());
    }

    #[test]
    fn assembles_an_rtu_frame_including_crc_trailer() {
        let mut buf = vec![3u8, 0x03, 0x08, 0, 0, 0, 0, 0, 0, 0, 0x2A];
        crc::append_crc(&mut buf);
        let mut assembler = ModbusFrameAssembler::new(ModbusTransport::Rtu);
        for byte in &buf {
            assembler.push(&[*byte]);
        }
        let frame = assembler.poll_frame().unwrap();
        assert_eq!(frame.len(), buf.len());
    }

    #[test]
    fn assembles_an_rtu_exception_frame() {
        let mut buf = vec![3u8, 0x83, 0x02];
        crc::append_crc(&mut buf);
        let mut assembler = ModbusFrameAssembler::new(ModbusTransport::Rtu);
        assembler.push(&buf);
        let frame = assembler.poll_frame().unwrap();
        assert_eq!(frame.len(), 5);
    }

    #[test]
    fn assembles_back_to_back_ascii_frames() {
        let mut stream = vec![3u8, 0x03, 0x02, 0x00, 0x2A];
        stream.extend_from_slice(&[3u8, 0x03, 0x02, 0x00, 0x2B]);
        let mut assembler = ModbusFrameAssembler::new(ModbusTransport::Ascii);
        assembler.push(&stream);
        assert!(assembler.poll_frame().is_some());
        assert!(assembler.poll_frame().is_some());
        assert!(assembler.poll_frame().is_none());
    }

    #[test]
    fn waits_for_more_bytes_when_header_is_incomplete() {
        let mut assembler = ModbusFrameAssembler::new(ModbusTransport::Rtu);
        assembler.push(&[3u8]);
        assert!(assembler.poll_frame().is_none());
    }
}
