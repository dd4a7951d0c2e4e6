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

//! The polling cycle (§4.8): cyclic (slave, map) scheduling, response
//! validation, and the cycle-end publish phase. Single-threaded cooperative
//! like the MQTT session (§5) — `ModbusScheduler` owns no transport or
//! timer; the caller drives it with `build_next_request`/`on_response`/
//! `on_timeout` and carries out the resulting `OutboundEvent`s itself.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use common_base::config::modbus::{ConversionEntry, MappingEntry, ModbusConfig, ObjectType, SlaveConfig};
use common_base::utils::time_util::EdgeTimestamp;
use protocol::modbus::adu::{expected_byte_count, Adu, FunctionCode, Pdu};

use crate::events::{EmittedEvent, SlaveSnapshot};
use crate::slave_data::SlaveData;
use crate::value_decoder::decode;

struct SlaveRuntime {
    id: u8,
    data: SlaveData,
    mapping: Vec<MappingEntry>,
    map_disabled: Vec<bool>,
    conversion: Vec<ConversionEntry>,
}

impl SlaveRuntime {
    fn new(config: &SlaveConfig) -> Self {
        let mut data = SlaveData::new(config.id);
        let map_disabled = data.apply_mappings(&config.mapping);
        let conversion_disabled = data.apply_conversions(&config.conversion);
        let conversion = config
            .conversion
            .iter()
            .zip(conversion_disabled)
            .filter(|(_, disabled)| !disabled)
            .map(|(c, _)| c.clone())
            .collect();
        SlaveRuntime {
            id: config.id,
            data,
            mapping: config.mapping.clone(),
            map_disabled,
            conversion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollCursor {
    pub slave_index: usize,
    pub map_index: usize,
}

struct PendingRequest {
    slave_index: usize,
    map_index: usize,
    object_type: ObjectType,
    address: u16,
    size: u16,
    function: FunctionCode,
    deadline: EdgeTimestamp,
}

pub enum PollOutcome {
    /// Send this PDU body to `slave_id` and wait up to `timeout_response`.
    Request { slave_id: u8, pdu: Bytes },
    /// A full pass over every slave's enabled maps finished; §4.9's publish
    /// phase already ran and the cursor reset to `(0, 0)`.
    CycleComplete(Vec<EmittedEvent>),
    /// No slave has a single enabled map; nothing to poll.
    NoSlavesConfigured,
}

pub struct ModbusScheduler {
    slaves: Vec<SlaveRuntime>,
    cursor: PollCursor,
    timeout_polling: Duration,
    timeout_response: Duration,
    pending: Option<PendingRequest>,
    connected: bool,
}

impl ModbusScheduler {
    pub fn new(config: &ModbusConfig) -> Self {
        let slaves = config.slaves.iter().map(SlaveRuntime::new).collect();
        ModbusScheduler {
            slaves,
            cursor: PollCursor::default(),
            timeout_polling: Duration::from_secs(config.timeout_polling),
            timeout_response: Duration::from_secs(config.timeout_response),
            pending: None,
            connected: true,
        }
    }

    pub fn cursor(&self) -> PollCursor {
        self.cursor
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
        if !connected {
            // Connection loss: idle in place, resume at the same map on
            // reconnect rather than skipping it (§4.8 failure handling).
            self.pending = None;
        }
    }

    /// §4.8 step 1-2: builds the read request for the map at the cursor,
    /// skipping disabled maps, and arms the response deadline. A full
    /// wraparound with nothing left to poll ends the cycle or reports that
    /// no slave has any enabled map at all.
    pub fn build_next_request(&mut self, now: EdgeTimestamp) -> PollOutcome {
        if !self.connected || self.slaves.is_empty() {
            return PollOutcome::NoSlavesConfigured;
        }

        let total_maps: usize = self.slaves.iter().map(|s| s.mapping.len()).sum();
        if total_maps == 0 {
            return PollOutcome::NoSlavesConfigured;
        }

        // Each disabled/unreadable map costs one iteration, and each slave
        // boundary crossed (mapping exhausted, advance to the next slave)
        // costs another; +1 covers the final slave_index >= slaves.len()
        // check that completes the cycle.
        for _ in 0..=total_maps + self.slaves.len() {
            if self.cursor.slave_index >= self.slaves.len() {
                let events = self.run_publish_phase();
                self.cursor = PollCursor::default();
                return PollOutcome::CycleComplete(events);
            }

            let slave = &self.slaves[self.cursor.slave_index];
            if self.cursor.map_index >= slave.mapping.len() {
                self.cursor = PollCursor {
                    slave_index: self.cursor.slave_index + 1,
                    map_index: 0,
                };
                continue;
            }

            if slave.map_disabled[self.cursor.map_index] {
                self.cursor.map_index += 1;
                continue;
            }

            let map = &slave.mapping[self.cursor.map_index];
            let function = match function_for(map.object_type) {
                Some(f) => f,
                None => {
                    self.cursor.map_index += 1;
                    continue;
                }
            };
            let size = map.size.min(function.max_request_size());
            let mut pdu = BytesMut::new();
            Pdu::encode_request(&mut pdu, function, map.address, size);

            self.pending = Some(PendingRequest {
                slave_index: self.cursor.slave_index,
                map_index: self.cursor.map_index,
                object_type: map.object_type,
                address: map.address,
                size,
                function,
                deadline: now.plus_secs(self.timeout_response.as_secs()),
            });
            return PollOutcome::Request {
                slave_id: slave.id,
                pdu: pdu.freeze(),
            };
        }

        PollOutcome::NoSlavesConfigured
    }

    /// §4.8 step 3-5: validate the response against the outstanding
    /// request, store accepted values, then always advance the cursor
    /// regardless of whether the response was usable.
    pub fn on_response(&mut self, adu: &Adu) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let slave = &mut self.slaves[pending.slave_index];
        if adu.slave_id != slave.id {
            tracing::warn!(expected = slave.id, got = adu.slave_id, "modbus response slave id mismatch, discarding");
            self.advance_past(pending.slave_index, pending.map_index);
            return;
        }

        // `adu.body` is the PDU payload with the function byte already
        // split off into `adu.function` (§4.2 framing), so the response is
        // read off those two fields directly rather than through
        // `Pdu::decode_response`, which expects an unsplit PDU.
        if adu.function & 0x80 != 0 {
            let exception_code = adu.body.first().copied().unwrap_or(0);
            tracing::warn!(function = adu.function, exception_code, "modbus exception response");
        } else {
            match FunctionCode::from_u8(adu.function) {
                Ok(function) if function != pending.function => {
                    tracing::warn!(?function, expected = ?pending.function, "modbus response function mismatch, discarding");
                }
                Ok(function) => {
                    let expected = expected_byte_count(function, pending.size);
                    match adu.body.split_first() {
                        Some((&byte_count, data)) if byte_count == expected && data.len() == expected as usize => {
                            store_response(slave, &pending, data);
                        }
                        _ => {
                            tracing::warn!(got = adu.body.len(), expected, "modbus response byte count mismatch, discarding");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(%err, "modbus response failed to decode, discarding");
                }
            }
        }

        self.advance_past(pending.slave_index, pending.map_index);
    }

    /// §4.8 failure handling: a response timeout just advances past the
    /// current map and resumes polling.
    pub fn on_timeout(&mut self, now: EdgeTimestamp) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if pending.deadline.is_past(now) {
            tracing::warn!(slave_index = pending.slave_index, map_index = pending.map_index, "modbus response timed out");
        }
        self.advance_past(pending.slave_index, pending.map_index);
    }

    pub fn timeout_polling(&self) -> Duration {
        self.timeout_polling
    }

    fn advance_past(&mut self, slave_index: usize, map_index: usize) {
        self.cursor = PollCursor {
            slave_index,
            map_index: map_index + 1,
        };
    }

    /// §4.9: decode every enabled conversion for every slave and clear
    /// `updated` flags; runs once per full polling cycle.
    fn run_publish_phase(&mut self) -> Vec<EmittedEvent> {
        let mut events = Vec::with_capacity(self.slaves.len());
        for slave in &mut self.slaves {
            let mut values = Vec::with_capacity(slave.conversion.len());
            for conversion in &slave.conversion {
                if let Some(value) = decode(conversion, &slave.data) {
                    values.push((conversion.id.clone(), value));
                }
                if !conversion.format.is_bit() {
                    for offset in 0..conversion.format.register_span() as u16 {
                        slave
                            .data
                            .control_mut(conversion.object_type, conversion.address + offset)
                            .set_updated(false);
                    }
                } else {
                    slave.data.control_mut(conversion.object_type, conversion.address).set_updated(false);
                }
            }
            events.push(EmittedEvent::Snapshot(SlaveSnapshot {
                slave_id: slave.id,
                values,
            }));
        }
        events
    }
}

fn function_for(object_type: ObjectType) -> Option<FunctionCode> {
    match object_type {
        ObjectType::Coil => Some(FunctionCode::ReadCoils),
        ObjectType::DiscreteInput => Some(FunctionCode::ReadDiscreteInputs),
        ObjectType::HoldingRegister => Some(FunctionCode::ReadHoldingRegisters),
        ObjectType::InputRegister => Some(FunctionCode::ReadInputRegisters),
    }
}

/// §4.8 step 4: stores bits into `control[..].bit_value` or registers into
/// the appropriate verbatim 16-bit table, network byte order preserved.
fn store_response(slave: &mut SlaveRuntime, pending: &PendingRequest, data: &[u8]) {
    if pending.function.is_bit_oriented() {
        for i in 0..pending.size {
            let byte = data[(i / 8) as usize];
            let bit = (byte >> (i % 8)) & 1 != 0;
            slave.data.set_bit(pending.object_type, pending.address + i, bit);
        }
    } else {
        for i in 0..pending.size {
            let offset = (i as usize) * 2;
            let value = u16::from_be_bytes([data[offset], data[offset + 1]]);
            slave.data.set_register(pending.object_type, pending.address + i, value);
        }
    }
}
