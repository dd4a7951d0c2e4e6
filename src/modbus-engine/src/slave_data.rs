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

//! Per-slave register/coil state (§3). Four `control` tables track one
//! bitfield `Cell` per address regardless of object type; `input_register`
//! and `holding_register` hold the actual 16-bit values. A packed byte per
//! cell, per §9 design notes ("struct-of-arrays... or a packed byte per
//! cell for simplicity; the invariants in §3 are what must hold").

use common_base::config::modbus::{ConversionEntry, MappingEntry, ObjectType};

/// Every table spans the full 16-bit address space (§3).
pub const ADDRESS_SPACE: usize = 0x1_0000;

/// One address's bitfield metadata. `bit_value` is meaningful only for
/// `Coil`/`DiscreteInput` cells; registers carry their value in the
/// separate `input_register`/`holding_register` tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cell(u8);

impl Cell {
    const VALUE_BUSY: u8 = 0x01;
    const UPDATED: u8 = 0x02;
    const COMPOUND_VALUE: u8 = 0x04;
    const BIT_VALUE: u8 = 0x08;
    const TO_WRITE: u8 = 0x10;

    fn flag(&self, mask: u8) -> bool {
        self.0 & mask != 0
    }

    fn set_flag(&mut self, mask: u8, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    pub fn value_busy(&self) -> bool {
        self.flag(Self::VALUE_BUSY)
    }

    pub fn set_value_busy(&mut self, value: bool) {
        self.set_flag(Self::VALUE_BUSY, value)
    }

    pub fn updated(&self) -> bool {
        self.flag(Self::UPDATED)
    }

    pub fn set_updated(&mut self, value: bool) {
        self.set_flag(Self::UPDATED, value)
    }

    pub fn compound_value(&self) -> bool {
        self.flag(Self::COMPOUND_VALUE)
    }

    pub fn set_compound_value(&mut self, value: bool) {
        self.set_flag(Self::COMPOUND_VALUE, value)
    }

    pub fn bit_value(&self) -> bool {
        self.flag(Self::BIT_VALUE)
    }

    pub fn set_bit_value(&mut self, value: bool) {
        self.set_flag(Self::BIT_VALUE, value)
    }

    pub fn to_write(&self) -> bool {
        self.flag(Self::TO_WRITE)
    }

    pub fn set_to_write(&mut self, value: bool) {
        self.set_flag(Self::TO_WRITE, value)
    }
}

fn object_type_index(object_type: ObjectType) -> usize {
    match object_type {
        ObjectType::Coil => 0,
        ObjectType::DiscreteInput => 1,
        ObjectType::InputRegister => 2,
        ObjectType::HoldingRegister => 3,
    }
}

/// Number of `control` cells a conversion variable of `format` spans,
/// distinct from `ValueFormat::register_span` which is 0 for bit formats
/// (they don't occupy a register, but they still claim one control cell) —
/// §4.8: "1 for bool/16-bit, 2 for 32-bit/float, 4 for 64-bit/double".
fn compound_cell_span(format: common_base::config::modbus::ValueFormat) -> usize {
    format.register_span().max(1)
}

#[derive(Debug)]
pub struct SlaveData {
    pub slave_id: u8,
    control: [Vec<Cell>; 4],
    pub input_register: Vec<u16>,
    pub holding_register: Vec<u16>,
}

impl SlaveData {
    pub fn new(slave_id: u8) -> Self {
        SlaveData {
            slave_id,
            control: [
                vec![Cell::default(); ADDRESS_SPACE],
                vec![Cell::default(); ADDRESS_SPACE],
                vec![Cell::default(); ADDRESS_SPACE],
                vec![Cell::default(); ADDRESS_SPACE],
            ],
            input_register: vec![0; ADDRESS_SPACE],
            holding_register: vec![0; ADDRESS_SPACE],
        }
    }

    pub fn control(&self, object_type: ObjectType, address: u16) -> Cell {
        self.control[object_type_index(object_type)][address as usize]
    }

    pub fn control_mut(&mut self, object_type: ObjectType, address: u16) -> &mut Cell {
        &mut self.control[object_type_index(object_type)][address as usize]
    }

    /// Register value for a register-addressed object type; `None` for
    /// `Coil`/`DiscreteInput`, whose value lives in `Cell::bit_value`.
    pub fn register(&self, object_type: ObjectType, address: u16) -> Option<u16> {
        match object_type {
            ObjectType::InputRegister => Some(self.input_register[address as usize]),
            ObjectType::HoldingRegister => Some(self.holding_register[address as usize]),
            ObjectType::Coil | ObjectType::DiscreteInput => None,
        }
    }

    pub fn set_register(&mut self, object_type: ObjectType, address: u16, value: u16) {
        match object_type {
            ObjectType::InputRegister => self.input_register[address as usize] = value,
            ObjectType::HoldingRegister => self.holding_register[address as usize] = value,
            ObjectType::Coil | ObjectType::DiscreteInput => {}
        }
        self.control_mut(object_type, address).set_updated(true);
    }

    pub fn set_bit(&mut self, object_type: ObjectType, address: u16, value: bool) {
        let cell = self.control_mut(object_type, address);
        cell.set_bit_value(value);
        cell.set_updated(true);
    }

    /// Validation at start, map half (§4.8): claims `value_busy` for every
    /// cell a map covers; a map whose range is out of bounds or overlaps an
    /// already-claimed cell is disabled. Returns one bool per input map,
    /// `true` meaning disabled.
    pub fn apply_mappings(&mut self, mappings: &[MappingEntry]) -> Vec<bool> {
        let mut disabled = Vec::with_capacity(mappings.len());
        for map in mappings {
            let end = map.address as u32 + map.size as u32;
            if map.size == 0 || end > ADDRESS_SPACE as u32 {
                disabled.push(true);
                continue;
            }
            let covered: Vec<u16> = (map.address..map.address + map.size).collect();
            let double_covered = covered
                .iter()
                .any(|&addr| self.control(map.object_type, addr).value_busy());
            if double_covered {
                disabled.push(true);
                continue;
            }
            for addr in covered {
                self.control_mut(map.object_type, addr).set_value_busy(true);
            }
            disabled.push(false);
        }
        disabled
    }

    /// Validation at start, conversion half (§4.8): a variable is only
    /// valid when every cell it spans is already claimed by a map and not
    /// already claimed by an earlier conversion; claims `compound_value` on
    /// success. Returns one bool per input conversion, `true` meaning
    /// disabled.
    pub fn apply_conversions(&mut self, conversions: &[ConversionEntry]) -> Vec<bool> {
        let mut disabled = Vec::with_capacity(conversions.len());
        for conversion in conversions {
            let span = compound_cell_span(conversion.format);
            let end = conversion.address as u32 + span as u32;
            if end > ADDRESS_SPACE as u32 {
                disabled.push(true);
                continue;
            }
            let addrs: Vec<u16> = (conversion.address..conversion.address + span as u16).collect();
            let valid = addrs.iter().all(|&addr| {
                let cell = self.control(conversion.object_type, addr);
                cell.value_busy() && !cell.compound_value()
            });
            if !valid {
                disabled.push(true);
                continue;
            }
            for addr in addrs {
                self.control_mut(conversion.object_type, addr)
                    .set_compound_value(true);
            }
            disabled.push(false);
        }
        disabled
    }
}
