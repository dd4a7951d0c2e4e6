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

//! Modbus master configuration, §6 "Configuration (Modbus)" and §4.8. Loaded
//! from JSON, as the spec literally shapes it.

use crate::error::CommonError;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModbusTransport {
    Tcp,
    Rtu,
    Ascii,
}

/// Modbus object type, one of the four addressable register/coil tables
/// (§3 SlaveData, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Coil,
    DiscreteInput,
    InputRegister,
    HoldingRegister,
}

impl ObjectType {
    /// Modbus function code used to read this object type (§4.8 step 1).
    pub fn read_function_code(&self) -> u8 {
        match self {
            ObjectType::Coil => 0x01,
            ObjectType::DiscreteInput => 0x02,
            ObjectType::HoldingRegister => 0x03,
            ObjectType::InputRegister => 0x04,
        }
    }

    /// True for the two single-bit object tables.
    pub fn is_bit(&self) -> bool {
        matches!(self, ObjectType::Coil | ObjectType::DiscreteInput)
    }

    /// Per-function size cap enforced at request-build time (§4.8 step 1).
    pub fn max_request_size(&self) -> u16 {
        if self.is_bit() {
            2000
        } else {
            125
        }
    }
}

/// Typed variable format for a `conversion` entry (§4.8, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    Bool,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
}

impl ValueFormat {
    /// Number of consecutive registers this format spans. Bit formats span
    /// the bit cell itself, not a register (§4.8).
    pub fn register_span(&self) -> usize {
        match self {
            ValueFormat::Bool => 0,
            ValueFormat::Int16 | ValueFormat::Uint16 => 1,
            ValueFormat::Int32 | ValueFormat::Uint32 | ValueFormat::Float => 2,
            ValueFormat::Int64 | ValueFormat::Uint64 | ValueFormat::Double => 4,
        }
    }

    pub fn is_bit(&self) -> bool {
        matches!(self, ValueFormat::Bool)
    }
}

/// Byte/word ordering used to assemble multi-register values (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endian {
    BigEndian,
    LittleEndian,
    BigEndianByteSwap,
    LittleEndianByteSwap,
}

impl Default for Endian {
    fn default() -> Self {
        Endian::BigEndian
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MappingEntry {
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub address: u16,
    pub size: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: ObjectType,
    pub format: ValueFormat,
    pub address: u16,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub endian: Endian,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlaveConfig {
    pub id: u8,
    #[serde(default)]
    pub mapping: Vec<MappingEntry>,
    #[serde(default)]
    pub conversion: Vec<ConversionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModbusConfig {
    pub modbus_protocol: ModbusTransport,
    pub timeout_polling: u64,
    pub timeout_response: u64,
    pub slaves: Vec<SlaveConfig>,
}

impl ModbusConfig {
    pub fn from_json_str(contents: &str) -> Result<Self, CommonError> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CommonError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CommonError::ConfigRead(path.display().to_string(), e))?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
    {
        "modbus_protocol": "TCP",
        "timeout_polling": 5,
        "timeout_response": 2,
        "slaves": [
            {
                "id": 3,
                "mapping": [
                    { "type": "holding_register", "address": 4096, "size": 4 }
                ],
                "conversion": [
                    { "id": "temp", "type": "holding_register", "format": "int64", "address": 4096, "multiplier": 1, "endian": "big_endian" }
                ]
            }
        ]
    }
    "#;

    #[test]
    fn parses_sample_config() {
        let cfg = ModbusConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(cfg.modbus_protocol, ModbusTransport::Tcp);
        assert_eq!(cfg.slaves.len(), 1);
        assert_eq!(cfg.slaves[0].mapping[0].address, 4096);
        assert_eq!(cfg.slaves[0].conversion[0].format, ValueFormat::Int64);
    }

    #[test]
    fn object_type_function_codes_match_modbus() {
        assert_eq!(ObjectType::Coil.read_function_code(), 0x01);
        assert_eq!(ObjectType::DiscreteInput.read_function_code(), 0x02);
        assert_eq!(ObjectType::HoldingRegister.read_function_code(), 0x03);
        assert_eq!(ObjectType::InputRegister.read_function_code(), 0x04);
    }

    #[test]
    fn register_span_matches_format_width() {
        assert_eq!(ValueFormat::Int16.register_span(), 1);
        assert_eq!(ValueFormat::Float.register_span(), 2);
        assert_eq!(ValueFormat::Double.register_span(), 4);
    }

    #[test]
    fn endian_defaults_to_big_endian() {
        let json = r#"{ "id": "x", "type": "holding_register", "format": "int16", "address": 0 }"#;
        let entry: ConversionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.endian, Endian::BigEndian);
        assert_eq!(entry.multiplier, 1.0);
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(ModbusConfig::from_json_str("{ not json").is_err());
    }
}
