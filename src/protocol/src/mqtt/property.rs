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

//! MQTT 5 property system (§4.3): a typed, ordered key-value list attached
//! to most packet types. Every identifier has a fixed wire type and a fixed
//! set of commands it's legal in; `PropertyBag` enforces both.

use crate::error::ProtocolError;
use crate::mqtt::reason_code::Command;
use crate::primitives::{read_binary, read_string, read_u16, read_u32, read_u8, write_binary, write_string, write_u16, write_u32, write_u8};
use crate::varint::{read_variable_int, variable_int_len, write_variable_int};
use bytes::{Buf, BufMut, Bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyId {
    PayloadFormatIndicator = 1,
    MessageExpiryInterval = 2,
    ContentType = 3,
    ResponseTopic = 8,
    CorrelationData = 9,
    SubscriptionIdentifier = 11,
    SessionExpiryInterval = 17,
    AssignedClientIdentifier = 18,
    ServerKeepAlive = 19,
    AuthenticationMethod = 21,
    AuthenticationData = 22,
    RequestProblemInformation = 23,
    WillDelayInterval = 24,
    RequestResponseInformation = 25,
    ResponseInformation = 26,
    ServerReference = 28,
    ReasonString = 31,
    ReceiveMaximum = 33,
    TopicAliasMaximum = 34,
    TopicAlias = 35,
    MaximumQos = 36,
    RetainAvailable = 37,
    UserProperty = 38,
    MaximumPacketSize = 39,
    WildcardSubscriptionAvailable = 40,
    SubscriptionIdentifierAvailable = 41,
    SharedSubscriptionAvailable = 42,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireType {
    Byte,
    Int16,
    Int32,
    VarInt,
    Binary,
    String,
    StringPair,
}

impl PropertyId {
    fn from_u32(id: u32) -> Result<Self, ProtocolError> {
        use PropertyId::*;
        Ok(match id {
            1 => PayloadFormatIndicator,
            2 => MessageExpiryInterval,
            3 => ContentType,
            8 => ResponseTopic,
            9 => CorrelationData,
            11 => SubscriptionIdentifier,
            17 => SessionExpiryInterval,
            18 => AssignedClientIdentifier,
            19 => ServerKeepAlive,
            21 => AuthenticationMethod,
            22 => AuthenticationData,
            23 => RequestProblemInformation,
            24 => WillDelayInterval,
            25 => RequestResponseInformation,
            26 => ResponseInformation,
            28 => ServerReference,
            31 => ReasonString,
            33 => ReceiveMaximum,
            34 => TopicAliasMaximum,
            35 => TopicAlias,
            36 => MaximumQos,
            37 => RetainAvailable,
            38 => UserProperty,
            39 => MaximumPacketSize,
            40 => WildcardSubscriptionAvailable,
            41 => SubscriptionIdentifierAvailable,
            42 => SharedSubscriptionAvailable,
            other => {
                return Err(ProtocolError::protocol(format!(
                    "unknown property identifier {other}"
                )))
            }
        })
    }

    fn wire_type(self) -> WireType {
        use PropertyId::*;
        match self {
            PayloadFormatIndicator | RequestProblemInformation | RequestResponseInformation
            | MaximumQos | RetainAvailable | WildcardSubscriptionAvailable
            | SubscriptionIdentifierAvailable | SharedSubscriptionAvailable => WireType::Byte,
            ServerKeepAlive | ReceiveMaximum | TopicAliasMaximum | TopicAlias => WireType::Int16,
            MessageExpiryInterval | SessionExpiryInterval | WillDelayInterval
            | MaximumPacketSize => WireType::Int32,
            SubscriptionIdentifier => WireType::VarInt,
            CorrelationData | AuthenticationData => WireType::Binary,
            ContentType | ResponseTopic | AssignedClientIdentifier | AuthenticationMethod
            | ResponseInformation | ServerReference | ReasonString => WireType::String,
            UserProperty => WireType::StringPair,
        }
    }

    /// Commands this property is legal in, per §4.3's table (filled out to
    /// the standard MQTT 5 property-to-packet legality where the spec text
    /// doesn't spell it out explicitly, e.g. `PayloadFormatIndicator`).
    fn legal_in(self) -> &'static [Command] {
        use Command::*;
        use PropertyId::*;
        match self {
            PayloadFormatIndicator | MessageExpiryInterval | ContentType | ResponseTopic
            | CorrelationData => &[Publish, Will],
            SubscriptionIdentifier => &[Publish, Subscribe],
            SessionExpiryInterval => &[Connect, Connack, Disconnect],
            AssignedClientIdentifier => &[Connack],
            ServerKeepAlive => &[Connack],
            AuthenticationMethod | AuthenticationData => &[Connect, Connack, Auth],
            RequestProblemInformation => &[Connect],
            WillDelayInterval => &[Will],
            RequestResponseInformation => &[Connect],
            ResponseInformation => &[Connack],
            ServerReference => &[Connack, Disconnect],
            ReasonString => &[
                Connack, Puback, Pubrec, Pubrel, Pubcomp, Suback, Unsuback, Disconnect, Auth,
            ],
            ReceiveMaximum | TopicAliasMaximum => &[Connect, Connack],
            TopicAlias => &[Publish],
            MaximumQos => &[Connack],
            RetainAvailable => &[Connack],
            UserProperty => &[
                Connect, Connack, Publish, Puback, Pubrec, Pubrel, Pubcomp, Subscribe, Suback,
                Unsubscribe, Unsuback, Disconnect, Auth, Will,
            ],
            MaximumPacketSize => &[Connect, Connack],
            WildcardSubscriptionAvailable | SubscriptionIdentifierAvailable
            | SharedSubscriptionAvailable => &[Connack],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    Byte(PropertyId, u8),
    Int16(PropertyId, u16),
    Int32(PropertyId, u32),
    VarInt(PropertyId, u32),
    Binary(PropertyId, Bytes),
    String(PropertyId, String),
    StringPair(PropertyId, String, String),
}

impl Property {
    pub fn id(&self) -> PropertyId {
        match self {
            Property::Byte(id, _)
            | Property::Int16(id, _)
            | Property::Int32(id, _)
            | Property::VarInt(id, _)
            | Property::Binary(id, _)
            | Property::String(id, _)
            | Property::StringPair(id, _, _) => *id,
        }
    }

    fn encode(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        write_variable_int(buf, self.id() as u32)?;
        match self {
            Property::Byte(_, v) => write_u8(buf, *v),
            Property::Int16(_, v) => write_u16(buf, *v),
            Property::Int32(_, v) => write_u32(buf, *v),
            Property::VarInt(_, v) => {
                write_variable_int(buf, *v)?;
            }
            Property::Binary(_, v) => write_binary(buf, v)?,
            Property::String(_, v) => write_string(buf, v)?,
            Property::StringPair(_, k, v) => {
                write_string(buf, k)?;
                write_string(buf, v)?;
            }
        }
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        let id_len = variable_int_len(self.id() as u32);
        let value_len = match self {
            Property::Byte(..) => 1,
            Property::Int16(..) => 2,
            Property::Int32(..) => 4,
            Property::VarInt(_, v) => variable_int_len(*v),
            Property::Binary(_, v) => 2 + v.len(),
            Property::String(_, v) => 2 + v.len(),
            Property::StringPair(_, k, v) => 2 + k.len() + 2 + v.len(),
        };
        id_len + value_len
    }

    fn decode_one(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let (raw_id, _) = read_variable_int(buf)?;
        let id = PropertyId::from_u32(raw_id)?;
        Ok(match id.wire_type() {
            WireType::Byte => Property::Byte(id, read_u8(buf)?),
            WireType::Int16 => Property::Int16(id, read_u16(buf)?),
            WireType::Int32 => Property::Int32(id, read_u32(buf)?),
            WireType::VarInt => {
                let (v, _) = read_variable_int(buf)?;
                Property::VarInt(id, v)
            }
            WireType::Binary => Property::Binary(id, read_binary(buf)?),
            WireType::String => Property::String(id, read_string(buf)?),
            WireType::StringPair => {
                let k = read_string(buf)?;
                let v = read_string(buf)?;
                Property::StringPair(id, k, v)
            }
        })
    }
}

/// An ordered set of properties attached to one packet (or one Will). All
/// identifiers except `UserProperty` must be unique; command legality is
/// checked once, after the whole set has been parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyBag {
    properties: Vec<Property>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// Adds a property, rejecting a duplicate identifier unless it's
    /// `UserProperty` (which may repeat).
    pub fn add(&mut self, property: Property) -> Result<(), ProtocolError> {
        if property.id() != PropertyId::UserProperty
            && self.properties.iter().any(|p| p.id() == property.id())
        {
            return Err(ProtocolError::protocol(format!(
                "duplicate property identifier {:?}",
                property.id()
            )));
        }
        self.properties.push(property);
        Ok(())
    }

    pub fn get_int32(&self, id: PropertyId) -> Option<u32> {
        self.properties.iter().find_map(|p| match p {
            Property::Int32(pid, v) if *pid == id => Some(*v),
            _ => None,
        })
    }

    pub fn get_int16(&self, id: PropertyId) -> Option<u16> {
        self.properties.iter().find_map(|p| match p {
            Property::Int16(pid, v) if *pid == id => Some(*v),
            _ => None,
        })
    }

    pub fn get_byte(&self, id: PropertyId) -> Option<u8> {
        self.properties.iter().find_map(|p| match p {
            Property::Byte(pid, v) if *pid == id => Some(*v),
            _ => None,
        })
    }

    pub fn get_string(&self, id: PropertyId) -> Option<&str> {
        self.properties.iter().find_map(|p| match p {
            Property::String(pid, v) if *pid == id => Some(v.as_str()),
            _ => None,
        })
    }

    pub fn get_varint(&self, id: PropertyId) -> Option<u32> {
        self.properties.iter().find_map(|p| match p {
            Property::VarInt(pid, v) if *pid == id => Some(*v),
            _ => None,
        })
    }

    fn encoded_len(&self) -> usize {
        self.properties.iter().map(Property::encoded_len).sum()
    }

    /// Writes the var-int length prefix followed by each encoded property.
    pub fn encode(&self, buf: &mut impl BufMut) -> Result<(), ProtocolError> {
        write_variable_int(buf, self.encoded_len() as u32)?;
        for property in &self.properties {
            property.encode(buf)?;
        }
        Ok(())
    }

    /// Parses a var-int length prefix, then that many bytes worth of typed
    /// entries, then runs the command-legality check over the whole set.
    pub fn decode(buf: &mut impl Buf, command: Command) -> Result<Self, ProtocolError> {
        let (len, _) = read_variable_int(buf)?;
        let len = len as usize;
        if buf.remaining() < len {
            return Err(ProtocolError::malformed(
                "property length exceeds remaining packet bytes",
            ));
        }
        let mut slice = buf.copy_to_bytes(len);
        let mut bag = PropertyBag::new();
        while slice.has_remaining() {
            let property = Property::decode_one(&mut slice)?;
            bag.add(property)?;
        }
        bag.check_legality(command)?;
        Ok(bag)
    }

    pub fn check_legality(&self, command: Command) -> Result<(), ProtocolError> {
        for property in &self.properties {
            if !property.id().legal_in().contains(&command) {
                return Err(ProtocolError::protocol(format!(
                    "property {:?} is not legal in {:?}",
                    property.id(),
                    command
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trips_a_mixed_property_set() {
        let mut bag = PropertyBag::new();
        bag.add(Property::Int32(PropertyId::SessionExpiryInterval, 3600))
            .unwrap();
        bag.add(Property::StringPair(
            PropertyId::UserProperty,
            "k1".into(),
            "v1".into(),
        ))
        .unwrap();
        bag.add(Property::StringPair(
            PropertyId::UserProperty,
            "k2".into(),
            "v2".into(),
        ))
        .unwrap();

        let mut buf = BytesMut::new();
        bag.encode(&mut buf).unwrap();
        let decoded = PropertyBag::decode(&mut buf, Command::Connect).unwrap();
        assert_eq!(decoded, bag);
    }

    #[test]
    fn rejects_duplicate_non_user_property() {
        let mut bag = PropertyBag::new();
        bag.add(Property::Int32(PropertyId::SessionExpiryInterval, 1))
            .unwrap();
        assert!(bag
            .add(Property::Int32(PropertyId::SessionExpiryInterval, 2))
            .is_err());
    }

    #[test]
    fn enforces_command_legality() {
        let mut bag = PropertyBag::new();
        bag.add(Property::Int16(PropertyId::TopicAlias, 1)).unwrap();
        // TopicAlias is legal in Publish only.
        assert!(bag.check_legality(Command::Connect).is_err());
        assert!(bag.check_legality(Command::Publish).is_ok());
    }

    #[test]
    fn will_delay_interval_only_legal_in_will() {
        let mut bag = PropertyBag::new();
        bag.add(Property::Int32(PropertyId::WillDelayInterval, 30))
            .unwrap();
        assert!(bag.check_legality(Command::Connect).is_err());
        assert!(bag.check_legality(Command::Will).is_ok());
    }

    #[test]
    fn user_property_legal_everywhere() {
        let mut bag = PropertyBag::new();
        bag.add(Property::StringPair(
            PropertyId::UserProperty,
            "a".into(),
            "b".into(),
        ))
        .unwrap();
        for cmd in [
            Command::Connect,
            Command::Publish,
            Command::Suback,
            Command::Will,
        ] {
            assert!(bag.check_legality(cmd).is_ok());
        }
    }
}
