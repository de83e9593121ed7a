//! Engine-owned packet value objects.
//!
//! Nothing here pokes fields into host objects by name: a [`Layout`] from
//! the catalog says which logical [`Field`]s a packet has and how each one
//! is laid out on the wire ([`Wire`]); the encoder supplies a
//! [`FieldValue`] per field and [`Layout::build`] checks that the value
//! matches the declared wire type before a [`Packet`] exists.
//!
//! ## Frame format
//!
//! ```text
//! encode():        VarInt packet_id ‖ field_0 ‖ field_1 ‖ …
//! encode_framed(): VarInt length ‖ encode()
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codec::{self, MetadataFormat, PositionPacking, SlotFormat};
use crate::error::{EngineError, Result};
use crate::types::{BlockPos, ItemStack, Metadata, Profile};

// ---------------------------------------------------------------------------
// Protocol versions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// 1.8.x – fixed-point positions, no off-hand.
    #[serde(rename = "1.8")]
    V1_8,
    /// 1.9.4 – double positions, off-hand, typed metadata.
    #[serde(rename = "1.9")]
    V1_9,
    /// 1.14.4 – modern item slots, no use-bed packet.
    #[serde(rename = "1.14")]
    V1_14,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 3] = [
        ProtocolVersion::V1_8,
        ProtocolVersion::V1_9,
        ProtocolVersion::V1_14,
    ];

    pub fn protocol_number(self) -> i32 {
        match self {
            ProtocolVersion::V1_8 => 47,
            ProtocolVersion::V1_9 => 110,
            ProtocolVersion::V1_14 => 498,
        }
    }

    pub fn from_protocol_number(number: i32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.protocol_number() == number)
            .ok_or_else(|| EngineError::UnknownVersion(number.to_string()))
    }

    /// Minor release number (8, 9, 14) used for feature gating.
    pub fn minor(self) -> u32 {
        match self {
            ProtocolVersion::V1_8 => 8,
            ProtocolVersion::V1_9 => 9,
            ProtocolVersion::V1_14 => 14,
        }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "1.{} (protocol {})", self.minor(), self.protocol_number())
    }
}

impl std::str::FromStr for ProtocolVersion {
    type Err = EngineError;

    /// Accepts release strings (`1.9.4`), host package tags (`v1_9_R2`) and
    /// bare protocol numbers (`110`).
    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        if let Ok(number) = raw.parse::<i32>() {
            return Self::from_protocol_number(number);
        }
        let normalized = raw.to_ascii_lowercase();
        let normalized = normalized.trim_start_matches('v').replace('_', ".");
        let mut parts = normalized.split('.');
        let major = parts.next();
        let minor = parts.next();
        match (major, minor) {
            (Some("1"), Some("8")) => Ok(ProtocolVersion::V1_8),
            (Some("1"), Some("9")) => Ok(ProtocolVersion::V1_9),
            (Some("1"), Some("14")) => Ok(ProtocolVersion::V1_14),
            _ => Err(EngineError::UnknownVersion(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Packet kinds + logical fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    // clientbound
    SpawnPlayer,
    DestroyEntities,
    EntityStatus,
    Animation,
    EntityLook,
    HeadRotation,
    Teleport,
    Equipment,
    UseBed,
    BlockChange,
    EntityMetadata,
    PlayerListItem,
    // serverbound
    UseEntity,
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    EntityId,
    EntityIds,
    ProfileId,
    X,
    Y,
    Z,
    Yaw,
    Pitch,
    HeadYaw,
    OnGround,
    HeldItem,
    Metadata,
    Status,
    Animation,
    Slot,
    Item,
    Location,
    BlockState,
    ListingAction,
    ListingEntries,
    // serverbound use-entity
    Target,
    Action,
}

/// How one field is laid out on the wire for a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    VarInt,
    Int,
    Short,
    Byte,
    UByte,
    Bool,
    Double,
    /// Fixed-point coordinate stored in an `Int`.
    FixedInt,
    /// 1/256-turn angle byte.
    Angle,
    Uuid,
    Position(PositionPacking),
    Metadata(MetadataFormat),
    Slot(SlotFormat),
    /// VarInt count followed by VarInt ids.
    VarIntArray,
    /// VarInt count followed by player-list entries.
    Listing,
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingAction {
    Add,
    Remove,
}

impl ListingAction {
    pub fn wire_id(self) -> i32 {
        match self {
            ListingAction::Add => 0,
            ListingAction::Remove => 4,
        }
    }
}

/// One row of a player-list update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub profile: Profile,
    pub game_mode: i32,
    pub latency: i32,
    pub display_name: Option<String>,
}

impl ListingEntry {
    pub fn for_profile(profile: &Profile) -> Self {
        Self {
            profile: profile.clone(),
            game_mode: 0,
            latency: 1,
            display_name: Some(profile.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum FieldValue {
    VarInt(i32),
    Int(i32),
    Short(i16),
    Byte(i8),
    UByte(u8),
    Bool(bool),
    Double(f64),
    Uuid(Uuid),
    Position(BlockPos),
    Metadata(Metadata),
    Slot(ItemStack),
    VarIntArray(Vec<i32>),
    Listing(ListingAction, Vec<ListingEntry>),
}

impl FieldValue {
    /// Integer view of scalar values, whatever their wire width.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::VarInt(v) | FieldValue::Int(v) => Some(*v as i64),
            FieldValue::Short(v) => Some(*v as i64),
            FieldValue::Byte(v) => Some(*v as i64),
            FieldValue::UByte(v) => Some(*v as i64),
            FieldValue::Bool(v) => Some(*v as i64),
            _ => None,
        }
    }

    fn fits(&self, wire: Wire) -> bool {
        matches!(
            (self, wire),
            (FieldValue::VarInt(_), Wire::VarInt)
                | (FieldValue::Int(_), Wire::Int)
                | (FieldValue::Int(_), Wire::FixedInt)
                | (FieldValue::Short(_), Wire::Short)
                | (FieldValue::Byte(_), Wire::Byte)
                | (FieldValue::Byte(_), Wire::Angle)
                | (FieldValue::UByte(_), Wire::UByte)
                | (FieldValue::Bool(_), Wire::Bool)
                | (FieldValue::Double(_), Wire::Double)
                | (FieldValue::Uuid(_), Wire::Uuid)
                | (FieldValue::Position(_), Wire::Position(_))
                | (FieldValue::Metadata(_), Wire::Metadata(_))
                | (FieldValue::Slot(_), Wire::Slot(_))
                | (FieldValue::VarIntArray(_), Wire::VarIntArray)
                | (FieldValue::Listing(..), Wire::Listing)
        )
    }
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Packet id + ordered field layout for one version.
#[derive(Debug)]
pub struct Layout {
    pub kind: PacketKind,
    pub id: i32,
    pub fields: &'static [(Field, Wire)],
}

impl Layout {
    pub fn wire_of(&self, field: Field) -> Option<Wire> {
        self.fields
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, w)| *w)
    }

    /// Build a packet, asking `value_for` for every field in layout order.
    pub fn build<F>(&'static self, version: ProtocolVersion, mut value_for: F) -> Result<Packet>
    where
        F: FnMut(Field, Wire) -> Result<FieldValue>,
    {
        let mut values = Vec::with_capacity(self.fields.len());
        for &(field, wire) in self.fields {
            let value = value_for(field, wire)?;
            if !value.fits(wire) {
                return Err(EngineError::unsupported(
                    version,
                    format!("{:?}.{:?} as {:?}", self.kind, field, wire),
                ));
            }
            values.push((field, value));
        }
        Ok(Packet {
            kind: self.kind,
            id: self.id,
            layout: self,
            values,
        })
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub id: i32,
    layout: &'static Layout,
    values: Vec<(Field, FieldValue)>,
}

impl Packet {
    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, v)| v)
    }

    pub fn fields(&self) -> impl Iterator<Item = &(Field, FieldValue)> {
        self.values.iter()
    }

    /// `VarInt id ‖ fields`.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(32);
        codec::put_var_int(&mut buf, self.id);
        for ((_, value), &(_, wire)) in self.values.iter().zip(self.layout.fields) {
            write_value(&mut buf, value, wire);
        }
        buf.freeze()
    }

    /// `VarInt length ‖ encode()`.
    pub fn encode_framed(&self) -> Bytes {
        let body = self.encode();
        let mut buf = BytesMut::with_capacity(body.len() + 5);
        codec::put_var_int(&mut buf, body.len() as i32);
        buf.put_slice(&body);
        buf.freeze()
    }
}

fn write_value(buf: &mut BytesMut, value: &FieldValue, wire: Wire) {
    match (value, wire) {
        (FieldValue::VarInt(v), _) => codec::put_var_int(buf, *v),
        (FieldValue::Int(v), _) => buf.put_i32(*v),
        (FieldValue::Short(v), _) => buf.put_i16(*v),
        (FieldValue::Byte(v), _) => buf.put_i8(*v),
        (FieldValue::UByte(v), _) => buf.put_u8(*v),
        (FieldValue::Bool(v), _) => buf.put_u8(*v as u8),
        (FieldValue::Double(v), _) => buf.put_f64(*v),
        (FieldValue::Uuid(id), _) => codec::put_uuid(buf, id),
        (FieldValue::Position(pos), Wire::Position(packing)) => {
            buf.put_i64(codec::pack_position(*pos, packing))
        }
        (FieldValue::Metadata(meta), Wire::Metadata(format)) => {
            codec::put_metadata(buf, meta, format)
        }
        (FieldValue::Slot(item), Wire::Slot(format)) => codec::put_slot(buf, item, format),
        (FieldValue::VarIntArray(ids), _) => {
            codec::put_var_int(buf, ids.len() as i32);
            for id in ids {
                codec::put_var_int(buf, *id);
            }
        }
        (FieldValue::Listing(action, entries), _) => write_listing(buf, *action, entries),
        // `Layout::build` rejects mismatched pairs before a packet exists.
        _ => unreachable!("value {:?} does not fit {:?}", value, wire),
    }
}

fn write_listing(buf: &mut BytesMut, action: ListingAction, entries: &[ListingEntry]) {
    codec::put_var_int(buf, entries.len() as i32);
    for entry in entries {
        codec::put_uuid(buf, &entry.profile.id);
        if action == ListingAction::Remove {
            continue;
        }
        codec::put_string(buf, &entry.profile.name);
        codec::put_var_int(buf, entry.profile.properties.len() as i32);
        for prop in &entry.profile.properties {
            codec::put_string(buf, &prop.name);
            codec::put_string(buf, &prop.value);
            buf.put_u8(prop.signature.is_some() as u8);
            if let Some(sig) = &prop.signature {
                codec::put_string(buf, sig);
            }
        }
        codec::put_var_int(buf, entry.game_mode);
        codec::put_var_int(buf, entry.latency);
        match &entry.display_name {
            Some(name) => {
                buf.put_u8(1);
                let chat = serde_json::json!({ "text": name }).to_string();
                codec::put_string(buf, &chat);
            }
            None => buf.put_u8(0),
        }
    }
}
