//! Numeric conversions and primitive wire encodings.
//!
//! Two independent angle derivations exist and they are **not**
//! interchangeable:
//!
//! | Function         | Formula                              | Used by                    |
//! |------------------|--------------------------------------|----------------------------|
//! | [`to_byte`]      | `trunc(v * 256 / 360)`               | every rotation packet      |
//! | [`normalize_view`] | `trunc((v mod 360) * 256 / 360)`   | the focus entity-look only |
//!
//! Positions use [`to_int`] (`floor(c * 32)`) on layouts that carry
//! fixed-point coordinates.

use bytes::{Buf, BufMut, BytesMut};
use uuid::Uuid;

use crate::error::ClassificationError;
use crate::types::{BlockPos, ItemStack, MetaValue, Metadata};

// ---------------------------------------------------------------------------
// Numeric semantics
// ---------------------------------------------------------------------------

/// Fixed-point coordinate, 32 units per block.
pub fn to_int(coordinate: f64) -> i32 {
    (coordinate * 32.0).floor() as i32
}

/// Angle in 1/256 turns, truncated toward zero, no wrap.
pub fn angle_steps(view: f32) -> i32 {
    (view as f64 * 256.0 / 360.0) as i32
}

/// Angle in 1/256 turns after wrapping into `[0, 360)`.
pub fn wrapped_angle_steps(view: f32) -> i32 {
    (view.rem_euclid(360.0) as f64 * 256.0 / 360.0) as i32
}

/// Wire angle byte for rotation packets. The final cast keeps the low
/// eight bits.
pub fn to_byte(view: f32) -> i8 {
    angle_steps(view) as i8
}

/// Wire angle byte for the focus entity-look.
pub fn normalize_view(view: f32) -> i8 {
    wrapped_angle_steps(view) as i8
}

/// Yaw/pitch (degrees) looking along `(dx, dy, dz)`. A purely vertical
/// direction keeps `current_yaw`.
pub fn look_angles(dx: f64, dy: f64, dz: f64, current_yaw: f32) -> (f32, f32) {
    if dx == 0.0 && dz == 0.0 {
        let pitch = if dy > 0.0 { -90.0 } else { 90.0 };
        return (current_yaw, pitch);
    }
    let tau = std::f64::consts::TAU;
    let theta = (-dx).atan2(dz);
    let yaw = ((theta + tau) % tau).to_degrees();
    let horizontal = (dx * dx + dz * dz).sqrt();
    let pitch = (-dy / horizontal).atan().to_degrees();
    (yaw as f32, pitch as f32)
}

// ---------------------------------------------------------------------------
// VarInt
// ---------------------------------------------------------------------------

pub fn put_var_int(buf: &mut BytesMut, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7F == 0 {
            buf.put_u8(v as u8);
            return;
        }
        buf.put_u8(((v & 0x7F) | 0x80) as u8);
        v >>= 7;
    }
}

pub fn var_int_len(value: i32) -> usize {
    let mut v = value as u32;
    let mut len = 1;
    while v & !0x7F != 0 {
        v >>= 7;
        len += 1;
    }
    len
}

pub fn get_var_int(buf: &mut impl Buf) -> Result<i32, ClassificationError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        if !buf.has_remaining() {
            return Err(ClassificationError::Truncated("varint"));
        }
        let byte = buf.get_u8();
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(ClassificationError::VarIntTooLong)
}

pub fn get_f32(buf: &mut impl Buf, what: &'static str) -> Result<f32, ClassificationError> {
    if buf.remaining() < 4 {
        return Err(ClassificationError::Truncated(what));
    }
    Ok(buf.get_f32())
}

// ---------------------------------------------------------------------------
// Composite writers
// ---------------------------------------------------------------------------

pub fn put_string(buf: &mut BytesMut, s: &str) {
    put_var_int(buf, s.len() as i32);
    buf.put_slice(s.as_bytes());
}

pub fn put_uuid(buf: &mut BytesMut, id: &Uuid) {
    buf.put_u128(id.as_u128());
}

/// Packed block position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionPacking {
    /// `x:26 | y:12 | z:26`
    Legacy,
    /// `x:26 | z:26 | y:12`
    Modern,
}

pub fn pack_position(pos: BlockPos, packing: PositionPacking) -> i64 {
    let x = (pos.x as i64) & 0x3FF_FFFF;
    let y = (pos.y as i64) & 0xFFF;
    let z = (pos.z as i64) & 0x3FF_FFFF;
    match packing {
        PositionPacking::Legacy => (x << 38) | (y << 26) | z,
        PositionPacking::Modern => (x << 38) | (z << 12) | y,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataFormat {
    /// Header byte `type << 5 | index`, terminated by `0x7F`.
    Legacy,
    /// `index`, VarInt type, value, terminated by `0xFF`. Boolean is
    /// type 6 (1.9 through 1.12).
    Typed9,
    /// As [`Typed9`](Self::Typed9) with optional chat at 5, so Boolean
    /// moves to type 7 (1.13 onward).
    Typed13,
}

impl MetadataFormat {
    fn boolean_type(self) -> i32 {
        match self {
            MetadataFormat::Typed13 => 7,
            _ => 6,
        }
    }
}

pub fn put_metadata(buf: &mut BytesMut, meta: &Metadata, format: MetadataFormat) {
    for entry in &meta.entries {
        match format {
            MetadataFormat::Legacy => {
                let type_id: u8 = match entry.value {
                    MetaValue::Byte(_) | MetaValue::Bool(_) => 0,
                    MetaValue::VarInt(_) => 2,
                    MetaValue::Float(_) => 3,
                    MetaValue::Str(_) => 4,
                };
                buf.put_u8((type_id << 5) | (entry.index & 0x1F));
                match &entry.value {
                    MetaValue::Byte(b) => buf.put_i8(*b),
                    MetaValue::Bool(b) => buf.put_u8(*b as u8),
                    // Legacy integers are fixed-width.
                    MetaValue::VarInt(v) => buf.put_i32(*v),
                    MetaValue::Float(f) => buf.put_f32(*f),
                    MetaValue::Str(s) => put_string(buf, s),
                }
            }
            MetadataFormat::Typed9 | MetadataFormat::Typed13 => {
                buf.put_u8(entry.index);
                let type_id = match entry.value {
                    MetaValue::Byte(_) => 0,
                    MetaValue::VarInt(_) => 1,
                    MetaValue::Float(_) => 2,
                    MetaValue::Str(_) => 3,
                    MetaValue::Bool(_) => format.boolean_type(),
                };
                put_var_int(buf, type_id);
                match &entry.value {
                    MetaValue::Byte(b) => buf.put_i8(*b),
                    MetaValue::VarInt(v) => put_var_int(buf, *v),
                    MetaValue::Float(f) => buf.put_f32(*f),
                    MetaValue::Str(s) => put_string(buf, s),
                    MetaValue::Bool(b) => buf.put_u8(*b as u8),
                }
            }
        }
    }
    match format {
        MetadataFormat::Legacy => buf.put_u8(0x7F),
        MetadataFormat::Typed9 | MetadataFormat::Typed13 => buf.put_u8(0xFF),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotFormat {
    /// Short id (-1 = empty), Byte count, Short damage, NBT.
    Legacy,
    /// Bool present, VarInt id, Byte count, NBT.
    Modern,
}

const NBT_END: u8 = 0x00;

pub fn put_slot(buf: &mut BytesMut, item: &ItemStack, format: SlotFormat) {
    match format {
        SlotFormat::Legacy => {
            if item.is_empty() {
                buf.put_i16(-1);
                return;
            }
            buf.put_i16(item.id as i16);
            buf.put_u8(item.count);
            buf.put_i16(item.damage);
            buf.put_u8(NBT_END);
        }
        SlotFormat::Modern => {
            if item.is_empty() {
                buf.put_u8(0);
                return;
            }
            buf.put_u8(1);
            put_var_int(buf, item.id);
            buf.put_u8(item.count);
            buf.put_u8(NBT_END);
        }
    }
}
