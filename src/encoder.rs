//! Packet encoder – the per-version strategy selected once at startup.
//!
//! The encoder is pure: it reads an actor's *post-mutation* state through an
//! [`ActorView`] and returns the packets to send, in send order. It never
//! mutates state, talks to a connection, or publishes events.

use crate::catalog::Catalog;
use crate::codec::{normalize_view, to_byte, to_int};
use crate::error::{EngineError, Result};
use crate::protocol::{
    Field, FieldValue, ListingAction, ListingEntry, Packet, PacketKind, ProtocolVersion, Wire,
};
use crate::types::{
    Animation, BlockPos, EquipmentSlot, ItemStack, Metadata, Pose, Profile, Status,
};

/// How far a sleeping body drops below its standing height.
pub const BED_SINK: f64 = 0.3;

/// Borrowed snapshot of everything the encoder may read from an actor.
#[derive(Debug, Clone, Copy)]
pub struct ActorView<'a> {
    pub entity_id: i32,
    pub profile: &'a Profile,
    pub pose: &'a Pose,
    pub metadata: &'a Metadata,
}

/// One mutating operation, with its operation-specific inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    Spawn,
    Destroy,
    PlayStatus(Status),
    PlayAnimation(Animation),
    RotateHead { yaw: f32, pitch: f32 },
    /// Destination is the view's pose.
    Teleport { on_ground: bool },
    Equip { slot: EquipmentSlot, item: ItemStack },
    Sleep { state: bool },
    /// Sends the view's metadata (flag byte already updated).
    Sneak,
    /// Sends the view's pose angles with the focus rounding policy.
    Focus,
    ModifyListing(ListingAction),
}

#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    catalog: &'static Catalog,
}

impl Encoder {
    pub fn for_version(version: ProtocolVersion) -> Self {
        Self {
            catalog: Catalog::for_version(version),
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        self.catalog.version
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    /// Encode `op` against `actor`. All packets are built before any is
    /// returned, so an unsupported step fails the whole operation.
    pub fn encode(&self, op: Operation, actor: ActorView<'_>) -> Result<Vec<Packet>> {
        let id = actor.entity_id;
        match op {
            Operation::Spawn => Ok(vec![self.spawn(
                id,
                actor.profile,
                actor.pose,
                actor.metadata,
            )?]),
            Operation::Destroy => Ok(vec![self.destroy(id)?]),
            Operation::PlayStatus(status) => Ok(vec![self.play_status(id, status)?]),
            Operation::PlayAnimation(animation) => Ok(vec![self.play_animation(id, animation)?]),
            Operation::RotateHead { yaw, pitch } => self.rotate_head(id, yaw, pitch),
            Operation::Teleport { on_ground } => self.teleport(id, actor.pose, on_ground),
            Operation::Equip { slot, item } => Ok(vec![self.equip(id, slot, &item)?]),
            Operation::Sleep { state } => self.sleep(id, actor.pose, state),
            Operation::Sneak => Ok(vec![self.entity_metadata(id, actor.metadata)?]),
            Operation::Focus => self.focus(id, actor.pose),
            Operation::ModifyListing(action) => {
                Ok(vec![self.modify_listing(actor.profile, action)?])
            }
        }
    }

    // -----------------------------------------------------------------------
    // Single packets
    // -----------------------------------------------------------------------

    pub fn spawn(
        &self,
        entity_id: i32,
        profile: &Profile,
        pose: &Pose,
        metadata: &Metadata,
    ) -> Result<Packet> {
        let kind = PacketKind::SpawnPlayer;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, wire| match field {
                Field::EntityId => self.entity_id(kind, wire, entity_id),
                Field::ProfileId => Ok(FieldValue::Uuid(profile.id)),
                Field::X => self.coordinate(kind, wire, pose.x),
                Field::Y => self.coordinate(kind, wire, pose.y),
                Field::Z => self.coordinate(kind, wire, pose.z),
                Field::Yaw => Ok(FieldValue::Byte(to_byte(pose.yaw))),
                Field::Pitch => Ok(FieldValue::Byte(to_byte(pose.pitch))),
                // Nothing held.
                Field::HeldItem => Ok(FieldValue::Short(0)),
                Field::Metadata => Ok(FieldValue::Metadata(metadata.clone())),
                other => Err(self.unexpected(kind, other)),
            })
    }

    pub fn destroy(&self, entity_id: i32) -> Result<Packet> {
        let kind = PacketKind::DestroyEntities;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, _| match field {
                Field::EntityIds => Ok(FieldValue::VarIntArray(vec![entity_id])),
                other => Err(self.unexpected(kind, other)),
            })
    }

    pub fn play_status(&self, entity_id: i32, status: Status) -> Result<Packet> {
        let kind = PacketKind::EntityStatus;
        let index = self.catalog.status_index(status)?;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, wire| match field {
                Field::EntityId => self.entity_id(kind, wire, entity_id),
                Field::Status => Ok(FieldValue::Byte(index)),
                other => Err(self.unexpected(kind, other)),
            })
    }

    pub fn play_animation(&self, entity_id: i32, animation: Animation) -> Result<Packet> {
        let kind = PacketKind::Animation;
        let index = self.catalog.animation_index(animation)?;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, wire| match field {
                Field::EntityId => self.entity_id(kind, wire, entity_id),
                Field::Animation => Ok(FieldValue::UByte(index)),
                other => Err(self.unexpected(kind, other)),
            })
    }

    pub fn equip(&self, entity_id: i32, slot: EquipmentSlot, item: &ItemStack) -> Result<Packet> {
        let kind = PacketKind::Equipment;
        let index = self.catalog.equipment_index(slot)?;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, wire| match field {
                Field::EntityId => self.entity_id(kind, wire, entity_id),
                Field::Slot => match wire {
                    Wire::Short => Ok(FieldValue::Short(index as i16)),
                    Wire::VarInt => Ok(FieldValue::VarInt(index)),
                    _ => Err(self.unexpected(kind, field)),
                },
                Field::Item => Ok(FieldValue::Slot(*item)),
                other => Err(self.unexpected(kind, other)),
            })
    }

    pub fn entity_metadata(&self, entity_id: i32, metadata: &Metadata) -> Result<Packet> {
        let kind = PacketKind::EntityMetadata;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, wire| match field {
                Field::EntityId => self.entity_id(kind, wire, entity_id),
                Field::Metadata => Ok(FieldValue::Metadata(metadata.clone())),
                other => Err(self.unexpected(kind, other)),
            })
    }

    /// A listing update carrying exactly one entry.
    pub fn modify_listing(&self, profile: &Profile, action: ListingAction) -> Result<Packet> {
        let kind = PacketKind::PlayerListItem;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, _| match field {
                Field::ListingAction => Ok(FieldValue::VarInt(action.wire_id())),
                Field::ListingEntries => Ok(FieldValue::Listing(
                    action,
                    vec![ListingEntry::for_profile(profile)],
                )),
                other => Err(self.unexpected(kind, other)),
            })
    }

    // -----------------------------------------------------------------------
    // Multi-packet operations
    // -----------------------------------------------------------------------

    /// Entity-look (on ground) followed by head-rotation (yaw only).
    pub fn rotate_head(&self, entity_id: i32, yaw: f32, pitch: f32) -> Result<Vec<Packet>> {
        let look = self.entity_look(entity_id, to_byte(yaw), to_byte(pitch), true)?;
        let head = self.head_rotation(entity_id, to_byte(yaw))?;
        Ok(vec![look, head])
    }

    /// Absolute teleport to `pose`, then the rotate-head pair.
    pub fn teleport(&self, entity_id: i32, pose: &Pose, on_ground: bool) -> Result<Vec<Packet>> {
        let mut packets = vec![self.teleport_packet(entity_id, pose, on_ground)?];
        packets.extend(self.rotate_head(entity_id, pose.yaw, pose.pitch)?);
        Ok(packets)
    }

    /// Sleeping places a bed one block up on each axis from the current
    /// block, overrides that block client-side, puts the actor into it and
    /// drops the body [`BED_SINK`] blocks so it rests on the mattress.
    /// Waking plays the leave-bed animation. Both end with rotate-head.
    pub fn sleep(&self, entity_id: i32, pose: &Pose, state: bool) -> Result<Vec<Packet>> {
        let mut packets = Vec::with_capacity(5);
        if state {
            let here = pose.block();
            let bed = BlockPos::new(here.x + 1, here.y + 1, here.z + 1);
            let block_state = self.catalog.bed_block_state()?;

            let kind = PacketKind::BlockChange;
            packets.push(
                self.catalog
                    .layout(kind)?
                    .build(self.version(), |field, _| match field {
                        Field::Location => Ok(FieldValue::Position(bed)),
                        Field::BlockState => Ok(FieldValue::VarInt(block_state)),
                        other => Err(self.unexpected(kind, other)),
                    })?,
            );

            let kind = PacketKind::UseBed;
            packets.push(
                self.catalog
                    .layout(kind)?
                    .build(self.version(), |field, wire| match field {
                        Field::EntityId => self.entity_id(kind, wire, entity_id),
                        Field::Location => Ok(FieldValue::Position(bed)),
                        other => Err(self.unexpected(kind, other)),
                    })?,
            );

            let lying = pose.offset(0.0, -BED_SINK, 0.0);
            packets.push(self.teleport_packet(entity_id, &lying, true)?);
        } else {
            packets.push(self.play_animation(entity_id, Animation::LeaveBed)?);
        }
        packets.extend(self.rotate_head(entity_id, pose.yaw, pose.pitch)?);
        Ok(packets)
    }

    /// Focus look: angles go through [`normalize_view`], not [`to_byte`],
    /// and the look is sent off-ground; the rotate-head pair follows.
    pub fn focus(&self, entity_id: i32, pose: &Pose) -> Result<Vec<Packet>> {
        let look = self.entity_look(
            entity_id,
            normalize_view(pose.yaw),
            normalize_view(pose.pitch),
            false,
        )?;
        let mut packets = vec![look];
        packets.extend(self.rotate_head(entity_id, pose.yaw, pose.pitch)?);
        Ok(packets)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn teleport_packet(&self, entity_id: i32, pose: &Pose, on_ground: bool) -> Result<Packet> {
        let kind = PacketKind::Teleport;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, wire| match field {
                Field::EntityId => self.entity_id(kind, wire, entity_id),
                Field::X => self.coordinate(kind, wire, pose.x),
                Field::Y => self.coordinate(kind, wire, pose.y),
                Field::Z => self.coordinate(kind, wire, pose.z),
                Field::Yaw => Ok(FieldValue::Byte(to_byte(pose.yaw))),
                Field::Pitch => Ok(FieldValue::Byte(to_byte(pose.pitch))),
                Field::OnGround => Ok(FieldValue::Bool(on_ground)),
                other => Err(self.unexpected(kind, other)),
            })
    }

    fn entity_look(&self, entity_id: i32, yaw: i8, pitch: i8, on_ground: bool) -> Result<Packet> {
        let kind = PacketKind::EntityLook;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, wire| match field {
                Field::EntityId => self.entity_id(kind, wire, entity_id),
                Field::Yaw => Ok(FieldValue::Byte(yaw)),
                Field::Pitch => Ok(FieldValue::Byte(pitch)),
                Field::OnGround => Ok(FieldValue::Bool(on_ground)),
                other => Err(self.unexpected(kind, other)),
            })
    }

    fn head_rotation(&self, entity_id: i32, yaw: i8) -> Result<Packet> {
        let kind = PacketKind::HeadRotation;
        self.catalog
            .layout(kind)?
            .build(self.version(), |field, wire| match field {
                Field::EntityId => self.entity_id(kind, wire, entity_id),
                Field::HeadYaw => Ok(FieldValue::Byte(yaw)),
                other => Err(self.unexpected(kind, other)),
            })
    }

    fn entity_id(&self, kind: PacketKind, wire: Wire, id: i32) -> Result<FieldValue> {
        match wire {
            Wire::VarInt => Ok(FieldValue::VarInt(id)),
            Wire::Int => Ok(FieldValue::Int(id)),
            _ => Err(self.unexpected(kind, Field::EntityId)),
        }
    }

    fn coordinate(&self, kind: PacketKind, wire: Wire, value: f64) -> Result<FieldValue> {
        match wire {
            Wire::FixedInt => Ok(FieldValue::Int(to_int(value))),
            Wire::Double => Ok(FieldValue::Double(value)),
            _ => Err(EngineError::unsupported(
                self.version(),
                format!("{:?} coordinate as {:?}", kind, wire),
            )),
        }
    }

    fn unexpected(&self, kind: PacketKind, field: Field) -> EngineError {
        EngineError::unsupported(self.version(), format!("{:?}.{:?}", kind, field))
    }
}
