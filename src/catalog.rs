//! Wire field catalog – one static table per supported protocol version.
//!
//! The catalog, not the caller, owns every difference between versions:
//!
//! | Concern              | 1.8            | 1.9.4          | 1.14.4          |
//! |----------------------|----------------|----------------|-----------------|
//! | spawn/teleport coords| fixed-point Int| Double         | Double          |
//! | equipment slot field | Short (0..=4)  | VarInt (0..=5) | VarInt (0..=5)  |
//! | off-hand             | –              | ✓              | ✓               |
//! | entity metadata      | legacy         | typed          | typed           |
//! | item slot            | legacy         | legacy         | modern          |
//! | use-bed packet       | ✓              | ✓              | –               |
//! | block position       | x·y·z          | x·y·z          | x·z·y           |
//!
//! Anything a version cannot express is reported as
//! [`EngineError::UnsupportedVersion`]; nothing falls back to another
//! version's layout.

use crate::codec::{MetadataFormat, PositionPacking, SlotFormat};
use crate::error::{EngineError, Result};
use crate::protocol::{Field, Layout, PacketKind, ProtocolVersion, Wire};
use crate::types::{Animation, EquipmentSlot, Status};

/// Serverbound use-entity action ids (identical in every version).
pub mod use_entity {
    pub const INTERACT: i32 = 0;
    pub const ATTACK: i32 = 1;
    pub const INTERACT_AT: i32 = 2;
}

/// Per-version table of layouts and wire indices.
#[derive(Debug)]
pub struct Catalog {
    pub version: ProtocolVersion,
    layouts: &'static [Layout],
    equipment: &'static [(EquipmentSlot, i32)],
    /// `(block id << 4) | meta` of a bed foot, when the version can place one.
    bed_block_state: Option<i32>,
}

impl Catalog {
    pub fn for_version(version: ProtocolVersion) -> &'static Catalog {
        match version {
            ProtocolVersion::V1_8 => &V1_8,
            ProtocolVersion::V1_9 => &V1_9,
            ProtocolVersion::V1_14 => &V1_14,
        }
    }

    pub fn layout(&self, kind: PacketKind) -> Result<&'static Layout> {
        let layouts: &'static [Layout] = self.layouts;
        layouts
            .iter()
            .find(|l| l.kind == kind)
            .ok_or_else(|| EngineError::missing_layout(self.version, kind))
    }

    pub fn supports(&self, kind: PacketKind) -> bool {
        self.layouts.iter().any(|l| l.kind == kind)
    }

    /// Serverbound packet id of use-entity.
    pub fn use_entity_id(&self) -> Result<i32> {
        self.layout(PacketKind::UseEntity).map(|l| l.id)
    }

    pub fn equipment_index(&self, slot: EquipmentSlot) -> Result<i32> {
        self.equipment
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, idx)| *idx)
            .ok_or_else(|| {
                EngineError::unsupported(self.version, format!("equipment slot {}", slot.name()))
            })
    }

    pub fn animation_index(&self, animation: Animation) -> Result<u8> {
        // Index 3 meant "eat food" before the off-hand existed.
        if animation == Animation::SwingOffhand && self.version.minor() < 9 {
            return Err(EngineError::unsupported(
                self.version,
                format!("animation {:?}", animation),
            ));
        }
        Ok(animation.index())
    }

    pub fn status_index(&self, status: Status) -> Result<i8> {
        let introduced = match status {
            Status::TakeDamage | Status::Die => 8,
            Status::UseTotemOfUndying => 11,
            Status::Drowning => 13,
            Status::Burn | Status::PrickedByBush => 14,
        };
        if self.version.minor() < introduced {
            return Err(EngineError::unsupported(
                self.version,
                format!("status {:?}", status),
            ));
        }
        Ok(status.index())
    }

    pub fn bed_block_state(&self) -> Result<i32> {
        self.bed_block_state
            .ok_or_else(|| EngineError::unsupported(self.version, "bed block override"))
    }
}

// ---------------------------------------------------------------------------
// Equipment indices
// ---------------------------------------------------------------------------

const LEGACY_EQUIPMENT: &[(EquipmentSlot, i32)] = &[
    (EquipmentSlot::MainHand, 0),
    (EquipmentSlot::Boots, 1),
    (EquipmentSlot::Leggings, 2),
    (EquipmentSlot::Chestplate, 3),
    (EquipmentSlot::Helmet, 4),
];

const DUAL_HAND_EQUIPMENT: &[(EquipmentSlot, i32)] = &[
    (EquipmentSlot::MainHand, 0),
    (EquipmentSlot::OffHand, 1),
    (EquipmentSlot::Boots, 2),
    (EquipmentSlot::Leggings, 3),
    (EquipmentSlot::Chestplate, 4),
    (EquipmentSlot::Helmet, 5),
];

/// Bed block id 26, metadata 0 (foot, facing south).
const LEGACY_BED: i32 = 26 << 4;

// ---------------------------------------------------------------------------
// Shared field lists
// ---------------------------------------------------------------------------

const DESTROY: &[(Field, Wire)] = &[(Field::EntityIds, Wire::VarIntArray)];

const STATUS: &[(Field, Wire)] = &[(Field::EntityId, Wire::Int), (Field::Status, Wire::Byte)];

const ANIMATION: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::Animation, Wire::UByte),
];

const LOOK: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::Yaw, Wire::Angle),
    (Field::Pitch, Wire::Angle),
    (Field::OnGround, Wire::Bool),
];

const HEAD: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::HeadYaw, Wire::Angle),
];

const LISTING: &[(Field, Wire)] = &[
    (Field::ListingAction, Wire::VarInt),
    (Field::ListingEntries, Wire::Listing),
];

const USE_ENTITY: &[(Field, Wire)] = &[
    (Field::Target, Wire::VarInt),
    (Field::Action, Wire::VarInt),
];

const LEGACY_USE_BED: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::Location, Wire::Position(PositionPacking::Legacy)),
];

const LEGACY_BLOCK_CHANGE: &[(Field, Wire)] = &[
    (Field::Location, Wire::Position(PositionPacking::Legacy)),
    (Field::BlockState, Wire::VarInt),
];

// ---------------------------------------------------------------------------
// 1.8 (protocol 47)
// ---------------------------------------------------------------------------

static V1_8: Catalog = Catalog {
    version: ProtocolVersion::V1_8,
    equipment: LEGACY_EQUIPMENT,
    bed_block_state: Some(LEGACY_BED),
    layouts: &[
        Layout {
            kind: PacketKind::SpawnPlayer,
            id: 0x0C,
            fields: &[
                (Field::EntityId, Wire::VarInt),
                (Field::ProfileId, Wire::Uuid),
                (Field::X, Wire::FixedInt),
                (Field::Y, Wire::FixedInt),
                (Field::Z, Wire::FixedInt),
                (Field::Yaw, Wire::Angle),
                (Field::Pitch, Wire::Angle),
                (Field::HeldItem, Wire::Short),
                (Field::Metadata, Wire::Metadata(MetadataFormat::Legacy)),
            ],
        },
        Layout {
            kind: PacketKind::DestroyEntities,
            id: 0x13,
            fields: DESTROY,
        },
        Layout {
            kind: PacketKind::EntityStatus,
            id: 0x1A,
            fields: STATUS,
        },
        Layout {
            kind: PacketKind::Animation,
            id: 0x0B,
            fields: ANIMATION,
        },
        Layout {
            kind: PacketKind::EntityLook,
            id: 0x16,
            fields: LOOK,
        },
        Layout {
            kind: PacketKind::HeadRotation,
            id: 0x19,
            fields: HEAD,
        },
        Layout {
            kind: PacketKind::Teleport,
            id: 0x18,
            fields: &[
                (Field::EntityId, Wire::VarInt),
                (Field::X, Wire::FixedInt),
                (Field::Y, Wire::FixedInt),
                (Field::Z, Wire::FixedInt),
                (Field::Yaw, Wire::Angle),
                (Field::Pitch, Wire::Angle),
                (Field::OnGround, Wire::Bool),
            ],
        },
        Layout {
            kind: PacketKind::Equipment,
            id: 0x04,
            fields: &[
                (Field::EntityId, Wire::VarInt),
                (Field::Slot, Wire::Short),
                (Field::Item, Wire::Slot(SlotFormat::Legacy)),
            ],
        },
        Layout {
            kind: PacketKind::UseBed,
            id: 0x0A,
            fields: LEGACY_USE_BED,
        },
        Layout {
            kind: PacketKind::BlockChange,
            id: 0x23,
            fields: LEGACY_BLOCK_CHANGE,
        },
        Layout {
            kind: PacketKind::EntityMetadata,
            id: 0x1C,
            fields: &[
                (Field::EntityId, Wire::VarInt),
                (Field::Metadata, Wire::Metadata(MetadataFormat::Legacy)),
            ],
        },
        Layout {
            kind: PacketKind::PlayerListItem,
            id: 0x38,
            fields: LISTING,
        },
        Layout {
            kind: PacketKind::UseEntity,
            id: 0x02,
            fields: USE_ENTITY,
        },
    ],
};

// ---------------------------------------------------------------------------
// 1.9.4 (protocol 110)
// ---------------------------------------------------------------------------

const TYPED9_SPAWN: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::ProfileId, Wire::Uuid),
    (Field::X, Wire::Double),
    (Field::Y, Wire::Double),
    (Field::Z, Wire::Double),
    (Field::Yaw, Wire::Angle),
    (Field::Pitch, Wire::Angle),
    (Field::Metadata, Wire::Metadata(MetadataFormat::Typed9)),
];

const TYPED13_SPAWN: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::ProfileId, Wire::Uuid),
    (Field::X, Wire::Double),
    (Field::Y, Wire::Double),
    (Field::Z, Wire::Double),
    (Field::Yaw, Wire::Angle),
    (Field::Pitch, Wire::Angle),
    (Field::Metadata, Wire::Metadata(MetadataFormat::Typed13)),
];

const DOUBLE_TELEPORT: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::X, Wire::Double),
    (Field::Y, Wire::Double),
    (Field::Z, Wire::Double),
    (Field::Yaw, Wire::Angle),
    (Field::Pitch, Wire::Angle),
    (Field::OnGround, Wire::Bool),
];

const TYPED9_METADATA: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::Metadata, Wire::Metadata(MetadataFormat::Typed9)),
];

const TYPED13_METADATA: &[(Field, Wire)] = &[
    (Field::EntityId, Wire::VarInt),
    (Field::Metadata, Wire::Metadata(MetadataFormat::Typed13)),
];

static V1_9: Catalog = Catalog {
    version: ProtocolVersion::V1_9,
    equipment: DUAL_HAND_EQUIPMENT,
    bed_block_state: Some(LEGACY_BED),
    layouts: &[
        Layout {
            kind: PacketKind::SpawnPlayer,
            id: 0x05,
            fields: TYPED9_SPAWN,
        },
        Layout {
            kind: PacketKind::Animation,
            id: 0x06,
            fields: ANIMATION,
        },
        Layout {
            kind: PacketKind::BlockChange,
            id: 0x0B,
            fields: LEGACY_BLOCK_CHANGE,
        },
        Layout {
            kind: PacketKind::EntityStatus,
            id: 0x1B,
            fields: STATUS,
        },
        Layout {
            kind: PacketKind::EntityLook,
            id: 0x27,
            fields: LOOK,
        },
        Layout {
            kind: PacketKind::PlayerListItem,
            id: 0x2D,
            fields: LISTING,
        },
        Layout {
            kind: PacketKind::UseBed,
            id: 0x2F,
            fields: LEGACY_USE_BED,
        },
        Layout {
            kind: PacketKind::DestroyEntities,
            id: 0x30,
            fields: DESTROY,
        },
        Layout {
            kind: PacketKind::HeadRotation,
            id: 0x34,
            fields: HEAD,
        },
        Layout {
            kind: PacketKind::EntityMetadata,
            id: 0x39,
            fields: TYPED9_METADATA,
        },
        Layout {
            kind: PacketKind::Equipment,
            id: 0x3C,
            fields: &[
                (Field::EntityId, Wire::VarInt),
                (Field::Slot, Wire::VarInt),
                (Field::Item, Wire::Slot(SlotFormat::Legacy)),
            ],
        },
        Layout {
            kind: PacketKind::Teleport,
            id: 0x49,
            fields: DOUBLE_TELEPORT,
        },
        Layout {
            kind: PacketKind::UseEntity,
            id: 0x0A,
            fields: USE_ENTITY,
        },
    ],
};

// ---------------------------------------------------------------------------
// 1.14.4 (protocol 498)
// ---------------------------------------------------------------------------

static V1_14: Catalog = Catalog {
    version: ProtocolVersion::V1_14,
    equipment: DUAL_HAND_EQUIPMENT,
    // Beds are block states now and sleeping is a metadata pose.
    bed_block_state: None,
    layouts: &[
        Layout {
            kind: PacketKind::SpawnPlayer,
            id: 0x05,
            fields: TYPED13_SPAWN,
        },
        Layout {
            kind: PacketKind::Animation,
            id: 0x06,
            fields: ANIMATION,
        },
        Layout {
            kind: PacketKind::BlockChange,
            id: 0x0B,
            fields: &[
                (Field::Location, Wire::Position(PositionPacking::Modern)),
                (Field::BlockState, Wire::VarInt),
            ],
        },
        Layout {
            kind: PacketKind::EntityStatus,
            id: 0x1B,
            fields: STATUS,
        },
        Layout {
            kind: PacketKind::EntityLook,
            id: 0x2A,
            fields: LOOK,
        },
        Layout {
            kind: PacketKind::PlayerListItem,
            id: 0x33,
            fields: LISTING,
        },
        Layout {
            kind: PacketKind::DestroyEntities,
            id: 0x37,
            fields: DESTROY,
        },
        Layout {
            kind: PacketKind::HeadRotation,
            id: 0x3B,
            fields: HEAD,
        },
        Layout {
            kind: PacketKind::EntityMetadata,
            id: 0x43,
            fields: TYPED13_METADATA,
        },
        Layout {
            kind: PacketKind::Equipment,
            id: 0x46,
            fields: &[
                (Field::EntityId, Wire::VarInt),
                (Field::Slot, Wire::VarInt),
                (Field::Item, Wire::Slot(SlotFormat::Modern)),
            ],
        },
        Layout {
            kind: PacketKind::Teleport,
            id: 0x56,
            fields: DOUBLE_TELEPORT,
        },
        Layout {
            kind: PacketKind::UseEntity,
            id: 0x0E,
            fields: USE_ENTITY,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_version_has_unique_clientbound_ids() {
        for version in ProtocolVersion::ALL {
            let catalog = Catalog::for_version(version);
            let mut ids: Vec<i32> = catalog
                .layouts
                .iter()
                .filter(|l| l.kind != PacketKind::UseEntity)
                .map(|l| l.id)
                .collect();
            let before = ids.len();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), before, "duplicate packet id in {}", version);
        }
    }

    #[test]
    fn use_bed_is_gone_in_1_14() {
        assert!(Catalog::for_version(ProtocolVersion::V1_9).supports(PacketKind::UseBed));
        let err = Catalog::for_version(ProtocolVersion::V1_14)
            .layout(PacketKind::UseBed)
            .unwrap_err();
        assert!(err.is_unsupported());
    }
}
