//! Core value types shared across all modules.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::ProtocolVersion;

// ---------------------------------------------------------------------------
// Spatial pose
// ---------------------------------------------------------------------------

/// Position + orientation of an actor inside one world.
///
/// `yaw` is conceptually `[0, 360)` and `pitch` `[-90, 90]`, but nothing
/// clamps them here: the codec decides how out-of-range angles are narrowed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f32,
    pub pitch: f32,
}

impl Pose {
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64, yaw: f32, pitch: f32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
            yaw,
            pitch,
        }
    }

    /// Same world and orientation, translated by `(dx, dy, dz)`.
    pub fn offset(&self, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
            ..self.clone()
        }
    }

    /// The block this pose stands in.
    pub fn block(&self) -> BlockPos {
        BlockPos::new(
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.z.floor() as i32,
        )
    }
}

impl std::fmt::Display for Pose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({:.2}, {:.2}, {:.2}; yaw {:.1}, pitch {:.1})",
            self.world, self.x, self.y, self.z, self.yaw, self.pitch
        )
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl std::fmt::Display for BlockPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Identity + cosmetics
// ---------------------------------------------------------------------------

/// Signed cosmetic blob as handed out by the session service.
///
/// Immutable: a new skin replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkinRef {
    pub signature: String,
    pub value: String,
}

impl SkinRef {
    pub fn new(signature: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            value: value.into(),
        }
    }
}

/// One signed profile property (only `textures` is ever produced here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileProperty {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Stable identity record of an actor: random id + display name, plus the
/// signed properties the client needs to render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<ProfileProperty>,
}

impl Profile {
    pub const TEXTURES: &'static str = "textures";

    pub fn random(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Replace (never merge) the `textures` property.
    pub fn set_textures(&mut self, skin: &SkinRef) {
        self.properties.retain(|p| p.name != Self::TEXTURES);
        self.properties.push(ProfileProperty {
            name: Self::TEXTURES.into(),
            value: skin.value.clone(),
            signature: Some(skin.signature.clone()),
        });
    }

    pub fn textures(&self) -> Option<&ProfileProperty> {
        self.properties.iter().find(|p| p.name == Self::TEXTURES)
    }
}

// ---------------------------------------------------------------------------
// Fixed catalogs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentSlot {
    MainHand,
    OffHand,
    Boots,
    Leggings,
    Chestplate,
    Helmet,
}

impl EquipmentSlot {
    pub const ALL: [EquipmentSlot; 6] = [
        EquipmentSlot::MainHand,
        EquipmentSlot::OffHand,
        EquipmentSlot::Boots,
        EquipmentSlot::Leggings,
        EquipmentSlot::Chestplate,
        EquipmentSlot::Helmet,
    ];

    /// Name used by the host's item-slot enum.
    pub fn name(self) -> &'static str {
        match self {
            EquipmentSlot::MainHand => "mainhand",
            EquipmentSlot::OffHand => "offhand",
            EquipmentSlot::Boots => "feet",
            EquipmentSlot::Leggings => "legs",
            EquipmentSlot::Chestplate => "chest",
            EquipmentSlot::Helmet => "head",
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Animation {
    SwingMainArm,
    TakeDamage,
    LeaveBed,
    SwingOffhand,
    CriticalEffect,
    MagicalCriticalEffect,
}

impl Animation {
    /// Wire index shared by every version that knows the animation.
    pub fn index(self) -> u8 {
        match self {
            Animation::SwingMainArm => 0,
            Animation::TakeDamage => 1,
            Animation::LeaveBed => 2,
            Animation::SwingOffhand => 3,
            Animation::CriticalEffect => 4,
            Animation::MagicalCriticalEffect => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Hurt animation + hurt sound.
    TakeDamage,
    /// Death animation + death sound.
    Die,
    UseTotemOfUndying,
    Drowning,
    Burn,
    PrickedByBush,
}

impl Status {
    pub fn index(self) -> i8 {
        match self {
            Status::TakeDamage => 2,
            Status::Die => 3,
            Status::UseTotemOfUndying => 35,
            Status::Drowning => 36,
            Status::Burn => 37,
            Status::PrickedByBush => 44,
        }
    }
}

/// Item payload for equipment packets. NBT is never sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub id: i32,
    pub count: u8,
    #[serde(default)]
    pub damage: i16,
}

impl ItemStack {
    pub fn new(id: i32, count: u8) -> Self {
        Self {
            id,
            count,
            damage: 0,
        }
    }

    pub fn empty() -> Self {
        Self {
            id: -1,
            count: 0,
            damage: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id < 0 || self.count == 0
    }
}

// ---------------------------------------------------------------------------
// Entity metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaValue {
    Byte(i8),
    VarInt(i32),
    Float(f32),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub index: u8,
    pub value: MetaValue,
}

/// Ordered metadata snapshot of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub entries: Vec<MetaEntry>,
}

impl Metadata {
    /// Index of the entity flag byte (on fire, sneaking, sprinting, …).
    pub const FLAGS_INDEX: u8 = 0;
    pub const SNEAKING: i8 = 0x02;

    /// Player metadata as a freshly spawned player carries it.
    pub fn player() -> Self {
        Self {
            entries: vec![MetaEntry {
                index: Self::FLAGS_INDEX,
                value: MetaValue::Byte(0),
            }],
        }
    }

    pub fn get(&self, index: u8) -> Option<&MetaValue> {
        self.entries
            .iter()
            .find(|e| e.index == index)
            .map(|e| &e.value)
    }

    pub fn set(&mut self, index: u8, value: MetaValue) {
        match self.entries.iter_mut().find(|e| e.index == index) {
            Some(entry) => entry.value = value,
            None => self.entries.push(MetaEntry { index, value }),
        }
    }

    pub fn flags(&self) -> i8 {
        match self.get(Self::FLAGS_INDEX) {
            Some(MetaValue::Byte(b)) => *b,
            _ => 0,
        }
    }

    /// Set or clear `bit` in the flag byte, leaving the other bits alone.
    pub fn set_flag(&mut self, bit: i8, on: bool) {
        let flags = if on {
            self.flags() | bit
        } else {
            self.flags() & !bit
        };
        self.set(Self::FLAGS_INDEX, MetaValue::Byte(flags));
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Which registered actors receive an accepted interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanOut {
    /// Every registered actor, whatever the packet targeted.
    Broadcast,
    /// Only the actor the packet targeted, if it belongs to this observer.
    Targeted,
}

impl std::str::FromStr for FanOut {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "broadcast" => Ok(FanOut::Broadcast),
            "targeted" => Ok(FanOut::Targeted),
            other => Err(format!("unknown fan-out '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkinConfig {
    /// name → profile id lookup.
    pub profile_api: String,
    /// profile id → signed textures lookup.
    pub session_api: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SkinConfig {
    fn default() -> Self {
        Self {
            profile_api: "https://api.mojang.com/users/profiles/minecraft".into(),
            session_api: "https://sessionserver.mojang.com/session/minecraft/profile".into(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Wire protocol spoken to every observer.
    pub protocol: ProtocolVersion,
    /// First entity id handed out; kept far above host-assigned ids.
    pub entity_id_base: i32,
    /// Ticks between the listing add and the listing removal of an
    /// unlisted actor.
    pub listing_removal_delay_ticks: u32,
    /// Scheduler tick rate in Hz.
    pub tick_rate_hz: f32,
    /// Minimum gap between two accepted attacks, per observer.
    pub attack_window_ms: u64,
    /// Minimum gap between two accepted interactions, per observer.
    pub interact_window_ms: u64,
    pub fan_out: FanOut,
    /// Capacity of the interaction publication queue.
    pub dispatch_capacity: usize,
    pub skin: SkinConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolVersion::V1_9,
            entity_id_base: 0x2000_0000,
            listing_removal_delay_ticks: 2,
            tick_rate_hz: 20.0,
            attack_window_ms: 500,
            interact_window_ms: 300,
            fan_out: FanOut::Broadcast,
            dispatch_capacity: 256,
            skin: SkinConfig::default(),
        }
    }
}
