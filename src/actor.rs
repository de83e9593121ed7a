//! Actor state machine – one synthetic player shown to one observer.
//!
//! ```text
//!   Unspawned ──spawn──▶ Active ──destroy──▶ Destroyed
//!                          │ ▲
//!                          └─┘ status, animation, rotate, teleport,
//!                              equip, sleep, sneak, focus, skin
//! ```
//!
//! Every operation runs the same steps: check state, compute the new pose or
//! metadata, encode every packet against it, commit, send, publish exactly
//! one event. Encoding happens before the commit, so an operation the
//! protocol cannot express leaves the actor untouched.
//!
//! The actor takes no locks. Callers keep each actor on a single owner task.

use log::{debug, warn};
use std::sync::Arc;

use crate::codec::look_angles;
use crate::encoder::{ActorView, Operation};
use crate::engine::Engine;
use crate::error::{EngineError, Result, SkinError};
use crate::events::{ActorEvent, ActorEventKind, ActorRef};
use crate::protocol::{ListingAction, Packet};
use crate::transport::Observer;
use crate::types::{
    Animation, EquipmentSlot, ItemStack, Metadata, Pose, Profile, SkinRef, Status,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorState {
    Unspawned,
    Active,
    Destroyed,
}

impl ActorState {
    pub fn name(self) -> &'static str {
        match self {
            ActorState::Unspawned => "unspawned",
            ActorState::Active => "active",
            ActorState::Destroyed => "destroyed",
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ActorBuilder {
    name: String,
    pose: Pose,
    listed: bool,
    skin: Option<SkinRef>,
    metadata: Metadata,
}

impl ActorBuilder {
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            name: name.into(),
            pose,
            listed: true,
            skin: None,
            metadata: Metadata::player(),
        }
    }

    /// Keep the actor in the observer's player list after spawn.
    pub fn listed(mut self, listed: bool) -> Self {
        self.listed = listed;
        self
    }

    /// Skin already resolved by the caller, sent with the spawn.
    pub fn skin(mut self, skin: SkinRef) -> Self {
        self.skin = Some(skin);
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build(self, engine: Arc<Engine>, observer: Arc<dyn Observer>) -> Actor {
        let mut profile = Profile::random(self.name);
        if let Some(skin) = &self.skin {
            profile.set_textures(skin);
        }
        Actor {
            entity_id: engine.allocate_entity_id(),
            engine,
            observer,
            profile,
            pose: self.pose,
            metadata: self.metadata,
            skin: self.skin,
            listed: self.listed,
            sleeping: false,
            state: ActorState::Unspawned,
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub struct Actor {
    engine: Arc<Engine>,
    observer: Arc<dyn Observer>,
    entity_id: i32,
    profile: Profile,
    pose: Pose,
    metadata: Metadata,
    skin: Option<SkinRef>,
    listed: bool,
    sleeping: bool,
    state: ActorState,
}

impl Actor {
    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn entity_id(&self) -> i32 {
        self.entity_id
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn skin(&self) -> Option<&SkinRef> {
        self.skin.as_ref()
    }

    pub fn is_listed(&self) -> bool {
        self.listed
    }

    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    pub fn is_sneaking(&self) -> bool {
        self.metadata.flags() & Metadata::SNEAKING != 0
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    pub fn actor_ref(&self) -> ActorRef {
        ActorRef {
            entity_id: self.entity_id,
            profile_id: self.profile.id,
            name: self.profile.name.clone(),
            observer: self.observer.id(),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Add to the player list, spawn, register. Unlisted actors are dropped
    /// from the list again after `listing_removal_delay_ticks`.
    pub fn spawn(&mut self) -> Result<()> {
        self.require(ActorState::Unspawned, "spawn")?;
        let mut packets = self.encode(Operation::ModifyListing(ListingAction::Add), None, None)?;
        packets.extend(self.encode(Operation::Spawn, None, None)?);

        self.state = ActorState::Active;
        self.engine.registry().register(self.actor_ref());
        self.send_all(&packets)?;

        if !self.listed {
            self.schedule_listing_removal()?;
        }

        debug!(
            "spawned npc '{}' ({}) for {} at {}",
            self.profile.name,
            self.entity_id,
            self.observer.name(),
            self.pose
        );
        self.publish(ActorEventKind::Spawned {
            pose: self.pose.clone(),
        });
        Ok(())
    }

    /// Remove from the player list, despawn, unregister.
    pub fn destroy(&mut self) -> Result<()> {
        self.require(ActorState::Active, "destroy")?;
        let mut packets =
            self.encode(Operation::ModifyListing(ListingAction::Remove), None, None)?;
        packets.extend(self.encode(Operation::Destroy, None, None)?);

        self.state = ActorState::Destroyed;
        let actor = self.actor_ref();
        self.engine.registry().unregister(&actor);
        self.send_all(&packets)?;

        debug!("destroyed npc '{}' ({})", self.profile.name, self.entity_id);
        self.publish(ActorEventKind::Destroyed);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Cosmetics
    // -----------------------------------------------------------------------

    /// Look up the skin currently worn by `owner` off the owner task and
    /// attach it. Lookup failures are logged and leave the skin unchanged;
    /// the returned flag says whether the skin changed.
    pub async fn set_skin(&mut self, owner: &str) -> Result<bool> {
        self.require(ActorState::Active, "set_skin")?;
        let resolved = self
            .engine
            .skins()
            .clone()
            .resolve_detached(owner.to_string())
            .await;
        self.apply_skin(resolved)
    }

    /// Attach an already resolved (or failed) lookup result.
    pub fn apply_skin(
        &mut self,
        resolved: std::result::Result<SkinRef, SkinError>,
    ) -> Result<bool> {
        self.require(ActorState::Active, "set_skin")?;
        let skin = match resolved {
            Ok(skin) => skin,
            Err(e) => {
                warn!(
                    "skin lookup for npc '{}' ({}) failed, keeping current skin: {}",
                    self.profile.name, self.entity_id, e
                );
                return Ok(false);
            }
        };
        self.profile.set_textures(&skin);
        self.skin = Some(skin.clone());
        self.publish(ActorEventKind::SkinUpdated { skin });
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    pub fn play_status(&mut self, status: Status) -> Result<()> {
        self.require(ActorState::Active, "play_status")?;
        let packets = self.encode(Operation::PlayStatus(status), None, None)?;
        self.send_all(&packets)?;
        self.publish(ActorEventKind::StatusPlayed { status });
        Ok(())
    }

    pub fn play_animation(&mut self, animation: Animation) -> Result<()> {
        self.require(ActorState::Active, "play_animation")?;
        let packets = self.encode(Operation::PlayAnimation(animation), None, None)?;
        self.send_all(&packets)?;
        self.publish(ActorEventKind::AnimationPlayed { animation });
        Ok(())
    }

    pub fn equip(&mut self, slot: EquipmentSlot, item: ItemStack) -> Result<()> {
        self.require(ActorState::Active, "equip")?;
        let packets = self.encode(Operation::Equip { slot, item }, None, None)?;
        self.send_all(&packets)?;
        self.publish(ActorEventKind::Equipped { slot, item });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    pub fn rotate_head(&mut self, yaw: f32, pitch: f32) -> Result<()> {
        self.require(ActorState::Active, "rotate_head")?;
        let pose = Pose {
            yaw,
            pitch,
            ..self.pose.clone()
        };
        let packets = self.encode(Operation::RotateHead { yaw, pitch }, Some(&pose), None)?;
        self.pose = pose;
        self.send_all(&packets)?;
        self.publish(ActorEventKind::HeadRotated { yaw, pitch });
        Ok(())
    }

    /// Move to `destination` (position and facing).
    pub fn teleport(&mut self, destination: Pose, on_ground: bool) -> Result<()> {
        self.require(ActorState::Active, "teleport")?;
        let packets = self.encode(Operation::Teleport { on_ground }, Some(&destination), None)?;
        self.pose = destination;
        self.send_all(&packets)?;
        self.publish(ActorEventKind::Teleported {
            pose: self.pose.clone(),
            on_ground,
        });
        Ok(())
    }

    /// Turn to face the bound observer's current position.
    pub fn focus_observer(&mut self) -> Result<()> {
        self.require(ActorState::Active, "focus_observer")?;
        let target = self.observer.pose();
        let (yaw, pitch) = look_angles(
            target.x - self.pose.x,
            target.y - self.pose.y,
            target.z - self.pose.z,
            self.pose.yaw,
        );
        let pose = Pose {
            yaw,
            pitch,
            ..self.pose.clone()
        };
        let packets = self.encode(Operation::Focus, Some(&pose), None)?;
        self.pose = pose;
        self.send_all(&packets)?;
        self.publish(ActorEventKind::Focused {
            observer: self.observer.id(),
            yaw,
            pitch,
        });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Posture
    // -----------------------------------------------------------------------

    /// Lie down in a client-side bed next to the actor, or get up.
    pub fn sleep(&mut self, state: bool) -> Result<()> {
        self.require(ActorState::Active, "sleep")?;
        let packets = self.encode(Operation::Sleep { state }, None, None)?;
        self.sleeping = state;
        self.send_all(&packets)?;
        self.publish(ActorEventKind::Slept { state });
        Ok(())
    }

    /// Toggle the sneaking flag bit, keeping every other flag. The flag
    /// byte is read from this actor's own metadata, never from the
    /// observer's.
    pub fn sneak(&mut self, state: bool) -> Result<()> {
        self.require(ActorState::Active, "sneak")?;
        let mut metadata = self.metadata.clone();
        metadata.set_flag(Metadata::SNEAKING, state);
        let packets = self.encode(Operation::Sneak, None, Some(&metadata))?;
        self.metadata = metadata;
        self.send_all(&packets)?;
        self.publish(ActorEventKind::Sneaked { state });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require(&self, expected: ActorState, operation: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(EngineError::InvalidState {
                operation,
                state: self.state.name(),
            })
        }
    }

    /// Encode `op` against the current state, with `pose` / `metadata`
    /// standing in for the not yet committed values.
    fn encode(
        &self,
        op: Operation,
        pose: Option<&Pose>,
        metadata: Option<&Metadata>,
    ) -> Result<Vec<Packet>> {
        let view = ActorView {
            entity_id: self.entity_id,
            profile: &self.profile,
            pose: pose.unwrap_or(&self.pose),
            metadata: metadata.unwrap_or(&self.metadata),
        };
        self.engine.encoder().encode(op, view)
    }

    fn send_all(&self, packets: &[Packet]) -> Result<()> {
        for packet in packets {
            self.observer.send(packet)?;
        }
        Ok(())
    }

    fn schedule_listing_removal(&self) -> Result<()> {
        // Encoded up front: an unsupported layout fails the spawn itself.
        let removal = self
            .engine
            .encoder()
            .modify_listing(&self.profile, ListingAction::Remove)?;
        let observer = self.observer.clone();
        let entity_id = self.entity_id;
        self.engine.scheduler().run_later(
            self.engine.config().listing_removal_delay_ticks,
            move || {
                if let Err(e) = observer.send(&removal) {
                    warn!("could not unlist npc {}: {}", entity_id, e);
                }
            },
        );
        Ok(())
    }

    fn publish(&self, kind: ActorEventKind) {
        self.engine.bus().publish_actor(&ActorEvent {
            actor: self.actor_ref(),
            kind,
        });
    }
}
