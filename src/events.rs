//! Event bus – typed notifications about actors.
//!
//! ## Families
//!
//! | Family        | Published by       | Cancellable | Payload             |
//! |---------------|--------------------|-------------|---------------------|
//! | actor         | `Actor` operations | no          | [`ActorEvent`]      |
//! | interaction   | interceptor worker | yes         | [`InteractionEvent`]|
//!
//! Publication is synchronous on the publisher's thread: when
//! [`EventBus::publish_interaction`] returns, every listener has run and the
//! cancel flag is final.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::types::{Animation, EquipmentSlot, ItemStack, Pose, SkinRef, Status};

// ---------------------------------------------------------------------------
// Actor identity carried by events
// ---------------------------------------------------------------------------

/// Cheap, immutable handle to a live actor.
///
/// This is what the registry stores and what listeners receive; the mutable
/// actor itself stays with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub entity_id: i32,
    pub profile_id: Uuid,
    pub name: String,
    /// Observer the actor is bound to.
    pub observer: Uuid,
}

// ---------------------------------------------------------------------------
// Actor events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ActorEventKind {
    Spawned { pose: Pose },
    Destroyed,
    SkinUpdated { skin: SkinRef },
    AnimationPlayed { animation: Animation },
    StatusPlayed { status: Status },
    HeadRotated { yaw: f32, pitch: f32 },
    Teleported { pose: Pose, on_ground: bool },
    Focused { observer: Uuid, yaw: f32, pitch: f32 },
    Slept { state: bool },
    Sneaked { state: bool },
    Equipped { slot: EquipmentSlot, item: ItemStack },
}

impl ActorEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActorEventKind::Spawned { .. } => "spawned",
            ActorEventKind::Destroyed => "destroyed",
            ActorEventKind::SkinUpdated { .. } => "skin_updated",
            ActorEventKind::AnimationPlayed { .. } => "animation_played",
            ActorEventKind::StatusPlayed { .. } => "status_played",
            ActorEventKind::HeadRotated { .. } => "head_rotated",
            ActorEventKind::Teleported { .. } => "teleported",
            ActorEventKind::Focused { .. } => "focused",
            ActorEventKind::Slept { .. } => "slept",
            ActorEventKind::Sneaked { .. } => "sneaked",
            ActorEventKind::Equipped { .. } => "equipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorEvent {
    pub actor: ActorRef,
    #[serde(flatten)]
    pub kind: ActorEventKind,
}

// ---------------------------------------------------------------------------
// Interaction events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    Attack,
    Interact,
}

/// An observer attacked or interacted with an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub kind: Interaction,
    pub actor: ActorRef,
    pub observer: Uuid,
    /// Entity id the inbound packet named.
    pub target: i32,
    cancelled: bool,
}

impl InteractionEvent {
    pub fn new(kind: Interaction, actor: ActorRef, observer: Uuid, target: i32) -> Self {
        Self {
            kind,
            actor,
            observer,
            target,
            cancelled: false,
        }
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn set_cancelled(&mut self, cancelled: bool) {
        self.cancelled = cancelled;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether the packet named this event's actor.
    pub fn is_targeted(&self) -> bool {
        self.target == self.actor.entity_id
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

pub type ActorListener = Arc<dyn Fn(&ActorEvent) + Send + Sync>;
pub type InteractionListener = Arc<dyn Fn(&mut InteractionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct EventBus {
    actor_listeners: RwLock<Vec<(ListenerId, ActorListener)>>,
    interaction_listeners: RwLock<Vec<(ListenerId, InteractionListener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on_actor<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ActorEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.actor_listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub fn on_interaction<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&mut InteractionEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.interaction_listeners
            .write()
            .push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut removed = false;
        self.actor_listeners.write().retain(|(lid, _)| {
            let keep = *lid != id;
            removed |= !keep;
            keep
        });
        self.interaction_listeners.write().retain(|(lid, _)| {
            let keep = *lid != id;
            removed |= !keep;
            keep
        });
        removed
    }

    pub fn listener_count(&self) -> usize {
        self.actor_listeners.read().len() + self.interaction_listeners.read().len()
    }

    pub fn publish_actor(&self, event: &ActorEvent) {
        // Snapshot so listeners may (un)subscribe while being called.
        let listeners: Vec<ActorListener> = self
            .actor_listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        log::trace!(
            "actor event {} for entity {} ({} listeners)",
            event.kind.name(),
            event.actor.entity_id,
            listeners.len()
        );
        for listener in listeners {
            listener(event);
        }
    }

    /// Run every interaction listener in subscription order. Returns `true`
    /// when the event survived (nobody left it cancelled).
    pub fn publish_interaction(&self, event: &mut InteractionEvent) -> bool {
        let listeners: Vec<InteractionListener> = self
            .interaction_listeners
            .read()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(event);
        }
        !event.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn actor_ref(entity_id: i32) -> ActorRef {
        ActorRef {
            entity_id,
            profile_id: Uuid::new_v4(),
            name: "npc".into(),
            observer: Uuid::nil(),
        }
    }

    #[test]
    fn actor_listeners_run_in_order() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = seen.clone();
            bus.on_actor(move |_| seen.lock().push(tag));
        }
        bus.publish_actor(&ActorEvent {
            actor: actor_ref(1),
            kind: ActorEventKind::Destroyed,
        });
        assert_eq!(*seen.lock(), vec!["first", "second"]);
    }

    #[test]
    fn later_listener_can_uncancel() {
        let bus = EventBus::new();
        bus.on_interaction(|e| e.cancel());
        let mut event = InteractionEvent::new(Interaction::Attack, actor_ref(7), Uuid::nil(), 7);
        assert!(!bus.publish_interaction(&mut event));
        assert!(event.is_cancelled());

        bus.on_interaction(|e| e.set_cancelled(false));
        let mut event = InteractionEvent::new(Interaction::Attack, actor_ref(7), Uuid::nil(), 7);
        assert!(bus.publish_interaction(&mut event));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        let id = bus.on_actor(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let event = ActorEvent {
            actor: actor_ref(1),
            kind: ActorEventKind::Sneaked { state: true },
        };
        bus.publish_actor(&event);
        assert!(bus.unsubscribe(id));
        bus.publish_actor(&event);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }
}
