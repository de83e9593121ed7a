//! NPC Wire Engine
//!
//! Presents synthetic player actors to individual observers by speaking the
//! game's entity protocol directly, without going through the host's entity
//! layer.
//!
//! ## Architecture
//!
//! ```text
//! Engine  (engine.rs)                  ← shared context, one per host
//!   ├── Encoder     (encoder.rs)       ← per-version strategy
//!   │     └── Catalog (catalog.rs)     ← packet ids + field layouts
//!   ├── EventBus    (events.rs)
//!   ├── Registry    (registry.rs)      ← live actors
//!   ├── TickScheduler (scheduler.rs)
//!   └── SkinResolver  (skin.rs)
//!
//! Actor  (actor.rs)              ← state machine, one per (actor, observer)
//!   └── Observer (transport.rs)  ← outbound packets
//!
//! PacketInterceptor (interceptor.rs)  ← stage in a ConnectionPipeline
//! ```
//!
//! The catalog, encoder and codec are pure and always available. Everything
//! that needs Tokio or HTTP sits behind the `runtime` feature.

// Pure protocol layer (no runtime feature needed).
pub mod catalog;
pub mod codec;
pub mod encoder;
pub mod error;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod scheduler;
pub mod types;

// Runtime modules require the `runtime` feature.
#[cfg(feature = "runtime")]
pub mod actor;
#[cfg(feature = "runtime")]
pub mod engine;
#[cfg(feature = "runtime")]
pub mod interceptor;
#[cfg(feature = "runtime")]
pub mod skin;
#[cfg(feature = "runtime")]
pub mod transport;

// Convenience re-exports (runtime only)
#[cfg(feature = "runtime")]
pub use actor::{Actor, ActorBuilder, ActorState};
#[cfg(feature = "runtime")]
pub use engine::{Engine, EngineBuilder};
#[cfg(feature = "runtime")]
pub use interceptor::{Debounce, Outcome, PacketInterceptor};
#[cfg(feature = "runtime")]
pub use skin::{HttpFetch, SkinResolver};
#[cfg(feature = "runtime")]
pub use transport::{ConnectionPipeline, InboundStage, Observer, RecordingObserver};

pub use encoder::{ActorView, Encoder, Operation};
pub use error::{ClassificationError, EngineError, Result, SkinError};
pub use events::{ActorEvent, ActorEventKind, ActorRef, EventBus, Interaction, InteractionEvent};
pub use protocol::{Packet, PacketKind, ProtocolVersion};
pub use types::{
    Animation, EngineConfig, EquipmentSlot, FanOut, ItemStack, Metadata, Pose, SkinRef, Status,
};
