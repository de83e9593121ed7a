//! Engine context – everything actors and interceptors share.
//!
//! One `Engine` per host process, built once and handed around as
//! `Arc<Engine>`. It owns the protocol strategy, the event bus, the live
//! actor registry, the tick scheduler, the skin resolver and the entity id
//! allocator.

use log::info;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use crate::encoder::Encoder;
use crate::events::{ActorRef, EventBus};
use crate::protocol::ProtocolVersion;
use crate::registry::Registry;
use crate::scheduler::TickScheduler;
use crate::skin::{HttpFetch, SkinResolver};
use crate::types::EngineConfig;

pub struct Engine {
    config: EngineConfig,
    encoder: Encoder,
    bus: Arc<EventBus>,
    registry: Arc<Registry<ActorRef>>,
    scheduler: Arc<TickScheduler>,
    skins: Arc<SkinResolver>,
    next_entity_id: AtomicI32,
}

impl Engine {
    /// Engine with a reqwest-backed skin resolver.
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            http: None,
            bus: None,
            scheduler: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn version(&self) -> ProtocolVersion {
        self.encoder.version()
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn registry(&self) -> &Arc<Registry<ActorRef>> {
        &self.registry
    }

    pub fn scheduler(&self) -> &Arc<TickScheduler> {
        &self.scheduler
    }

    pub fn skins(&self) -> &Arc<SkinResolver> {
        &self.skins
    }

    /// Start ticking the scheduler at `tick_rate_hz`. Hosts that tick
    /// [`scheduler`](Self::scheduler) themselves skip this; without either,
    /// deferred work such as listing removal never runs.
    #[cfg(feature = "runtime")]
    pub fn start_scheduler(&self) -> tokio::task::JoinHandle<()> {
        self.scheduler.clone().spawn_driver(self.config.tick_rate_hz)
    }

    /// Next free entity id. Unique for the lifetime of this engine.
    pub fn allocate_entity_id(&self) -> i32 {
        self.next_entity_id.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct EngineBuilder {
    config: EngineConfig,
    http: Option<Arc<dyn HttpFetch>>,
    bus: Option<Arc<EventBus>>,
    scheduler: Option<Arc<TickScheduler>>,
}

impl EngineBuilder {
    /// Replace the HTTP client used for skin lookups.
    pub fn http(mut self, http: Arc<dyn HttpFetch>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<TickScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn build(self) -> Arc<Engine> {
        let config = self.config;
        let skins = match self.http {
            Some(http) => SkinResolver::new(config.skin.clone(), http),
            None => SkinResolver::with_reqwest(config.skin.clone()),
        };
        info!(
            "npc engine speaking {}, entity ids from {:#x}",
            config.protocol, config.entity_id_base
        );
        Arc::new(Engine {
            encoder: Encoder::for_version(config.protocol),
            bus: self.bus.unwrap_or_default(),
            registry: Arc::new(Registry::new()),
            scheduler: self.scheduler.unwrap_or_default(),
            skins: Arc::new(skins),
            next_entity_id: AtomicI32::new(config.entity_id_base),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_monotonic_from_base() {
        let engine = Engine::new(EngineConfig {
            entity_id_base: 1000,
            ..EngineConfig::default()
        });
        assert_eq!(engine.allocate_entity_id(), 1000);
        assert_eq!(engine.allocate_entity_id(), 1001);
    }

    #[test]
    fn encoder_follows_configured_protocol() {
        let engine = Engine::new(EngineConfig {
            protocol: ProtocolVersion::V1_14,
            ..EngineConfig::default()
        });
        assert_eq!(engine.version(), ProtocolVersion::V1_14);
        assert!(engine.registry().is_empty());
    }
}
