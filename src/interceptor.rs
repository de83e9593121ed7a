//! Inbound interception – raw observer traffic → interaction events.
//!
//! ```text
//!  network thread                          worker task
//!  ─────────────                           ───────────
//!  frame ─▶ classify ─▶ debounce ─▶ try_send ─▶ fan-out ─▶ EventBus
//!                                      │
//!                                      └─ queue full: warn + drop
//! ```
//!
//! Classification and debouncing are cheap and run inline on the
//! connection's thread. Publication happens on a Tokio task fed by a bounded
//! queue, so slow listeners never stall the connection. Frames are never
//! modified or swallowed.

use bytes::Bytes;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::catalog::use_entity;
use crate::codec::get_var_int;
use crate::engine::Engine;
use crate::error::{ClassificationError, Result};
use crate::events::{ActorRef, Interaction, InteractionEvent};
use crate::transport::{ConnectionPipeline, InboundStage};
use crate::types::FanOut;

/// Pipeline stage name of the interceptor.
pub const INTERCEPTOR_STAGE: &str = "npc_interceptor";

// ---------------------------------------------------------------------------
// Debounce
// ---------------------------------------------------------------------------

/// Accepts at most one occurrence per `window`, measured from the last
/// accepted occurrence.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn accept(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last {
            if now.saturating_duration_since(last) < self.window {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}

// ---------------------------------------------------------------------------
// Interceptor
// ---------------------------------------------------------------------------

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a use-entity attack/interact, or malformed.
    Ignored,
    /// Inside the debounce window.
    Debounced(Interaction),
    /// Queued for publication.
    Accepted(Interaction),
    /// Publication queue full or closed.
    Dropped(Interaction),
}

#[derive(Debug)]
struct Job {
    kind: Interaction,
    target: i32,
}

/// Per-observer inbound tap. Debounce state belongs to this instance, so
/// observers never throttle each other.
pub struct PacketInterceptor {
    observer: Uuid,
    use_entity_id: i32,
    attack: Mutex<Debounce>,
    interact: Mutex<Debounce>,
    jobs: mpsc::Sender<Job>,
}

impl PacketInterceptor {
    /// Create the interceptor for `observer` and start its publication
    /// worker. Must be called inside a Tokio runtime; the worker ends once
    /// the interceptor is dropped.
    pub fn new(engine: Arc<Engine>, observer: Uuid) -> Result<(Arc<Self>, JoinHandle<()>)> {
        let config = engine.config();
        let use_entity_id = engine.encoder().catalog().use_entity_id()?;
        let (tx, rx) = mpsc::channel(config.dispatch_capacity.max(1));
        let interceptor = Arc::new(Self {
            observer,
            use_entity_id,
            attack: Mutex::new(Debounce::new(Duration::from_millis(config.attack_window_ms))),
            interact: Mutex::new(Debounce::new(Duration::from_millis(
                config.interact_window_ms,
            ))),
            jobs: tx,
        });
        let worker = tokio::spawn(run_worker(engine, observer, rx));
        Ok((interceptor, worker))
    }

    pub fn observer(&self) -> Uuid {
        self.observer
    }

    /// Insert into `pipeline` right after its decoder. A pipeline carries at
    /// most one interceptor.
    pub fn attach(self: &Arc<Self>, pipeline: &ConnectionPipeline) -> Result<()> {
        pipeline.inject_after(
            ConnectionPipeline::DECODER,
            INTERCEPTOR_STAGE,
            self.clone(),
        )?;
        debug!("interceptor attached for observer {}", self.observer);
        Ok(())
    }

    pub fn detach(&self, pipeline: &ConnectionPipeline) -> bool {
        let removed = pipeline.eject(INTERCEPTOR_STAGE);
        if removed {
            debug!("interceptor detached for observer {}", self.observer);
        }
        removed
    }

    /// Decode `VarInt id ‖ VarInt target ‖ VarInt action …` into an
    /// interaction. `Ok(None)` for every other packet and for plain
    /// interact, which the client sends alongside interact-at.
    pub fn classify(
        &self,
        frame: &[u8],
    ) -> std::result::Result<Option<(Interaction, i32)>, ClassificationError> {
        classify_use_entity(self.use_entity_id, frame)
    }

    /// Classify, debounce and queue one frame as seen at `now`.
    pub fn handle_frame(&self, frame: &[u8], now: Instant) -> Outcome {
        let (kind, target) = match self.classify(frame) {
            Ok(Some(hit)) => hit,
            Ok(None) => return Outcome::Ignored,
            Err(e) => {
                debug!("ignoring inbound frame from {}: {}", self.observer, e);
                return Outcome::Ignored;
            }
        };

        let accepted = match kind {
            Interaction::Attack => self.attack.lock().accept(now),
            Interaction::Interact => self.interact.lock().accept(now),
        };
        if !accepted {
            return Outcome::Debounced(kind);
        }

        match self.jobs.try_send(Job { kind, target }) {
            Ok(()) => Outcome::Accepted(kind),
            Err(TrySendError::Full(job)) => {
                warn!(
                    "interaction queue full, dropping {:?} on {} from {}",
                    job.kind, job.target, self.observer
                );
                Outcome::Dropped(kind)
            }
            Err(TrySendError::Closed(job)) => {
                warn!(
                    "interaction worker gone, dropping {:?} on {} from {}",
                    job.kind, job.target, self.observer
                );
                Outcome::Dropped(kind)
            }
        }
    }
}

impl InboundStage for PacketInterceptor {
    fn on_inbound(&self, frame: &Bytes) {
        self.handle_frame(frame, Instant::now());
    }
}

/// Classify against an explicit use-entity packet id.
pub fn classify_use_entity(
    use_entity_id: i32,
    frame: &[u8],
) -> std::result::Result<Option<(Interaction, i32)>, ClassificationError> {
    if frame.is_empty() {
        return Err(ClassificationError::Empty);
    }
    let mut buf = frame;
    if get_var_int(&mut buf)? != use_entity_id {
        return Ok(None);
    }
    let target = get_var_int(&mut buf).map_err(truncated("target"))?;
    let action = get_var_int(&mut buf).map_err(truncated("action"))?;
    match action {
        use_entity::ATTACK => Ok(Some((Interaction::Attack, target))),
        use_entity::INTERACT_AT => Ok(Some((Interaction::Interact, target))),
        use_entity::INTERACT => Ok(None),
        other => Err(ClassificationError::UnknownAction(other)),
    }
}

fn truncated(what: &'static str) -> impl Fn(ClassificationError) -> ClassificationError {
    move |e| match e {
        ClassificationError::Truncated(_) => ClassificationError::Truncated(what),
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

async fn run_worker(engine: Arc<Engine>, observer: Uuid, mut rx: mpsc::Receiver<Job>) {
    while let Some(job) = rx.recv().await {
        dispatch(&engine, observer, job.kind, job.target);
    }
    debug!("interaction worker for {} stopped", observer);
}

/// Actors that receive an interaction under `fan_out`.
pub fn recipients(engine: &Engine, observer: Uuid, target: i32) -> Vec<ActorRef> {
    match engine.config().fan_out {
        FanOut::Broadcast => engine.registry().snapshot(),
        FanOut::Targeted => engine
            .registry()
            .find(|a| a.entity_id == target && a.observer == observer)
            .into_iter()
            .collect(),
    }
}

/// Publish `kind` to every recipient synchronously. Returns how many
/// events survived their listeners.
pub fn dispatch(engine: &Engine, observer: Uuid, kind: Interaction, target: i32) -> usize {
    let mut survived = 0;
    for actor in recipients(engine, observer, target) {
        let mut event = InteractionEvent::new(kind, actor, observer, target);
        if engine.bus().publish_interaction(&mut event) {
            survived += 1;
        } else {
            debug!(
                "{:?} on npc {} by {} cancelled by a listener",
                kind, event.actor.entity_id, observer
            );
        }
    }
    survived
}
