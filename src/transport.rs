//! Transport seams – the observer's outbound sink and inbound pipeline.
//!
//! The engine never owns a socket. A host hands it an [`Observer`] (send
//! packets, report the observer's live pose) and a [`ConnectionPipeline`]
//! through which every decoded inbound frame flows; the interceptor is one
//! named stage in that pipeline.

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::protocol::{Packet, PacketKind};
use crate::types::Pose;

// ---------------------------------------------------------------------------
// Observer
// ---------------------------------------------------------------------------

/// The remote endpoint an actor is presented to.
pub trait Observer: Send + Sync {
    fn id(&self) -> Uuid;

    fn name(&self) -> String;

    /// Live position of the observer.
    fn pose(&self) -> Pose;

    /// Queue one packet on the observer's connection.
    fn send(&self, packet: &Packet) -> Result<()>;
}

/// Observer that keeps every packet it is sent. Used by the probe and
/// by hosts that forward packets themselves.
pub struct RecordingObserver {
    id: Uuid,
    name: String,
    pose: RwLock<Pose>,
    sent: Mutex<Vec<Packet>>,
    closed: RwLock<bool>,
}

impl RecordingObserver {
    pub fn new(name: impl Into<String>, pose: Pose) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pose: RwLock::new(pose),
            sent: Mutex::new(Vec::new()),
            closed: RwLock::new(false),
        }
    }

    pub fn set_pose(&self, pose: Pose) {
        *self.pose.write() = pose;
    }

    /// Further sends fail with a transport error.
    pub fn close(&self) {
        *self.closed.write() = true;
    }

    pub fn sent(&self) -> Vec<Packet> {
        self.sent.lock().clone()
    }

    pub fn sent_kinds(&self) -> Vec<PacketKind> {
        self.sent.lock().iter().map(|p| p.kind).collect()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<Packet> {
        std::mem::take(&mut *self.sent.lock())
    }
}

impl Observer for RecordingObserver {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn pose(&self) -> Pose {
        self.pose.read().clone()
    }

    fn send(&self, packet: &Packet) -> Result<()> {
        if *self.closed.read() {
            return Err(EngineError::Transport(format!(
                "connection of {} is closed",
                self.name
            )));
        }
        self.sent.lock().push(packet.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Inbound pipeline
// ---------------------------------------------------------------------------

/// A pass-through stage that observes decoded inbound frames
/// (`VarInt id ‖ payload`). Runs on the connection's network thread.
pub trait InboundStage: Send + Sync {
    fn on_inbound(&self, frame: &Bytes);
}

/// Ordered, named inbound stages of one connection.
pub struct ConnectionPipeline {
    stages: RwLock<Vec<(String, Option<Arc<dyn InboundStage>>)>>,
}

impl ConnectionPipeline {
    /// Name of the built-in decoder stage every pipeline starts with.
    pub const DECODER: &'static str = "decoder";

    pub fn new() -> Self {
        Self {
            stages: RwLock::new(vec![(Self::DECODER.to_string(), None)]),
        }
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.read().iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.read().iter().any(|(n, _)| n == name)
    }

    /// Insert `stage` right after `base`. Names are unique per pipeline.
    pub fn inject_after(
        &self,
        base: &str,
        name: &str,
        stage: Arc<dyn InboundStage>,
    ) -> Result<()> {
        let mut stages = self.stages.write();
        if stages.iter().any(|(n, _)| n == name) {
            return Err(EngineError::InvalidState {
                operation: "inject",
                state: "already injected",
            });
        }
        let idx = stages
            .iter()
            .position(|(n, _)| n == base)
            .ok_or_else(|| EngineError::Transport(format!("no pipeline stage '{}'", base)))?;
        stages.insert(idx + 1, (name.to_string(), Some(stage)));
        Ok(())
    }

    /// Remove stage `name`. Returns whether it was present.
    pub fn eject(&self, name: &str) -> bool {
        let mut stages = self.stages.write();
        let before = stages.len();
        stages.retain(|(n, s)| n != name || s.is_none());
        stages.len() != before
    }

    /// Run `frame` through every stage and hand it back unchanged.
    pub fn deliver(&self, frame: Bytes) -> Bytes {
        let stages: Vec<Arc<dyn InboundStage>> = self
            .stages
            .read()
            .iter()
            .filter_map(|(_, s)| s.clone())
            .collect();
        for stage in stages {
            stage.on_inbound(&frame);
        }
        frame
    }
}

impl Default for ConnectionPipeline {
    fn default() -> Self {
        Self::new()
    }
}
