//! Inbound interception tests

#[cfg(test)]
mod tests {
    use npc_wire::{
        error::{ClassificationError, SkinError},
        events::{ActorRef, Interaction, InteractionEvent},
        interceptor::{classify_use_entity, dispatch, Debounce, Outcome, PacketInterceptor},
        protocol::ProtocolVersion,
        skin::HttpFetch,
        transport::ConnectionPipeline,
        Actor, ActorBuilder, Engine, EngineConfig, FanOut, Observer, Pose, RecordingObserver,
    };
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use uuid::Uuid;

    /// Use-entity packet id on 1.9.
    const USE_ENTITY: u8 = 0x0A;

    struct Offline;

    impl HttpFetch for Offline {
        fn get(&self, url: &str) -> Result<String, SkinError> {
            Err(SkinError::Transport {
                url: url.to_string(),
                reason: "offline".into(),
            })
        }
    }

    fn engine(fan_out: FanOut, dispatch_capacity: usize) -> Arc<Engine> {
        Engine::builder(EngineConfig {
            protocol: ProtocolVersion::V1_9,
            fan_out,
            dispatch_capacity,
            ..EngineConfig::default()
        })
        .http(Arc::new(Offline))
        .build()
    }

    fn observer(name: &str) -> Arc<RecordingObserver> {
        Arc::new(RecordingObserver::new(
            name,
            Pose::new("world", 0.0, 64.0, 0.0, 0.0, 0.0),
        ))
    }

    fn spawned(engine: &Arc<Engine>, observer: &Arc<RecordingObserver>, name: &str) -> Actor {
        let mut actor = ActorBuilder::new(name, Pose::new("world", 1.0, 64.0, 1.0, 0.0, 0.0))
            .build(engine.clone(), observer.clone());
        actor.spawn().unwrap();
        actor
    }

    fn attack(target: u8) -> [u8; 3] {
        [USE_ENTITY, target, 0x01]
    }

    fn interact_at(target: u8) -> Vec<u8> {
        let mut frame = vec![USE_ENTITY, target, 0x02];
        frame.extend_from_slice(&0.5f32.to_be_bytes());
        frame.extend_from_slice(&1.0f32.to_be_bytes());
        frame.extend_from_slice(&0.5f32.to_be_bytes());
        frame
    }

    fn record_interactions(engine: &Engine) -> Arc<Mutex<Vec<InteractionEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine
            .bus()
            .on_interaction(move |e| sink.lock().push(e.clone()));
        seen
    }

    // -----------------------------------------------------------------------
    // Debounce
    // -----------------------------------------------------------------------

    #[test]
    fn attack_window_boundary() {
        let t0 = Instant::now();
        let mut window = Debounce::new(Duration::from_millis(500));
        assert!(window.accept(t0));
        assert!(!window.accept(t0 + Duration::from_millis(499)));
        assert!(window.accept(t0 + Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn attack_and_interact_windows_are_independent() {
        let engine = engine(FanOut::Broadcast, 16);
        let (interceptor, _worker) = PacketInterceptor::new(engine, Uuid::new_v4()).unwrap();
        let t0 = Instant::now();

        assert_eq!(
            interceptor.handle_frame(&attack(5), t0),
            Outcome::Accepted(Interaction::Attack)
        );
        assert_eq!(
            interceptor.handle_frame(&interact_at(5), t0 + Duration::from_millis(10)),
            Outcome::Accepted(Interaction::Interact)
        );
        assert_eq!(
            interceptor.handle_frame(&attack(5), t0 + Duration::from_millis(499)),
            Outcome::Debounced(Interaction::Attack)
        );
        assert_eq!(
            interceptor.handle_frame(&interact_at(5), t0 + Duration::from_millis(309)),
            Outcome::Debounced(Interaction::Interact)
        );
        assert_eq!(
            interceptor.handle_frame(&interact_at(5), t0 + Duration::from_millis(310)),
            Outcome::Accepted(Interaction::Interact)
        );
        assert_eq!(
            interceptor.handle_frame(&attack(5), t0 + Duration::from_millis(500)),
            Outcome::Accepted(Interaction::Attack)
        );
    }

    #[tokio::test]
    async fn interceptors_do_not_share_windows() {
        let engine = engine(FanOut::Broadcast, 16);
        let (first, _w1) = PacketInterceptor::new(engine.clone(), Uuid::new_v4()).unwrap();
        let (second, _w2) = PacketInterceptor::new(engine, Uuid::new_v4()).unwrap();
        let t0 = Instant::now();
        assert!(matches!(first.handle_frame(&attack(1), t0), Outcome::Accepted(_)));
        assert!(matches!(second.handle_frame(&attack(1), t0), Outcome::Accepted(_)));
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    #[test]
    fn classification_of_well_formed_frames() {
        let id = USE_ENTITY as i32;
        assert_eq!(
            classify_use_entity(id, &attack(42)),
            Ok(Some((Interaction::Attack, 42)))
        );
        assert_eq!(
            classify_use_entity(id, &interact_at(42)),
            Ok(Some((Interaction::Interact, 42)))
        );
        // Other serverbound packets pass untouched.
        assert_eq!(classify_use_entity(id, &[0x0B, 0x00]), Ok(None));
        // Multi-byte target ids.
        assert_eq!(
            classify_use_entity(id, &[USE_ENTITY, 0x80, 0x80, 0x80, 0x80, 0x02, 0x01]),
            Ok(Some((Interaction::Attack, 0x2000_0000)))
        );
    }

    #[test]
    fn classification_of_malformed_frames() {
        let id = USE_ENTITY as i32;
        assert_eq!(classify_use_entity(id, &[]), Err(ClassificationError::Empty));
        assert_eq!(
            classify_use_entity(id, &[USE_ENTITY]),
            Err(ClassificationError::Truncated("target"))
        );
        assert_eq!(
            classify_use_entity(id, &[USE_ENTITY, 0x05]),
            Err(ClassificationError::Truncated("action"))
        );
        assert_eq!(
            classify_use_entity(id, &[USE_ENTITY, 0x05, 0x07]),
            Err(ClassificationError::UnknownAction(7))
        );
        assert_eq!(
            classify_use_entity(id, &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]),
            Err(ClassificationError::VarIntTooLong)
        );
    }

    #[tokio::test]
    async fn malformed_frames_are_ignored() {
        let engine = engine(FanOut::Broadcast, 16);
        let (interceptor, _worker) = PacketInterceptor::new(engine, Uuid::new_v4()).unwrap();
        let now = Instant::now();
        assert_eq!(interceptor.handle_frame(&[], now), Outcome::Ignored);
        assert_eq!(interceptor.handle_frame(&[USE_ENTITY, 0x05], now), Outcome::Ignored);
        // Plain interact never raises an event.
        assert_eq!(
            interceptor.handle_frame(&[USE_ENTITY, 0x05, 0x00], now),
            Outcome::Ignored
        );
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    #[test]
    fn broadcast_reaches_every_registered_actor() {
        let engine = engine(FanOut::Broadcast, 16);
        let alice = observer("alice");
        let bob = observer("bob");
        let a = spawned(&engine, &alice, "A");
        let b = spawned(&engine, &bob, "B");
        let seen = record_interactions(&engine);

        let delivered = dispatch(&engine, alice.id(), Interaction::Attack, a.entity_id());

        assert_eq!(delivered, 2);
        let actors: Vec<ActorRef> = seen.lock().iter().map(|e| e.actor.clone()).collect();
        assert_eq!(actors, vec![a.actor_ref(), b.actor_ref()]);
        assert!(seen.lock()[0].is_targeted());
        assert!(!seen.lock()[1].is_targeted());
    }

    #[test]
    fn targeted_reaches_only_the_named_actor_of_this_observer() {
        let engine = engine(FanOut::Targeted, 16);
        let alice = observer("alice");
        let bob = observer("bob");
        let a = spawned(&engine, &alice, "A");
        let _other = spawned(&engine, &alice, "C");
        let b = spawned(&engine, &bob, "B");
        let seen = record_interactions(&engine);

        assert_eq!(dispatch(&engine, alice.id(), Interaction::Interact, a.entity_id()), 1);
        assert_eq!(seen.lock()[0].actor, a.actor_ref());

        // Bob's actor is not alice's to hit.
        assert_eq!(dispatch(&engine, alice.id(), Interaction::Attack, b.entity_id()), 0);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn cancelled_interactions_do_not_survive() {
        let engine = engine(FanOut::Broadcast, 16);
        let alice = observer("alice");
        let a = spawned(&engine, &alice, "A");
        engine.bus().on_interaction(|e| {
            if e.kind == Interaction::Attack {
                e.cancel();
            }
        });
        let seen = record_interactions(&engine);

        assert_eq!(dispatch(&engine, alice.id(), Interaction::Attack, a.entity_id()), 0);
        assert!(seen.lock()[0].is_cancelled());
        assert_eq!(dispatch(&engine, alice.id(), Interaction::Interact, a.entity_id()), 1);
    }

    // -----------------------------------------------------------------------
    // Pipeline + worker
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn frames_flow_through_the_pipeline_to_listeners() {
        let engine = engine(FanOut::Broadcast, 16);
        let alice = observer("alice");
        let a = spawned(&engine, &alice, "A");
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        engine.bus().on_interaction(move |e| {
            let _ = tx.send((e.kind, e.actor.entity_id, e.observer));
        });

        let pipeline = ConnectionPipeline::new();
        let (interceptor, _worker) = PacketInterceptor::new(engine.clone(), alice.id()).unwrap();
        interceptor.attach(&pipeline).unwrap();

        let frame = Bytes::copy_from_slice(&[USE_ENTITY, 0x07, 0x01]);
        let passed = pipeline.deliver(frame.clone());
        assert_eq!(passed, frame);

        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, (Interaction::Attack, a.entity_id(), alice.id()));
    }

    #[tokio::test]
    async fn second_attach_is_refused() {
        let engine = engine(FanOut::Broadcast, 16);
        let pipeline = ConnectionPipeline::new();
        let (first, _w1) = PacketInterceptor::new(engine.clone(), Uuid::new_v4()).unwrap();
        let (second, _w2) = PacketInterceptor::new(engine, Uuid::new_v4()).unwrap();

        first.attach(&pipeline).unwrap();
        assert!(second.attach(&pipeline).unwrap_err().is_invalid_state());
        assert_eq!(pipeline.stage_names(), vec!["decoder", "npc_interceptor"]);

        assert!(first.detach(&pipeline));
        assert!(!first.detach(&pipeline));
        second.attach(&pipeline).unwrap();
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let engine = engine(FanOut::Broadcast, 1);
        let (interceptor, _worker) = PacketInterceptor::new(engine, Uuid::new_v4()).unwrap();
        let now = Instant::now();
        // The worker cannot run until this test yields, so the single slot
        // stays taken.
        assert_eq!(
            interceptor.handle_frame(&attack(3), now),
            Outcome::Accepted(Interaction::Attack)
        );
        assert_eq!(
            interceptor.handle_frame(&interact_at(3), now),
            Outcome::Dropped(Interaction::Interact)
        );
    }
}
