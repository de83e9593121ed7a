//! Actor lifecycle tests

#[cfg(test)]
mod tests {
    use npc_wire::{
        error::SkinError,
        events::{ActorEvent, ActorEventKind},
        protocol::{Field, FieldValue, ListingAction, PacketKind, ProtocolVersion},
        skin::HttpFetch,
        types::{MetaValue, Metadata},
        ActorBuilder, ActorState, Animation, Engine, EngineConfig, EquipmentSlot, ItemStack,
        Observer, Pose, RecordingObserver, Status,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    /// Never reaches the network.
    struct Offline;

    impl HttpFetch for Offline {
        fn get(&self, url: &str) -> Result<String, SkinError> {
            Err(SkinError::Transport {
                url: url.to_string(),
                reason: "offline".into(),
            })
        }
    }

    fn engine(protocol: ProtocolVersion) -> Arc<Engine> {
        Engine::builder(EngineConfig {
            protocol,
            ..EngineConfig::default()
        })
        .http(Arc::new(Offline))
        .build()
    }

    fn observer() -> Arc<RecordingObserver> {
        Arc::new(RecordingObserver::new(
            "alice",
            Pose::new("world", 0.0, 64.0, 10.0, 0.0, 0.0),
        ))
    }

    fn record_events(engine: &Engine) -> Arc<Mutex<Vec<ActorEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.bus().on_actor(move |e| sink.lock().push(e.clone()));
        seen
    }

    fn origin() -> Pose {
        Pose::new("world", 0.0, 64.0, 0.0, 0.0, 0.0)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn spawn_lists_spawns_and_registers() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let events = record_events(&engine);
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine.clone(), obs.clone());
        assert_eq!(actor.state(), ActorState::Unspawned);

        actor.spawn().unwrap();

        assert_eq!(actor.state(), ActorState::Active);
        assert_eq!(
            obs.sent_kinds(),
            vec![PacketKind::PlayerListItem, PacketKind::SpawnPlayer]
        );
        assert!(engine.registry().contains(&actor.actor_ref()));
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind.name(), "spawned");
        assert_eq!(events[0].actor.observer, obs.id());
    }

    #[test]
    fn destroy_unlists_despawns_and_unregisters() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine.clone(), obs.clone());
        actor.spawn().unwrap();
        obs.drain();

        actor.destroy().unwrap();

        let sent = obs.sent();
        assert_eq!(sent[0].kind, PacketKind::PlayerListItem);
        assert_eq!(sent[0].get(Field::ListingAction), Some(&FieldValue::VarInt(4)));
        assert_eq!(sent[1].kind, PacketKind::DestroyEntities);
        assert_eq!(
            sent[1].get(Field::EntityIds),
            Some(&FieldValue::VarIntArray(vec![actor.entity_id()]))
        );
        assert!(engine.registry().is_empty());
        assert_eq!(actor.state(), ActorState::Destroyed);
    }

    #[test]
    fn every_operation_fails_after_destroy() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine, obs.clone());
        actor.spawn().unwrap();
        actor.destroy().unwrap();
        obs.drain();

        assert!(actor.spawn().unwrap_err().is_invalid_state());
        assert!(actor.destroy().unwrap_err().is_invalid_state());
        assert!(actor.play_status(Status::TakeDamage).unwrap_err().is_invalid_state());
        assert!(actor
            .play_animation(Animation::SwingMainArm)
            .unwrap_err()
            .is_invalid_state());
        assert!(actor.rotate_head(10.0, 0.0).unwrap_err().is_invalid_state());
        assert!(actor.teleport(origin(), true).unwrap_err().is_invalid_state());
        assert!(actor
            .equip(EquipmentSlot::MainHand, ItemStack::new(1, 1))
            .unwrap_err()
            .is_invalid_state());
        assert!(actor.sleep(true).unwrap_err().is_invalid_state());
        assert!(actor.sneak(true).unwrap_err().is_invalid_state());
        assert!(actor.focus_observer().unwrap_err().is_invalid_state());
        assert!(actor
            .apply_skin(Ok(npc_wire::SkinRef::new("s", "v")))
            .unwrap_err()
            .is_invalid_state());
        assert!(obs.sent().is_empty());
    }

    #[test]
    fn mutations_before_spawn_are_rejected() {
        let engine = engine(ProtocolVersion::V1_9);
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine, observer());
        let err = actor.rotate_head(0.0, 0.0).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(err.to_string(), "invalid state for rotate_head: unspawned");
    }

    #[test]
    fn spawning_twice_is_rejected() {
        let engine = engine(ProtocolVersion::V1_9);
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine.clone(), observer());
        actor.spawn().unwrap();
        assert!(actor.spawn().unwrap_err().is_invalid_state());
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn entity_ids_are_unique_per_engine() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let a = ActorBuilder::new("A", origin()).build(engine.clone(), obs.clone());
        let b = ActorBuilder::new("B", origin()).build(engine.clone(), obs);
        assert_ne!(a.entity_id(), b.entity_id());
        assert_eq!(a.entity_id(), engine.config().entity_id_base);
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    #[test]
    fn each_operation_publishes_exactly_one_event() {
        let engine = engine(ProtocolVersion::V1_9);
        let events = record_events(&engine);
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine, observer());

        actor.spawn().unwrap();
        actor.play_status(Status::TakeDamage).unwrap();
        actor.play_animation(Animation::CriticalEffect).unwrap();
        actor.rotate_head(90.0, 0.0).unwrap();
        actor
            .teleport(Pose::new("world", 5.0, 64.0, 5.0, 0.0, 0.0), true)
            .unwrap();
        actor
            .equip(EquipmentSlot::Helmet, ItemStack::new(310, 1))
            .unwrap();
        actor.sleep(true).unwrap();
        actor.sleep(false).unwrap();
        actor.sneak(true).unwrap();
        actor.focus_observer().unwrap();
        actor.destroy().unwrap();

        let names: Vec<&str> = events.lock().iter().map(|e| e.kind.name()).collect();
        assert_eq!(
            names,
            vec![
                "spawned",
                "status_played",
                "animation_played",
                "head_rotated",
                "teleported",
                "equipped",
                "slept",
                "slept",
                "sneaked",
                "focused",
                "destroyed",
            ]
        );
    }

    #[test]
    fn events_carry_post_mutation_state() {
        let engine = engine(ProtocolVersion::V1_9);
        let events = record_events(&engine);
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine, observer());
        actor.spawn().unwrap();

        let destination = Pose::new("world", 8.0, 70.0, -2.0, 180.0, 10.0);
        actor.teleport(destination.clone(), false).unwrap();

        assert_eq!(actor.pose(), &destination);
        let last = events.lock().last().cloned().unwrap();
        assert_eq!(
            last.kind,
            ActorEventKind::Teleported {
                pose: destination,
                on_ground: false
            }
        );
    }

    // -----------------------------------------------------------------------
    // Posture
    // -----------------------------------------------------------------------

    #[test]
    fn sneak_only_touches_its_bit() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let mut metadata = Metadata::player();
        metadata.set(Metadata::FLAGS_INDEX, MetaValue::Byte(0x01));
        let mut actor = ActorBuilder::new("Guide", origin())
            .metadata(metadata)
            .build(engine, obs.clone());
        actor.spawn().unwrap();
        obs.drain();

        actor.sneak(true).unwrap();
        assert!(actor.is_sneaking());
        assert_eq!(actor.metadata().flags(), 0x03);
        let sent = obs.drain();
        assert_eq!(sent.len(), 1);
        match sent[0].get(Field::Metadata) {
            Some(FieldValue::Metadata(m)) => assert_eq!(m.flags(), 0x03),
            other => panic!("unexpected metadata field {:?}", other),
        }

        actor.sneak(false).unwrap();
        assert_eq!(actor.metadata().flags(), 0x01);
    }

    #[test]
    fn unsupported_sleep_leaves_actor_untouched() {
        let engine = engine(ProtocolVersion::V1_14);
        let obs = observer();
        let events = record_events(&engine);
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine, obs.clone());
        actor.spawn().unwrap();
        obs.drain();

        assert!(actor.sleep(true).unwrap_err().is_unsupported());
        assert!(!actor.is_sleeping());
        assert!(obs.sent().is_empty());
        assert_eq!(events.lock().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Focus
    // -----------------------------------------------------------------------

    #[test]
    fn focus_turns_toward_the_observer() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let mut actor = ActorBuilder::new("Guide", Pose::new("world", 0.0, 64.0, 0.0, 123.0, 0.0))
            .build(engine, obs.clone());
        actor.spawn().unwrap();

        // Observer straight down +z.
        actor.focus_observer().unwrap();
        assert!(actor.pose().yaw.abs() < 1e-3);
        assert!(actor.pose().pitch.abs() < 1e-3);

        // Observer on -x.
        obs.set_pose(Pose::new("world", -10.0, 64.0, 0.0, 0.0, 0.0));
        actor.focus_observer().unwrap();
        assert!((actor.pose().yaw - 90.0).abs() < 1e-3);

        // Directly above: yaw kept, looking up.
        obs.set_pose(Pose::new("world", 0.0, 80.0, 0.0, 0.0, 0.0));
        actor.focus_observer().unwrap();
        assert!((actor.pose().yaw - 90.0).abs() < 1e-3);
        assert_eq!(actor.pose().pitch, -90.0);
    }

    // -----------------------------------------------------------------------
    // Listing visibility
    // -----------------------------------------------------------------------

    #[test]
    fn unlisted_actor_leaves_the_list_after_two_ticks() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let mut actor = ActorBuilder::new("Ghost", origin())
            .listed(false)
            .build(engine.clone(), obs.clone());
        actor.spawn().unwrap();
        assert_eq!(obs.sent()[0].get(Field::ListingAction), Some(&FieldValue::VarInt(0)));
        obs.drain();

        engine.scheduler().tick();
        assert!(obs.sent().is_empty(), "removal sent before the delay");

        engine.scheduler().tick();
        let sent = obs.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, PacketKind::PlayerListItem);
        assert_eq!(
            sent[0]
                .get(Field::ListingEntries)
                .map(|v| matches!(v, FieldValue::Listing(ListingAction::Remove, _))),
            Some(true)
        );
        assert_eq!(engine.scheduler().pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn engine_driver_unlists_without_manual_ticks() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let mut actor = ActorBuilder::new("Ghost", origin())
            .listed(false)
            .build(engine.clone(), obs.clone());
        actor.spawn().unwrap();
        obs.drain();

        // 20Hz: the first tick fires at once, the second 50ms later.
        let driver = engine.start_scheduler();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(engine.scheduler().current_tick(), 1);
        assert!(obs.sent().is_empty());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let sent = obs.drain();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, PacketKind::PlayerListItem);
        assert_eq!(engine.scheduler().pending(), 0);
        driver.abort();
    }

    #[test]
    fn listed_actor_stays_listed() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine.clone(), obs.clone());
        actor.spawn().unwrap();
        obs.drain();
        for _ in 0..5 {
            engine.scheduler().tick();
        }
        assert!(obs.sent().is_empty());
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    #[test]
    fn closed_connection_surfaces_transport_error() {
        let engine = engine(ProtocolVersion::V1_9);
        let obs = observer();
        let mut actor = ActorBuilder::new("Guide", origin()).build(engine, obs.clone());
        actor.spawn().unwrap();
        obs.close();
        let err = actor.play_animation(Animation::SwingMainArm).unwrap_err();
        assert!(matches!(err, npc_wire::EngineError::Transport(_)));
    }
}
