//! End-to-end engine lifecycle tests.
//!
//! Drives a full [`Engine`] with scripted cores and agents through
//! init, ticks, agent commands, pubsub traffic, fault recovery, and
//! shutdown. Timing caveat baked into several tests: an agent spawned
//! during tick N first computes during tick N+1, and a message
//! published during tick N is routed at the end of tick N and popped
//! by its subscriber during tick N+1.

use std::sync::Arc;
use std::time::Duration;

use lode_core::{CellCoord, Dims, EntityEvent, EntityId, EntityKind, GridPos};
use lode_engine::{Engine, EngineConfig};
use lode_test_utils::{NullAgentFactory, QueueAgentFactory, ScriptedAgent, ScriptedCore, SlowCore};

fn config() -> EngineConfig {
    EngineConfig {
        worker_count: Some(2),
        ..EngineConfig::default()
    }
}

fn run_one_tick(engine: &mut Engine) {
    assert!(engine.request_tick(), "tick request rejected");
    engine.wait_idle();
}

#[test]
fn empty_world_tick_produces_full_update() {
    let mut core = ScriptedCore::new();
    core.export_payload = vec![1, 2, 3];
    let mut engine =
        Engine::new(Box::new(core), Arc::new(NullAgentFactory), config()).unwrap();

    engine.init(Dims::new(4, 4, 4));
    assert_eq!(engine.chunk_count(), 64);
    assert!(engine.entities().is_empty());

    run_one_tick(&mut engine);
    let update = engine.drain_update().expect("tick published no update");
    assert!(update.entities.is_empty());
    assert_eq!(update.export, vec![1, 2, 3]);
    // Every chunk starts dirty, so the first collection rebuilds all.
    assert_eq!(update.rebuilt.len(), 64);

    // Nothing new until the next tick.
    assert!(engine.drain_update().is_none());
}

#[test]
fn entity_lifecycle_tracks_chunk_rebuilds() {
    let id = EntityId::from_u128(11);
    let mut core = ScriptedCore::new();
    core.script_tick(vec![EntityEvent::Deposit {
        id,
        pos: GridPos::new(0, 0, 0),
        quantity: 3,
    }]);
    core.script_tick(vec![EntityEvent::Deposit {
        id,
        pos: GridPos::new(16, 0, 0),
        quantity: 3,
    }]);
    core.script_tick(vec![EntityEvent::Removed { id }]);
    let mut engine =
        Engine::new(Box::new(core), Arc::new(NullAgentFactory), config()).unwrap();
    engine.init(Dims::new(2, 2, 2));

    run_one_tick(&mut engine);
    let update = engine.drain_update().unwrap();
    assert_eq!(update.entities.len(), 1);
    assert_eq!(update.entities[0].kind(), EntityKind::Deposit);
    assert_eq!(update.rebuilt.len(), 8);

    // The move dirties exactly the source and destination chunks.
    run_one_tick(&mut engine);
    let update = engine.drain_update().unwrap();
    assert_eq!(
        update.rebuilt,
        vec![CellCoord::new(0, 0, 0), CellCoord::new(1, 0, 0)]
    );
    assert_eq!(engine.entity(id).unwrap().pos, GridPos::new(16, 0, 0));

    run_one_tick(&mut engine);
    let update = engine.drain_update().unwrap();
    assert!(update.entities.is_empty());
    assert_eq!(update.rebuilt, vec![CellCoord::new(1, 0, 0)]);
    assert!(engine.entity(id).is_none());
}

#[test]
fn voxel_changes_refresh_chunk_meshes() {
    let cell = CellCoord::new(0, 0, 0);
    let mut core = ScriptedCore::new();
    // Tick 1 leaves the voxels alone; tick 2 alters the only chunk.
    core.script_voxel_change(vec![]);
    core.script_voxel_change(vec![cell]);
    let mut engine =
        Engine::new(Box::new(core), Arc::new(NullAgentFactory), config()).unwrap();
    engine.init(Dims::new(1, 1, 1));

    run_one_tick(&mut engine);
    let update = engine.drain_update().unwrap();
    assert_eq!(update.rebuilt, vec![cell]);
    let initial = engine.chunk_mesh(cell).unwrap();

    // No entity moved, but the core's voxel edit still forces a
    // rebuild and the collected mesh reflects it.
    run_one_tick(&mut engine);
    let update = engine.drain_update().unwrap();
    assert_eq!(update.rebuilt, vec![cell]);
    let edited = engine.chunk_mesh(cell).unwrap();
    assert_ne!(edited.vertices, initial.vertices);

    // Quiet tick: nothing rebuilds, the mesh stays put.
    run_one_tick(&mut engine);
    let update = engine.drain_update().unwrap();
    assert!(update.rebuilt.is_empty());
    assert_eq!(engine.chunk_mesh(cell).unwrap().vertices, edited.vertices);
}

#[test]
fn agent_commands_reach_the_core() {
    let id = EntityId::from_u128(21);
    let mut core = ScriptedCore::new();
    let commands = core.command_log();
    core.script_tick(vec![EntityEvent::Agent {
        id,
        pos: GridPos::new(0, 0, 0),
    }]);
    let agent = ScriptedAgent::new().with_command(vec![42, 43]);
    let factory = Arc::new(QueueAgentFactory::new(vec![Box::new(agent)]));
    let mut engine = Engine::new(Box::new(core), factory, config()).unwrap();
    engine.init(Dims::new(1, 1, 1));

    // Tick 1 spawns the agent; it first computes during tick 2.
    run_one_tick(&mut engine);
    assert!(commands.lock().unwrap().is_empty());
    assert_eq!(engine.entities().len(), 1);

    run_one_tick(&mut engine);
    assert_eq!(commands.lock().unwrap().as_slice(), &[(id, vec![42, 43])]);
}

#[test]
fn agents_see_the_censored_snapshot() {
    let mut core = ScriptedCore::new();
    core.export_payload = vec![9, 9, 9];
    core.script_tick(vec![EntityEvent::Agent {
        id: EntityId::from_u128(22),
        pos: GridPos::new(0, 0, 0),
    }]);
    let agent = ScriptedAgent::new();
    let snapshots = agent.snapshot_log();
    let factory = Arc::new(QueueAgentFactory::new(vec![Box::new(agent)]));
    let mut engine = Engine::new(Box::new(core), factory, config()).unwrap();
    engine.init(Dims::new(1, 1, 1));

    run_one_tick(&mut engine);
    run_one_tick(&mut engine);
    assert_eq!(snapshots.lock().unwrap().as_slice(), &[vec![9, 9, 9]]);
}

#[test]
fn published_message_reaches_subscriber_next_tick() {
    let mut core = ScriptedCore::new();
    core.script_tick(vec![
        EntityEvent::Agent {
            id: EntityId::from_u128(31),
            pos: GridPos::new(0, 0, 0),
        },
        EntityEvent::Agent {
            id: EntityId::from_u128(32),
            pos: GridPos::new(0, 0, 0),
        },
    ]);
    let publisher = ScriptedAgent::new().publishing("ping", vec![b"hello".to_vec()]);
    let subscriber = ScriptedAgent::new().subscribing("ping");
    let received = subscriber.received_log();
    let factory = Arc::new(QueueAgentFactory::new(vec![
        Box::new(publisher),
        Box::new(subscriber),
    ]));
    let mut engine = Engine::new(Box::new(core), factory, config()).unwrap();
    engine.init(Dims::new(1, 1, 1));

    // Tick 1 spawns both agents. Tick 2: the publisher publishes and
    // the message is routed at end of tick. Tick 3: the subscriber
    // pops it.
    run_one_tick(&mut engine);
    run_one_tick(&mut engine);
    assert!(received.lock().unwrap().is_empty());

    run_one_tick(&mut engine);
    assert_eq!(received.lock().unwrap().as_slice(), &[b"hello".to_vec()]);
}

#[test]
fn core_fault_drops_the_tick_but_not_the_engine() {
    let core = SlowCore::new(Duration::from_millis(50), 1);
    let cfg = EngineConfig {
        call_budget: Duration::from_millis(5),
        ..config()
    };
    let mut engine = Engine::new(Box::new(core), Arc::new(NullAgentFactory), cfg).unwrap();
    engine.init(Dims::new(1, 1, 1));

    // First tick blows the budget; no update is published.
    run_one_tick(&mut engine);
    assert!(engine.drain_update().is_none());

    // The engine recovers on the next tick.
    run_one_tick(&mut engine);
    assert!(engine.drain_update().is_some());
}

#[test]
fn overlapping_tick_requests_are_rejected() {
    let core = SlowCore::new(Duration::from_millis(200), 1);
    let mut engine =
        Engine::new(Box::new(core), Arc::new(NullAgentFactory), config()).unwrap();
    engine.init(Dims::new(1, 1, 1));

    assert!(engine.request_tick());
    // The first tick stalls in the core for 200ms; a second request
    // during that window bounces instead of queueing.
    assert!(!engine.request_tick());

    engine.wait_idle();
    assert!(engine.request_tick());
    engine.wait_idle();
}

#[test]
fn consumer_lag_keeps_only_the_newest_update() {
    let mut core = ScriptedCore::new();
    core.script_tick(vec![EntityEvent::Deposit {
        id: EntityId::from_u128(41),
        pos: GridPos::new(0, 0, 0),
        quantity: 1,
    }]);
    let mut engine =
        Engine::new(Box::new(core), Arc::new(NullAgentFactory), config()).unwrap();
    engine.init(Dims::new(1, 1, 1));

    // Two ticks without a drain in between; the stale update is
    // displaced by the fresh one.
    run_one_tick(&mut engine);
    run_one_tick(&mut engine);
    let update = engine.drain_update().unwrap();
    assert_eq!(update.entities.len(), 1);
    assert!(engine.drain_update().is_none());
}

#[test]
fn import_restores_the_entity_population() {
    let id = EntityId::from_u128(51);
    let mut core = ScriptedCore::new();
    core.export_payload = vec![5; 8];
    core.script_tick(vec![EntityEvent::Deposit {
        id,
        pos: GridPos::new(3, 3, 3),
        quantity: 7,
    }]);
    let mut engine =
        Engine::new(Box::new(core), Arc::new(NullAgentFactory), config()).unwrap();
    engine.init(Dims::new(2, 2, 2));
    run_one_tick(&mut engine);
    let saved = engine.export().unwrap();

    engine.import(&saved).unwrap();
    let entities = engine.entities();
    assert_eq!(entities.len(), 1);
    assert_eq!(entities[0].id, id);
}

#[test]
fn shutdown_is_idempotent_and_final() {
    let mut engine = Engine::new(
        Box::new(ScriptedCore::new()),
        Arc::new(NullAgentFactory),
        config(),
    )
    .unwrap();
    engine.init(Dims::new(1, 1, 1));
    run_one_tick(&mut engine);

    engine.shutdown();
    engine.shutdown();
    assert!(!engine.request_tick());
}
