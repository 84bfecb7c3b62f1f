//! One full simulation tick, from snapshot to published update.
//!
//! A tick runs entirely on the scheduler thread:
//!
//! 1. snapshot: export the censored world view under the engine lock,
//! 2. agents: scatter the snapshot across the worker pool (commands
//!    flow into the core as each agent finishes),
//! 3. advance: run the core's own tick and fold its events in,
//! 4. route: one pubsub pass over the post-tick agent population,
//! 5. publish: hand the consumer a fresh update, displacing any stale
//!    one it never collected.
//!
//! A core fault in any phase abandons the tick; the consumer simply
//! sees no new update.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::agents::{AgentUnit, AgentWorkPool};
use crate::engine::TickUpdate;
use crate::pubsub::PubSubRouter;
use crate::state::EngineState;

pub(crate) fn run_tick(
    shared: &Arc<Mutex<EngineState>>,
    pool: &AgentWorkPool,
    router: &mut PubSubRouter,
    update_tx: &Sender<TickUpdate>,
    update_rx: &Receiver<TickUpdate>,
) {
    // Phase 1: snapshot.
    let units = {
        let mut state = shared.lock().unwrap();
        let snapshot: Arc<[u8]> = match state.bridge.export_censored() {
            Ok(payload) => Arc::from(payload),
            Err(fault) => {
                log::warn!(target: "lode::tick", "snapshot export failed: {fault}");
                return;
            }
        };
        state
            .registry
            .agents()
            .into_iter()
            .map(|(id, exec)| AgentUnit {
                id,
                exec,
                snapshot: Arc::clone(&snapshot),
            })
            .collect::<Vec<_>>()
    };

    // Phase 2: agent computation, lock released. Workers take the
    // engine lock briefly per command.
    pool.run_wave(units, shared);

    // Phase 3: advance the core and build the update.
    let update = {
        let mut state = shared.lock().unwrap();
        let events = match state.bridge.tick() {
            Ok(events) => events,
            Err(fault) => {
                log::warn!(target: "lode::tick", "core tick failed: {fault}");
                return;
            }
        };
        state.apply_events(events);
        let export = match state.bridge.export() {
            Ok(payload) => payload,
            Err(fault) => {
                log::warn!(target: "lode::tick", "world export failed: {fault}");
                return;
            }
        };
        TickUpdate {
            entities: state.registry.snapshot(),
            export,
            rebuilt: Vec::new(),
        }
    };

    // Phase 4: route messages between the agents that survived the
    // tick. Agents spawned this tick participate too, with whatever
    // their init subscribed to.
    let agents = shared.lock().unwrap().registry.agents();
    router.route(&agents);

    // Phase 5: publish. The slot holds one update; a consumer that
    // fell behind gets the newest state, not a backlog.
    if let Err(TrySendError::Full(update)) = update_tx.try_send(update) {
        let _ = update_rx.try_recv();
        if update_tx.try_send(update).is_err() {
            log::warn!(target: "lode::tick", "update slot contended, tick result dropped");
        }
    }
}
