//! Named-topic message routing between agents.
//!
//! Routing runs once per tick, after every agent has computed. Topics
//! exist implicitly: any agent that declared a channel with a given
//! name participates in that name's topic, publishers on one side and
//! subscribers on the other. Each pass assembles a bounded output
//! sequence by drawing fairly across publishers with pending traffic,
//! then fans that sequence out to every subscriber. Whatever did not
//! fit in the pass is dropped; topic state is rebuilt from scratch
//! every tick.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use smallvec::SmallVec;

use lode_core::{AgentHandle, AgentInstance, EntityId, CHANNEL_CAPACITY};

// Participant address: (index into the locked guard list, channel
// index within that agent's channel table).
type Endpoint = (usize, usize);

#[derive(Default)]
struct TopicUse {
    publishers: SmallVec<[Endpoint; 4]>,
    subscribers: SmallVec<[Endpoint; 4]>,
}

/// Per-tick message router.
///
/// Owns the draw RNG so that identical agent populations with
/// identical traffic route identically under the same seed.
pub struct PubSubRouter {
    rng: ChaCha8Rng,
}

impl PubSubRouter {
    /// Router with a seeded draw sequence.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Run one routing pass over the given agents.
    ///
    /// Locks every agent instance for the duration of the pass; no
    /// agent computation runs concurrently with routing.
    pub fn route(&mut self, agents: &[(EntityId, AgentHandle)]) {
        let mut guards: Vec<_> = agents.iter().map(|(_, handle)| handle.lock()).collect();

        // Group endpoints by topic name. BTreeMap keeps topic
        // iteration order independent of agent hash state.
        let mut topics: BTreeMap<Arc<str>, TopicUse> = BTreeMap::new();
        for (agent_idx, guard) in guards.iter().enumerate() {
            for (chan_idx, channel) in guard.channels.iter().enumerate() {
                let entry = topics.entry(channel.name_shared()).or_default();
                if channel.flags().publish() && channel.outbound_len() > 0 {
                    entry.publishers.push((agent_idx, chan_idx));
                }
                if channel.flags().subscribe() {
                    entry.subscribers.push((agent_idx, chan_idx));
                }
            }
        }

        for (_, topic) in topics {
            if !topic.subscribers.is_empty() {
                self.route_topic(&mut guards, &topic);
            }
        }

        // Undelivered outbound traffic does not carry over.
        for guard in guards.iter_mut() {
            for channel in guard.channels.iter_mut() {
                channel.clear_outbound();
            }
        }
    }

    fn route_topic(
        &mut self,
        guards: &mut [std::sync::MutexGuard<'_, AgentInstance>],
        topic: &TopicUse,
    ) {
        // Build the topic's output sequence: draw one message at a
        // time from a random publisher that still has traffic, up to
        // the buffer capacity. Per-publisher order is preserved;
        // interleaving across publishers is the RNG's business.
        let mut eligible: Vec<Endpoint> = topic.publishers.to_vec();
        let mut output: Vec<Vec<u8>> = Vec::new();
        while output.len() < CHANNEL_CAPACITY && !eligible.is_empty() {
            let pick = self.rng.random_range(0..eligible.len());
            let (agent_idx, chan_idx) = eligible[pick];
            // Endpoints were indexed during grouping over these same
            // guards, so the lookup always hits.
            match guards[agent_idx]
                .channels
                .get_mut(chan_idx)
                .ok()
                .and_then(|channel| channel.pop_outbound())
            {
                Some(msg) => output.push(msg),
                None => {
                    eligible.swap_remove(pick);
                }
            }
        }

        // Fan the sequence out. A subscriber that runs out of inbound
        // space stops receiving for this pass.
        for &(agent_idx, chan_idx) in &topic.subscribers {
            let Ok(channel) = guards[agent_idx].channels.get_mut(chan_idx) else {
                continue;
            };
            for msg in &output {
                if !channel.push_inbound(msg.clone()) {
                    break;
                }
            }
        }
    }
}
