//! Per-agent pubsub channel state.
//!
//! Each agent owns its own table of named channels. A channel holds
//! two bounded 64-slot buffers (outbound messages published this tick
//! and inbound messages delivered by the router) plus flag bits
//! recording whether the holder may publish and/or subscribe. The
//! cross-agent correlation of channels sharing a name is the router's
//! job (`lode-engine`); this module only models one agent's view.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::error::ChannelError;

/// Capacity of each channel buffer, in messages.
pub const CHANNEL_CAPACITY: usize = 64;

// ── ChannelFlags ─────────────────────────────────────────────────

/// Publish/subscribe capability bits for one channel.
///
/// Bit layout matches the agent ABI's `create_channel` flag word:
/// bit 0 = publish, bit 1 = subscribe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelFlags(u8);

impl ChannelFlags {
    const PUBLISH: u8 = 1;
    const SUBSCRIBE: u8 = 2;

    /// Construct flags from capabilities.
    pub const fn new(publish: bool, subscribe: bool) -> Self {
        let mut bits = 0;
        if publish {
            bits |= Self::PUBLISH;
        }
        if subscribe {
            bits |= Self::SUBSCRIBE;
        }
        Self(bits)
    }

    /// Construct flags from the raw ABI flag word. Unknown bits are
    /// ignored.
    pub const fn from_bits(bits: u32) -> Self {
        Self((bits as u8) & (Self::PUBLISH | Self::SUBSCRIBE))
    }

    /// The raw ABI flag word.
    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    /// Whether the holder may publish.
    pub const fn publish(self) -> bool {
        self.0 & Self::PUBLISH != 0
    }

    /// Whether the holder may subscribe.
    pub const fn subscribe(self) -> bool {
        self.0 & Self::SUBSCRIBE != 0
    }

    /// Union with another flag set. Re-creating a channel with new
    /// flags widens the capabilities of the existing one.
    pub fn merge(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

// ── ChannelState ─────────────────────────────────────────────────

/// One agent's view of a named channel.
#[derive(Clone, Debug)]
pub struct ChannelState {
    name: Arc<str>,
    flags: ChannelFlags,
    outbound: VecDeque<Vec<u8>>,
    inbound: VecDeque<Vec<u8>>,
}

impl ChannelState {
    fn new(name: Arc<str>, flags: ChannelFlags) -> Self {
        Self {
            name,
            flags,
            outbound: VecDeque::with_capacity(CHANNEL_CAPACITY),
            inbound: VecDeque::with_capacity(CHANNEL_CAPACITY),
        }
    }

    /// The channel's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared handle to the channel's name, for keying across agents.
    pub fn name_shared(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// The channel's capability flags.
    pub fn flags(&self) -> ChannelFlags {
        self.flags
    }

    /// Queue an outbound message. When the buffer is already at
    /// capacity the oldest pending message is discarded to make room,
    /// so at most [`CHANNEL_CAPACITY`] messages are ever pending.
    pub fn push_outbound(&mut self, msg: Vec<u8>) {
        if self.outbound.len() == CHANNEL_CAPACITY {
            self.outbound.pop_front();
        }
        self.outbound.push_back(msg);
    }

    /// Take the next unsent outbound message, oldest first.
    pub fn pop_outbound(&mut self) -> Option<Vec<u8>> {
        self.outbound.pop_front()
    }

    /// Number of pending outbound messages.
    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Discard all pending outbound messages. Undelivered messages do
    /// not survive the routing pass that consumed them.
    pub fn clear_outbound(&mut self) {
        self.outbound.clear();
    }

    /// Deliver a message to the inbound buffer. Returns `false`
    /// (dropping the message) if the buffer is full.
    pub fn push_inbound(&mut self, msg: Vec<u8>) -> bool {
        if self.inbound.len() == CHANNEL_CAPACITY {
            return false;
        }
        self.inbound.push_back(msg);
        true
    }

    /// Take the next delivered message, oldest first.
    pub fn pop_inbound(&mut self) -> Option<Vec<u8>> {
        self.inbound.pop_front()
    }

    /// Number of delivered, not-yet-consumed messages.
    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Free inbound capacity.
    pub fn inbound_free(&self) -> usize {
        CHANNEL_CAPACITY - self.inbound.len()
    }
}

// ── ChannelSet ───────────────────────────────────────────────────

/// One agent's channel table.
///
/// Channels are created on first reference and live as long as the
/// agent. Indices are dense and stable: the ABI hands the agent the
/// index returned by `create`, and the agent uses it for all later
/// operations.
///
/// ```
/// use lode_core::{ChannelFlags, ChannelSet};
///
/// let mut set = ChannelSet::new();
/// let idx = set.create("ore", ChannelFlags::new(true, false));
/// set.publish(idx, b"found".to_vec()).unwrap();
///
/// // Re-creating the same name merges flags and reuses the slot.
/// let again = set.create("ore", ChannelFlags::new(false, true));
/// assert_eq!(idx, again);
/// assert!(set.get(idx).unwrap().flags().subscribe());
/// ```
#[derive(Debug, Default)]
pub struct ChannelSet {
    channels: Vec<ChannelState>,
    by_name: HashMap<Arc<str>, usize>,
}

impl ChannelSet {
    /// Create an empty channel table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels created so far.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channels have been created.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Create a channel named `name`, or widen the flags of the
    /// existing channel with that name. Returns the channel index.
    pub fn create(&mut self, name: &str, flags: ChannelFlags) -> usize {
        if let Some(&idx) = self.by_name.get(name) {
            self.channels[idx].flags.merge(flags);
            return idx;
        }
        let name: Arc<str> = Arc::from(name);
        let idx = self.channels.len();
        self.channels.push(ChannelState::new(Arc::clone(&name), flags));
        self.by_name.insert(name, idx);
        idx
    }

    /// Look up a channel by index.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::IndexOutOfRange`] for an index the
    /// agent never created.
    pub fn get(&self, index: usize) -> Result<&ChannelState, ChannelError> {
        self.channels.get(index).ok_or(ChannelError::IndexOutOfRange {
            index,
            count: self.channels.len(),
        })
    }

    /// Look up a channel by index, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::IndexOutOfRange`] for an index the
    /// agent never created.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut ChannelState, ChannelError> {
        let count = self.channels.len();
        self.channels
            .get_mut(index)
            .ok_or(ChannelError::IndexOutOfRange { index, count })
    }

    /// Queue `msg` on channel `index` for the router's next pass.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::IndexOutOfRange`] for an unknown index
    /// and [`ChannelError::NotPublishable`] if the channel lacks the
    /// publish flag.
    pub fn publish(&mut self, index: usize, msg: Vec<u8>) -> Result<(), ChannelError> {
        let channel = self.get_mut(index)?;
        if !channel.flags.publish() {
            return Err(ChannelError::NotPublishable { index });
        }
        channel.push_outbound(msg);
        Ok(())
    }

    /// Whether channel `index` has a delivered message waiting.
    ///
    /// Always `false` for a channel without the subscribe flag,
    /// mirroring the agent ABI (a non-subscriber never observes
    /// messages).
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::IndexOutOfRange`] for an unknown index.
    pub fn has_message(&self, index: usize) -> Result<bool, ChannelError> {
        let channel = self.get(index)?;
        Ok(channel.flags.subscribe() && channel.inbound_len() > 0)
    }

    /// Take the next delivered message on channel `index`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::IndexOutOfRange`] for an unknown index.
    pub fn pop_message(&mut self, index: usize) -> Result<Option<Vec<u8>>, ChannelError> {
        let channel = self.get_mut(index)?;
        if !channel.flags.subscribe() {
            return Ok(None);
        }
        Ok(channel.pop_inbound())
    }

    /// Iterate all channels in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &ChannelState> {
        self.channels.iter()
    }

    /// Iterate all channels mutably, in creation order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelState> {
        self.channels.iter_mut()
    }
}
