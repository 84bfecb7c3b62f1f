//! Single-slot transfer buffer between the engine and the core.
//!
//! All payload exchange with the simulation core flows through one
//! slot: the producer stages a payload with [`put`](ByteChannel::put),
//! the consumer claims it with [`take`](ByteChannel::take). There is
//! no queue; the protocol requires every producer/consumer pair to
//! read before the next write within one serialized call sequence, so
//! a single slot suffices. The channel itself does no locking; it
//! lives inside the engine's lock-protected state, so every access is
//! already serialized.

use lode_core::ModuleFault;

/// Default slot capacity: 1 MiB.
pub const DEFAULT_CAPACITY: usize = 1 << 20;

/// The single-slot byte transfer channel.
#[derive(Debug)]
pub struct ByteChannel {
    slot: Option<Vec<u8>>,
    capacity: usize,
}

impl ByteChannel {
    /// Create an empty channel whose consumer-side reads are bounded
    /// by `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            slot: None,
            capacity,
        }
    }

    /// The consumer-side read bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stage `payload`, replacing any previous value unconditionally.
    ///
    /// An unread previous payload is lost; under the call protocol
    /// that only happens when a module violated consume-then-clear
    /// sequencing, and the bridge clears the slot between calls to
    /// keep such a violation from leaking across call boundaries.
    pub fn put(&mut self, payload: Vec<u8>) {
        self.slot = Some(payload);
    }

    /// Claim the staged payload, clearing the slot.
    ///
    /// An empty slot reads as a zero-length payload.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleFault::BufferTooSmall`] if the payload exceeds
    /// `max_len`. The payload is left in place so the failure can be
    /// diagnosed without re-running the producer; the enclosing call
    /// must unwind.
    pub fn take(&mut self, max_len: usize) -> Result<Vec<u8>, ModuleFault> {
        match &self.slot {
            None => Ok(Vec::new()),
            Some(payload) if payload.len() > max_len => Err(ModuleFault::BufferTooSmall {
                len: payload.len(),
                max_len,
            }),
            Some(_) => Ok(self.slot.take().unwrap_or_default()),
        }
    }

    /// Length of the staged payload, if any.
    pub fn pending_len(&self) -> Option<usize> {
        self.slot.as_ref().map(Vec::len)
    }

    /// Discard any staged payload.
    pub fn clear(&mut self) {
        self.slot = None;
    }
}

impl Default for ByteChannel {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_slot() {
        let mut chan = ByteChannel::default();
        chan.put(vec![1, 2, 3]);
        assert_eq!(chan.take(16).unwrap(), vec![1, 2, 3]);
        assert_eq!(chan.pending_len(), None);
        assert_eq!(chan.take(16).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn put_replaces_unconditionally() {
        let mut chan = ByteChannel::default();
        chan.put(vec![1]);
        chan.put(vec![2, 3]);
        assert_eq!(chan.take(16).unwrap(), vec![2, 3]);
    }

    #[test]
    fn oversized_payload_is_preserved() {
        let mut chan = ByteChannel::default();
        chan.put(vec![0; 10]);
        assert_eq!(
            chan.take(4),
            Err(ModuleFault::BufferTooSmall {
                len: 10,
                max_len: 4
            })
        );
        // Nothing was handed to the consumer and the payload is intact.
        assert_eq!(chan.pending_len(), Some(10));
        assert_eq!(chan.take(10).unwrap().len(), 10);
    }

    #[test]
    fn empty_slot_reads_as_zero_length() {
        let mut chan = ByteChannel::default();
        assert_eq!(chan.take(0).unwrap(), Vec::<u8>::new());
    }
}
