//! Error types for the Lode simulation engine.
//!
//! Organized by subsystem: module calls (core and agent executables),
//! agent channel operations, and engine configuration. Each enum
//! hand-implements `Display` and `Error`.

use std::error::Error;
use std::fmt;
use std::time::Duration;

// ── ModuleFault ──────────────────────────────────────────────────

/// Fatal failure of a single core or agent module call.
///
/// A fault abandons the enclosing call (and any remaining work the
/// current tick had queued for it) but never crashes the engine; the
/// next tick request starts fresh. There is no automatic retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleFault {
    /// The consumer's buffer is smaller than the pending payload.
    /// The payload is left in place; the module is signaled and the
    /// call unwinds.
    BufferTooSmall {
        /// Length of the pending payload.
        len: usize,
        /// Maximum length the consumer could accept.
        max_len: usize,
    },
    /// The call exceeded its execution budget.
    Timeout {
        /// The budget that was exceeded.
        budget: Duration,
    },
    /// The module reported an internal failure.
    Failed {
        /// Human-readable description from the module.
        reason: String,
    },
}

impl fmt::Display for ModuleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferTooSmall { len, max_len } => {
                write!(f, "payload of {len} bytes exceeds consumer buffer of {max_len} bytes")
            }
            Self::Timeout { budget } => {
                write!(f, "module call exceeded its {budget:?} execution budget")
            }
            Self::Failed { reason } => write!(f, "module call failed: {reason}"),
        }
    }
}

impl Error for ModuleFault {}

// ── ChannelError ─────────────────────────────────────────────────

/// Misuse of the per-agent channel table.
///
/// Reported to the offending agent's logging surface and otherwise
/// absorbed; channel misuse never escalates past the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// The agent referenced a channel index it never created.
    IndexOutOfRange {
        /// The index the agent passed.
        index: usize,
        /// Number of channels the agent has created.
        count: usize,
    },
    /// The channel was not created with the publish flag.
    NotPublishable {
        /// The channel index.
        index: usize,
    },
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IndexOutOfRange { index, count } => {
                write!(f, "channel index {index} out of range ({count} channels exist)")
            }
            Self::NotPublishable { index } => {
                write!(f, "channel {index} was not created with the publish flag")
            }
        }
    }
}

impl Error for ChannelError {}

// ── ConfigError ──────────────────────────────────────────────────

/// Invalid engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `worker_count` was explicitly set to zero.
    ZeroWorkerCount,
    /// The module call budget is zero.
    ZeroCallBudget,
    /// The transfer buffer capacity is zero.
    ZeroBufferCapacity,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroWorkerCount => write!(f, "worker_count must be at least 1"),
            Self::ZeroCallBudget => write!(f, "call_budget must be non-zero"),
            Self::ZeroBufferCapacity => write!(f, "buffer_capacity must be non-zero"),
        }
    }
}

impl Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        let fault = ModuleFault::BufferTooSmall { len: 10, max_len: 4 };
        assert_eq!(
            fault.to_string(),
            "payload of 10 bytes exceeds consumer buffer of 4 bytes"
        );

        let err = ChannelError::IndexOutOfRange { index: 3, count: 1 };
        assert_eq!(err.to_string(), "channel index 3 out of range (1 channels exist)");
    }
}
