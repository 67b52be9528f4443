//! Stream payload types exchanged with the queue manager and TX engine.

/// A transmit request handed to the downstream TX engine.
///
/// The request carries metadata only: the queue to fetch from, a routing
/// hint for the egress mux, and a tag echoed back on every status event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRequest {
    /// Queue to fetch a descriptor from.
    pub queue: u32,
    /// Destination hint (the selected channel's dest register).
    pub dest: u16,
    /// Queue generation at issue time; stale completions carry an old tag.
    pub tag: u8,
}

/// Dequeue status from the queue manager: outcome of the descriptor fetch.
#[derive(Debug, Clone, Copy)]
pub struct DequeueStatus {
    pub queue: u32,
    pub tag: u8,
    /// Queue had no descriptors.
    pub empty: bool,
    /// Fetch faulted.
    pub error: bool,
}

/// Start status from the TX engine: payload fetch began.
#[derive(Debug, Clone, Copy)]
pub struct StartStatus {
    pub queue: u32,
    pub tag: u8,
    /// Frame length in bytes.
    pub len: u32,
    /// Fetch faulted before any bytes moved.
    pub error: bool,
}

/// Finish status from the TX engine: frame fully handed to the MAC.
#[derive(Debug, Clone, Copy)]
pub struct FinishStatus {
    pub queue: u32,
    pub tag: u8,
    /// Frame length in bytes.
    pub len: u32,
}

/// Out-of-band control stream item: pause or release a queue without a
/// register access. Driven by external controllers such as the TDMA gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedCtrl {
    pub queue: u32,
    /// `false` pauses the queue, `true` releases it.
    pub enable: bool,
}

/// Completion kinds folded into the arbiter's completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompletionKind {
    /// Dequeue returned no descriptor.
    DequeueEmpty,
    /// Dequeue faulted.
    DequeueError,
    /// Start reported an error before any bytes moved.
    FetchError,
    /// Frame fully transmitted.
    Finish { len: u32 },
}

impl CompletionKind {
    /// True for outcomes that put no bytes on the wire.
    pub(crate) fn is_failure(self) -> bool {
        !matches!(self, CompletionKind::Finish { .. })
    }
}

/// One entry in the completion FIFO awaiting a pipeline pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Completion {
    pub queue: u32,
    pub tag: u8,
    pub kind: CompletionKind,
}
