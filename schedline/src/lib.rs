//! schedline — cycle-stepped NIC transmit scheduler core.
//!
//! schedline reimplements the TX arbitration plane of a multi-queue NIC as
//! a deterministic, single-threaded state machine. Up to 2^Q transmit
//! queues compete for fetch slots across a set of (port, traffic-class)
//! channels; per-channel flow-control credits bound the packets and bytes
//! in flight, and a fixed-depth pipeline serializes every state change.
//!
//! # Quick start
//!
//! ```rust
//! use schedline::{ConfigBuilder, TxScheduler, regs};
//!
//! let config = ConfigBuilder::new()
//!     .queue_index_bits(4)
//!     .pipeline(2)
//!     .build()
//!     .unwrap();
//! let mut sched = TxScheduler::new(config).unwrap();
//!
//! // Bring up channel 0 and queue 3, then ring its doorbell.
//! sched.channel_enable(0).unwrap();
//! sched.enable();
//! sched
//!     .queue_write_sync(3, regs::CMD_SET_PORT_ENABLE | 1)
//!     .unwrap();
//! sched
//!     .queue_write_sync(3, regs::CMD_SET_QUEUE_ENABLE | 1)
//!     .unwrap();
//! sched.push_doorbell(3).unwrap();
//!
//! // Step the pipeline until the request appears.
//! let req = loop {
//!     sched.step();
//!     if let Some(req) = sched.poll_tx_request() {
//!         break req;
//!     }
//! };
//! assert_eq!(req.queue, 3);
//! ```
//!
//! The scheduler never touches payload bytes: requests carry queue
//! indexes, routing hints, and tags, and the downstream queue manager and
//! TX engine report outcomes back through three status streams.

pub(crate) mod event;
pub(crate) mod flow_control;
pub(crate) mod metrics;
pub(crate) mod op_table;
pub(crate) mod ready_ring;

pub mod config;
pub mod error;
pub mod queue;
pub mod regs;
pub mod sched;

/// Scheduler configuration.
pub use config::Config;
/// Builder for [`Config`].
pub use config::ConfigBuilder;
/// Errors returned by the scheduler core.
pub use error::Error;
/// Dequeue outcome from the queue manager.
pub use event::DequeueStatus;
/// Finish status from the TX engine.
pub use event::FinishStatus;
/// Out-of-band queue pause/release item.
pub use event::SchedCtrl;
/// Start status from the TX engine.
pub use event::StartStatus;
/// Emitted transmit request.
pub use event::TxRequest;
/// Per-queue state record.
pub use queue::QueueRecord;
/// The scheduler core.
pub use sched::TxScheduler;
