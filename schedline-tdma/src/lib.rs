//! schedline-tdma — TDMA overlay for the schedline TX scheduler.
//!
//! Three blocks built around a time-of-day feed:
//!
//! - [`TimeslotGate`]: derives the repeating timeslot schedule (index,
//!   start/end edges, active level) and tracks lock/error state across
//!   clock steps.
//! - [`TdmaCtrl`]: binds scheduler queues to per-timeslot enable masks
//!   and drives the scheduler's out-of-band control stream.
//! - [`TdmaBer`]: bit-error-rate accounting gated to timeslot boundaries,
//!   for link measurement under TDMA operation.
//!
//! The gate can also drive a scheduler's global enable directly:
//!
//! ```rust
//! use schedline::{ConfigBuilder, TxScheduler};
//! use schedline_tdma::{TimeslotGate, TodTime, timeslot};
//!
//! let mut sched = TxScheduler::new(ConfigBuilder::new().build().unwrap()).unwrap();
//! let mut gate = TimeslotGate::new(6).unwrap();
//! gate.ctrl_write(timeslot::REG_SCH_START_SEC_H, 0).unwrap();
//! gate.ctrl_write(timeslot::REG_SCH_PERIOD_NS, 1_000_000).unwrap();
//! gate.ctrl_write(timeslot::REG_TS_PERIOD_NS, 100_000).unwrap();
//! gate.ctrl_write(timeslot::REG_ACTIVE_PERIOD_NS, 90_000).unwrap();
//! gate.ctrl_write(timeslot::REG_CTRL, timeslot::CTRL_ENABLE).unwrap();
//!
//! gate.advance(TodTime::from_nanos(0), false);
//! sched.set_gate(gate.timeslot_active());
//! sched.step();
//! ```

pub mod ber;
pub mod ctrl;
pub mod error;
pub mod time;
pub mod timeslot;

/// Errors returned by the TDMA overlay blocks.
pub use error::Error;
/// BER measurement controller.
pub use ber::TdmaBer;
/// Scheduler control block (per-channel timeslot masks).
pub use ctrl::TdmaCtrl;
/// Time-of-day feed sample.
pub use time::TodTime;
/// Edge outputs of one gate tick.
pub use timeslot::TickEvents;
/// The timeslot engine.
pub use timeslot::TimeslotGate;
