//! Scheduler core metrics.
//!
//! Counters for request issue, completion handling, and input drops,
//! aggregated across all scheduler instances in the process.

use metriken::{Counter, Gauge, metric};

// ── Requests ─────────────────────────────────────────────────────

#[metric(
    name = "schedline/requests/emitted",
    description = "TX requests emitted downstream"
)]
pub static REQUESTS_EMITTED: Counter = Counter::new();

#[metric(
    name = "schedline/requests/sched_fail",
    description = "Admitted requests dropped at commit because the queue was no longer eligible"
)]
pub static REQUESTS_SCHED_FAIL: Counter = Counter::new();

// ── Doorbells ────────────────────────────────────────────────────

#[metric(
    name = "schedline/doorbells/processed",
    description = "Doorbell events committed"
)]
pub static DOORBELLS_PROCESSED: Counter = Counter::new();

#[metric(
    name = "schedline/doorbells/rejected",
    description = "Doorbell pushes rejected with a full FIFO"
)]
pub static DOORBELLS_REJECTED: Counter = Counter::new();

// ── Completions ──────────────────────────────────────────────────

#[metric(
    name = "schedline/completions/processed",
    description = "Completion events committed"
)]
pub static COMPLETIONS_PROCESSED: Counter = Counter::new();

#[metric(
    name = "schedline/completions/stale",
    description = "Completions whose tag did not match the queue generation"
)]
pub static COMPLETIONS_STALE: Counter = Counter::new();

#[metric(
    name = "schedline/completions/spurious",
    description = "Completions for queues with no in-flight operation"
)]
pub static COMPLETIONS_SPURIOUS: Counter = Counter::new();

// ── Register surface ─────────────────────────────────────────────

#[metric(
    name = "schedline/commands/invalid",
    description = "Queue command writes with an unknown opcode (dropped)"
)]
pub static COMMANDS_INVALID: Counter = Counter::new();

// ── Occupancy ────────────────────────────────────────────────────

#[metric(
    name = "schedline/queues/scheduled",
    description = "Queues currently scheduled (present in the ready ring or in flight through the pipeline)"
)]
pub static QUEUES_SCHEDULED: Gauge = Gauge::new();
