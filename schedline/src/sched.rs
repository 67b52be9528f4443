//! The arbiter pipeline: a cycle-stepped, fixed-depth pipeline that
//! serializes every queue-state mutation.
//!
//! Each call to [`TxScheduler::step`] advances one cycle: the oldest stage
//! commits, the remaining stages shift, and the admit stage selects the
//! highest-priority event source whose backpressure is clear. Commits are
//! applied in admit order, so a commit-time read of the queue store always
//! observes every older in-flight write.
//!
//! Event priority at admit (highest first): init walk, register write,
//! register read, doorbell, completion, control stream, transmit request.
//! The request source is self-sustaining (each emitted request re-enters
//! the ready ring), so it runs only when nothing else is pending.

use std::collections::VecDeque;

use crate::config::Config;
use crate::error::Error;
use crate::event::{
    Completion, CompletionKind, DequeueStatus, FinishStatus, SchedCtrl, StartStatus, TxRequest,
};
use crate::flow_control::FlowControl;
use crate::metrics;
use crate::op_table::OpTable;
use crate::queue::{QueueRecord, QueueStore};
use crate::ready_ring::ReadyRing;

/// TX request output depth (one live slot plus one skid entry).
const TX_OUT_DEPTH: usize = 2;

#[derive(Debug, Clone, Copy)]
enum StagePayload {
    /// Init walk pass: zero the record.
    Init,
    /// Posted queue-command write.
    Write { value: u32 },
    /// Posted queue-status read.
    Read,
    /// Doorbell: descriptors became available.
    Doorbell,
    /// Status return closing an in-flight operation.
    Complete { tag: u8, kind: CompletionKind },
    /// Out-of-band pause/release.
    Ctrl { enable: bool },
    /// Transmit request. `op`/`channel`/`port` are the admit-stage
    /// reservation; `op` is `None` when the pass only drains an
    /// ineligible queue out of the ready ring.
    Request {
        op: Option<u16>,
        channel: u16,
        port: u8,
    },
}

#[derive(Debug, Clone, Copy)]
struct Stage {
    queue: u32,
    payload: StagePayload,
}

/// The TX scheduler core.
///
/// Owns the queue state store, ready ring, flow-control accountant, and
/// operation table; all four are mutated only from the pipeline's commit
/// stage. Inputs are bounded FIFOs fed by the caller; outputs are pulled
/// with [`poll_tx_request`](Self::poll_tx_request) and
/// [`take_queue_read_data`](Self::take_queue_read_data).
pub struct TxScheduler {
    config: Config,
    queues: QueueStore,
    ring: ReadyRing,
    pub(crate) fc: FlowControl,
    ops: OpTable,

    doorbells: VecDeque<u32>,
    ctrl_in: VecDeque<SchedCtrl>,
    completions: VecDeque<Completion>,
    starts: VecDeque<StartStatus>,

    pending_write: Option<(u32, u32)>,
    pending_read: Option<u32>,
    read_data: Option<u32>,

    /// Stage latches between admit and commit; front = newest.
    stages: VecDeque<Option<Stage>>,

    init_index: u32,
    init_done: bool,

    tx_out: VecDeque<TxRequest>,

    pub(crate) enabled: bool,
    gate: bool,
    scheduled_count: u32,
    cycle: u64,
}

impl TxScheduler {
    /// Create a scheduler. The first `queue_count` cycles perform the init
    /// walk; other events queue up behind it.
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        let queue_count = config.queue_count();
        let fc = FlowControl::new(
            config.channel_count(),
            config.fc_scale_bits,
            config.req_dest_default,
            config.max_tx_size,
        );
        let mut stages = VecDeque::with_capacity(config.pipeline - 1);
        for _ in 0..config.pipeline - 1 {
            stages.push_back(None);
        }
        Ok(Self {
            queues: QueueStore::new(queue_count),
            ring: ReadyRing::new(queue_count),
            fc,
            ops: OpTable::new(config.op_table_size),
            doorbells: VecDeque::with_capacity(config.doorbell_fifo),
            ctrl_in: VecDeque::with_capacity(config.ctrl_fifo),
            completions: VecDeque::with_capacity(config.op_table_size * 2),
            starts: VecDeque::with_capacity(config.op_table_size),
            pending_write: None,
            pending_read: None,
            read_data: None,
            stages,
            init_index: 0,
            init_done: false,
            // In-pipeline requests may land after the depth check, so the
            // output can briefly hold TX_OUT_DEPTH + pipeline - 2 entries.
            tx_out: VecDeque::with_capacity(TX_OUT_DEPTH + config.pipeline),
            enabled: false,
            gate: true,
            scheduled_count: 0,
            cycle: 0,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cycles stepped so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// External enable input, short-circuited with the register enable.
    /// The TDMA gate drives this in the whole-scheduler gating mode.
    pub fn set_gate(&mut self, gate: bool) {
        self.gate = gate;
    }

    pub fn gate(&self) -> bool {
        self.gate
    }

    /// Register-file enable bit.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Scheduler has queues scheduled or operations in flight. Stays true
    /// after disable until every op slot drains.
    pub fn active(&self) -> bool {
        self.scheduled_count > 0 || self.ops.len() > 0
    }

    /// Number of queues currently scheduled (ready ring plus in-pipeline).
    pub fn scheduled_count(&self) -> u32 {
        self.scheduled_count
    }

    /// Op slots currently held by in-flight requests.
    pub fn ops_in_flight(&self) -> usize {
        self.ops.len()
    }

    /// Committed record for a queue (test and introspection hook; the
    /// register path is [`post_queue_read`](Self::post_queue_read)).
    pub fn queue_record(&self, queue: u32) -> Result<QueueRecord, Error> {
        self.check_queue(queue)?;
        Ok(self.queues.read(queue))
    }

    // ── Inputs ───────────────────────────────────────────────────────

    /// Notify the scheduler that descriptors arrived on `queue`.
    pub fn push_doorbell(&mut self, queue: u32) -> Result<(), Error> {
        self.check_queue(queue)?;
        if self.doorbells.len() >= self.config.doorbell_fifo {
            metrics::DOORBELLS_REJECTED.increment();
            return Err(Error::DoorbellFifoFull);
        }
        self.doorbells.push_back(queue);
        Ok(())
    }

    /// Out-of-band pause/release from an external controller.
    pub fn push_sched_ctrl(&mut self, ctrl: SchedCtrl) -> Result<(), Error> {
        self.check_queue(ctrl.queue)?;
        if self.ctrl_in.len() >= self.config.ctrl_fifo {
            return Err(Error::CtrlFifoFull);
        }
        self.ctrl_in.push_back(ctrl);
        Ok(())
    }

    /// Dequeue status from the queue manager. Success is absorbed;
    /// empty/error outcomes close the operation.
    pub fn push_dequeue_status(&mut self, status: DequeueStatus) -> Result<(), Error> {
        self.check_queue(status.queue)?;
        if !status.empty && !status.error {
            return Ok(());
        }
        let kind = if status.error {
            CompletionKind::DequeueError
        } else {
            CompletionKind::DequeueEmpty
        };
        self.push_completion(Completion {
            queue: status.queue,
            tag: status.tag,
            kind,
        })
    }

    /// Start status from the TX engine. A successful start moves the
    /// flow-control accounting from the fetch window to the tx window; an
    /// error closes the operation.
    pub fn push_start_status(&mut self, status: StartStatus) -> Result<(), Error> {
        self.check_queue(status.queue)?;
        if status.error {
            return self.push_completion(Completion {
                queue: status.queue,
                tag: status.tag,
                kind: CompletionKind::FetchError,
            });
        }
        if self.starts.len() >= self.config.op_table_size {
            return Err(Error::StatusFifoFull);
        }
        self.starts.push_back(status);
        Ok(())
    }

    /// Finish status from the TX engine: the frame left for the MAC.
    pub fn push_finish_status(&mut self, status: FinishStatus) -> Result<(), Error> {
        self.check_queue(status.queue)?;
        self.push_completion(Completion {
            queue: status.queue,
            tag: status.tag,
            kind: CompletionKind::Finish { len: status.len },
        })
    }

    fn push_completion(&mut self, completion: Completion) -> Result<(), Error> {
        if self.completions.len() >= self.config.op_table_size * 2 {
            return Err(Error::StatusFifoFull);
        }
        self.completions.push_back(completion);
        Ok(())
    }

    // ── Outputs ──────────────────────────────────────────────────────

    /// Take the next emitted TX request, if any.
    pub fn poll_tx_request(&mut self) -> Option<TxRequest> {
        self.tx_out.pop_front()
    }

    // ── Queue command register surface ───────────────────────────────

    /// Post a write to a queue's command register. The write takes effect
    /// when its pipeline pass commits.
    pub fn post_queue_write(&mut self, queue: u32, value: u32) -> Result<(), Error> {
        self.check_queue(queue)?;
        if self.pending_write.is_some() {
            return Err(Error::RegisterBusy);
        }
        self.pending_write = Some((queue, value));
        Ok(())
    }

    /// Post a read of a queue's packed status word.
    pub fn post_queue_read(&mut self, queue: u32) -> Result<(), Error> {
        self.check_queue(queue)?;
        if self.pending_read.is_some() || self.read_data.is_some() {
            return Err(Error::RegisterBusy);
        }
        self.pending_read = Some(queue);
        Ok(())
    }

    /// Take the response of a completed queue read.
    pub fn take_queue_read_data(&mut self) -> Option<u32> {
        self.read_data.take()
    }

    /// Post a queue command write and step until it has committed.
    pub fn queue_write_sync(&mut self, queue: u32, value: u32) -> Result<(), Error> {
        self.post_queue_write(queue, value)?;
        let bound = self.sync_bound();
        for _ in 0..bound {
            if self.pending_write.is_none() {
                break;
            }
            self.step();
        }
        debug_assert!(self.pending_write.is_none(), "posted write never admitted");
        for _ in 0..self.config.pipeline {
            self.step();
        }
        Ok(())
    }

    /// Post a queue status read and step until the response is available.
    pub fn queue_read_sync(&mut self, queue: u32) -> Result<u32, Error> {
        self.post_queue_read(queue)?;
        let bound = self.sync_bound();
        for _ in 0..bound {
            if let Some(data) = self.take_queue_read_data() {
                return Ok(data);
            }
            self.step();
        }
        debug_assert!(false, "posted read never completed");
        Err(Error::RegisterBusy)
    }

    fn sync_bound(&self) -> usize {
        // Worst case: the full init walk plus the pipeline drains first.
        self.config.queue_count() + self.config.pipeline + 8
    }

    fn check_queue(&self, queue: u32) -> Result<(), Error> {
        if (queue as usize) < self.config.queue_count() {
            Ok(())
        } else {
            Err(Error::InvalidQueue(queue))
        }
    }

    // ── Cycle stepping ───────────────────────────────────────────────

    /// Advance one pipeline cycle.
    pub fn step(&mut self) {
        self.cycle += 1;
        self.fc.refresh();
        self.drain_starts();
        if let Some(stage) = self.stages.pop_back().flatten() {
            self.commit(stage);
        }
        let admitted = self.admit();
        self.stages.push_front(admitted);
    }

    /// Advance `n` cycles.
    pub fn step_n(&mut self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Apply successful start statuses: move fetch accounting to the tx
    /// window against the oldest not-yet-started op of the queue.
    fn drain_starts(&mut self) {
        while let Some(status) = self.starts.pop_front() {
            let rec = self.queues.read(status.queue);
            let key = rec
                .tail_op
                .and_then(|tail| self.ops.find_oldest(tail, |e| !e.started));
            match key.and_then(|k| self.ops.get_mut(k)) {
                Some(entry) => {
                    entry.started = true;
                    let channel = entry.channel;
                    let credits = self.fc.credits_for(status.len);
                    self.fc.channel_mut(channel).tx_consume(credits);
                }
                None => {
                    metrics::COMPLETIONS_SPURIOUS.increment();
                }
            }
        }
    }

    // ── Admit stage ──────────────────────────────────────────────────

    fn admit(&mut self) -> Option<Stage> {
        if !self.init_done {
            let queue = self.init_index;
            self.init_index += 1;
            if self.init_index as usize == self.config.queue_count() {
                self.init_done = true;
            }
            return Some(Stage {
                queue,
                payload: StagePayload::Init,
            });
        }
        if let Some((queue, value)) = self.pending_write.take() {
            return Some(Stage {
                queue,
                payload: StagePayload::Write { value },
            });
        }
        if self.read_data.is_none()
            && let Some(queue) = self.pending_read.take()
        {
            return Some(Stage {
                queue,
                payload: StagePayload::Read,
            });
        }
        if let Some(queue) = self.doorbells.pop_front() {
            return Some(Stage {
                queue,
                payload: StagePayload::Doorbell,
            });
        }
        if let Some(completion) = self.completions.pop_front() {
            return Some(Stage {
                queue: completion.queue,
                payload: StagePayload::Complete {
                    tag: completion.tag,
                    kind: completion.kind,
                },
            });
        }
        if let Some(ctrl) = self.ctrl_in.pop_front() {
            return Some(Stage {
                queue: ctrl.queue,
                payload: StagePayload::Ctrl {
                    enable: ctrl.enable,
                },
            });
        }
        self.admit_request()
    }

    /// Admit a transmit request when the global enables, output slot, op
    /// pool, and the head queue's egress path all allow it. A head queue
    /// with no structurally usable port is admitted as a drain pass so it
    /// cannot park the ring forever.
    fn admit_request(&mut self) -> Option<Stage> {
        if !self.enabled || !self.gate {
            return None;
        }
        if self.tx_out.len() >= TX_OUT_DEPTH || !self.ops.has_free() {
            return None;
        }
        let queue = self.ring.peek()?;
        let rec = self.queues.read(queue);

        if rec.schedulable() {
            if let Some((port, channel)) = self.select_channel(&rec) {
                let Some(op) = self.ops.allocate(queue, channel) else {
                    return None;
                };
                self.ring.pop();
                self.fc.channel_mut(channel).fetch_consume();
                return Some(Stage {
                    queue,
                    payload: StagePayload::Request {
                        op: Some(op),
                        channel,
                        port,
                    },
                });
            }
            if self.has_structural_port(&rec) {
                // Usable port exists but its channel is out of credit:
                // hold the head until a release restores the grant.
                return None;
            }
        }
        // Ineligible queue: drain it out of the ring.
        self.ring.pop();
        Some(Stage {
            queue,
            payload: StagePayload::Request {
                op: None,
                channel: 0,
                port: 0,
            },
        })
    }

    /// Strict-priority port selection: lowest port index whose port state,
    /// channel enable, and credit all allow a fetch.
    fn select_channel(&self, rec: &QueueRecord) -> Option<(u8, u16)> {
        for port in 0..self.config.port_count {
            let pc = &rec.ports[port as usize];
            if !pc.enabled || pc.paused {
                continue;
            }
            let channel = port as u16 * self.config.tc_count as u16 + pc.tc as u16;
            let fc = self.fc.channel(channel);
            if fc.enabled && fc.fc_available() {
                return Some((port, channel));
            }
        }
        None
    }

    /// A port that could carry a request once credit returns.
    fn has_structural_port(&self, rec: &QueueRecord) -> bool {
        (0..self.config.port_count).any(|port| {
            let pc = &rec.ports[port as usize];
            let channel = port as u16 * self.config.tc_count as u16 + pc.tc as u16;
            pc.enabled && !pc.paused && self.fc.channel(channel).enabled
        })
    }

    // ── Commit stage ─────────────────────────────────────────────────

    fn commit(&mut self, stage: Stage) {
        let queue = stage.queue;
        match stage.payload {
            StagePayload::Init => {
                self.queues.write(queue, QueueRecord::default());
            }
            StagePayload::Doorbell => self.commit_doorbell(queue),
            StagePayload::Request { op, channel, port } => {
                self.commit_request(queue, op, channel, port)
            }
            StagePayload::Complete { tag, kind } => self.commit_complete(queue, tag, kind),
            StagePayload::Write { value } => self.commit_write(queue, value),
            StagePayload::Read => {
                let rec = self.queues.read(queue);
                self.read_data = Some(rec.pack_status(self.config.port_count));
            }
            StagePayload::Ctrl { enable } => {
                let mut rec = self.queues.read(queue);
                rec.paused = !enable;
                self.requeue_if_eligible(queue, &mut rec);
                self.queues.write(queue, rec);
            }
        }
    }

    fn commit_doorbell(&mut self, queue: u32) {
        let mut rec = self.queues.read(queue);
        rec.active = true;
        rec.generation = rec.generation.wrapping_add(1);
        if rec.enabled && !rec.paused && !rec.scheduled {
            rec.scheduled = true;
            self.ring.push(queue);
            self.scheduled_changed(1);
        }
        // Mark the newest in-flight op so its completion re-arms the queue.
        if let Some(tail) = rec.tail_op
            && let Some(entry) = self.ops.get_mut(tail)
            && entry.queue == queue
        {
            entry.doorbell_pending = true;
        }
        metrics::DOORBELLS_PROCESSED.increment();
        self.queues.write(queue, rec);
    }

    fn commit_request(&mut self, queue: u32, op: Option<u16>, channel: u16, port: u8) {
        let mut rec = self.queues.read(queue);
        let port_ok = {
            let pc = &rec.ports[port as usize];
            pc.enabled && !pc.paused && self.fc.channel(channel).enabled
        };
        let eligible = rec.schedulable() && rec.scheduled && port_ok;

        if let Some(op) = op
            && eligible
        {
            let tag = rec.generation;
            let dest = self.fc.channel(channel).dest;
            self.tx_out.push_back(TxRequest { queue, dest, tag });
            self.ops.link_tail(op, rec.tail_op);
            rec.tail_op = Some(op);
            rec.ports[port as usize].scheduled = true;
            // Round-robin continuation: the queue goes to the back of the ring.
            self.ring.push(queue);
            metrics::REQUESTS_EMITTED.increment();
        } else if op.is_none() && rec.schedulable() && rec.scheduled && self.has_structural_port(&rec)
        {
            // The queue recovered eligibility while its drain pass was in
            // flight (e.g. a re-enable committed in between): keep it
            // scheduled and let the next admit issue for real.
            self.ring.push(queue);
        } else {
            if let Some(op) = op {
                self.ops.release(op);
                self.fc.channel_mut(channel).fetch_release();
            }
            if rec.scheduled {
                rec.scheduled = false;
                for pc in rec.ports.iter_mut() {
                    pc.scheduled = false;
                }
                self.scheduled_changed(-1);
            }
            metrics::REQUESTS_SCHED_FAIL.increment();
        }
        self.queues.write(queue, rec);
    }

    fn commit_complete(&mut self, queue: u32, tag: u8, kind: CompletionKind) {
        metrics::COMPLETIONS_PROCESSED.increment();
        let mut rec = self.queues.read(queue);
        let Some(tail) = rec.tail_op else {
            metrics::COMPLETIONS_SPURIOUS.increment();
            return;
        };
        // Failure statuses close the oldest op still in its fetch window;
        // finishes close the oldest op that started. Falling back to the
        // chain head keeps the pool leak-free if a status went missing.
        let key = if kind.is_failure() {
            self.ops.find_oldest(tail, |e| !e.started)
        } else {
            self.ops.find_oldest(tail, |e| e.started)
        }
        .or_else(|| self.ops.find_oldest(tail, |_| true));
        let Some(key) = key else {
            metrics::COMPLETIONS_SPURIOUS.increment();
            return;
        };
        let Some(entry) = self.ops.get(key).copied() else {
            metrics::COMPLETIONS_SPURIOUS.increment();
            return;
        };

        if entry.started {
            let len = match kind {
                CompletionKind::Finish { len } => len,
                _ => 0,
            };
            let credits = self.fc.credits_for(len);
            self.fc.channel_mut(entry.channel).tx_release(credits);
        } else {
            self.fc.channel_mut(entry.channel).fetch_release();
        }

        let tag_match = tag == rec.generation;
        if !tag_match {
            metrics::COMPLETIONS_STALE.increment();
        }
        if !rec.enabled {
            // Administrative invalidation: a disabled queue never re-arms.
            rec.active = false;
        } else if entry.doorbell_pending {
            rec.active = true;
        } else if tag_match && kind.is_failure() {
            rec.active = false;
        }

        let prev = self.ops.unlink(key);
        if rec.tail_op == Some(key) {
            rec.tail_op = prev;
        }
        self.ops.release(key);

        self.requeue_if_eligible(queue, &mut rec);
        self.queues.write(queue, rec);
    }

    fn commit_write(&mut self, queue: u32, value: u32) {
        let mut rec = self.queues.read(queue);
        match value >> 24 {
            0x80 => {
                let cmd = (value >> 16) & 0xff;
                let port = ((value >> 8) & 0xff) as usize;
                let arg = value & 0xff;
                if port >= self.config.port_count as usize {
                    self.invalid_command(queue, value);
                } else {
                    match cmd {
                        1 => rec.ports[port].tc = (arg & 0x7) as u8,
                        2 => rec.ports[port].enabled = arg & 1 != 0,
                        3 => rec.ports[port].paused = arg & 1 != 0,
                        _ => self.invalid_command(queue, value),
                    }
                }
            }
            0x40 => {
                let cmd = (value >> 8) & 0xffff;
                let arg = value & 1;
                match cmd {
                    1 => rec.enabled = arg != 0,
                    2 => rec.paused = arg != 0,
                    _ => self.invalid_command(queue, value),
                }
            }
            _ => self.invalid_command(queue, value),
        }
        self.requeue_if_eligible(queue, &mut rec);
        self.queues.write(queue, rec);
    }

    fn invalid_command(&self, queue: u32, value: u32) {
        metrics::COMMANDS_INVALID.increment();
        log::warn!("queue {queue}: unknown command word {value:#010x}, dropped");
    }

    fn requeue_if_eligible(&mut self, queue: u32, rec: &mut QueueRecord) {
        if rec.schedulable() && !rec.scheduled {
            rec.scheduled = true;
            self.ring.push(queue);
            self.scheduled_changed(1);
        }
    }

    fn scheduled_changed(&mut self, delta: i32) {
        self.scheduled_count = self.scheduled_count.wrapping_add_signed(delta);
        metrics::QUEUES_SCHEDULED.set(self.scheduled_count as i64);
    }
}
