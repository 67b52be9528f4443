//! Timeslot gate: derives the TDMA schedule from the time-of-day feed.
//!
//! Four parameters define the schedule: start instant, schedule period,
//! timeslot period, and active period. Slot boundaries are always computed
//! from the current schedule base (never accumulated slot by slot), the
//! timeslot period clamps to the schedule period, the active period
//! clamps to the timeslot period, and the final slot of a schedule
//! absorbs any division remainder.

use crate::error::Error;
use crate::time::{NS_PER_SEC, TodTime};

/// Register block type for the TDMA timeslot gate.
pub const RB_TYPE: u32 = 0x0000_C060;
pub const RB_VERSION: u32 = 0x0000_0200;

pub const REG_TYPE: u32 = 0x00;
pub const REG_VERSION: u32 = 0x04;
pub const REG_NEXT_PTR: u32 = 0x08;
/// bit 0 enable (RW); bit 8 locked (RO); bit 9 error (RO);
/// [31:16] timeslot count (RO).
pub const REG_CTRL: u32 = 0x0C;
pub const REG_SCH_START_FNS: u32 = 0x10;
pub const REG_SCH_START_NS: u32 = 0x14;
pub const REG_SCH_START_SEC_L: u32 = 0x18;
/// Writing the high second word latches the schedule start.
pub const REG_SCH_START_SEC_H: u32 = 0x1C;
pub const REG_SCH_PERIOD_FNS: u32 = 0x20;
/// Writing the period nanoseconds latches the schedule period.
pub const REG_SCH_PERIOD_NS: u32 = 0x24;
pub const REG_TS_PERIOD_NS: u32 = 0x28;
pub const REG_ACTIVE_PERIOD_NS: u32 = 0x2C;

pub const CTRL_ENABLE: u32 = 1 << 0;
pub const CTRL_LOCKED: u32 = 1 << 8;
pub const CTRL_ERROR: u32 = 1 << 9;

/// Edge outputs of one [`TimeslotGate::advance`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// A schedule boundary was crossed.
    pub schedule_start: bool,
    /// A new timeslot began.
    pub timeslot_start: bool,
    /// The previous timeslot ended.
    pub timeslot_end: bool,
}

/// The TDMA timeslot engine.
///
/// Fed with time-of-day samples via [`advance`](Self::advance); emits the
/// timeslot index, start/end edges, and the active-window level. A pure
/// observer of scheduler state: gating happens by driving the scheduler's
/// enable input or control stream, never by touching queue records.
pub struct TimeslotGate {
    max_index_bits: u32,

    // Latched parameters.
    start: u128,
    period: u64,
    ts_period: u32,
    active_period: u32,

    // Shadow registers awaiting their latch write.
    shadow_start_fns: u32,
    shadow_start_ns: u32,
    shadow_start_sec_l: u32,
    shadow_period_fns: u32,

    enabled: bool,
    locked: bool,
    error: bool,
    running: bool,
    schedule_base: u128,
    slot_index: u16,
    in_slot_ns: u64,
    active: bool,
    last_now: Option<u128>,
}

impl TimeslotGate {
    /// Create a gate supporting up to 2^max_index_bits timeslots.
    pub fn new(max_index_bits: u32) -> Result<Self, Error> {
        if max_index_bits == 0 || max_index_bits > 14 {
            return Err(Error::Config("max_index_bits must be in 1..=14".into()));
        }
        Ok(Self {
            max_index_bits,
            start: 0,
            period: 0,
            ts_period: 0,
            active_period: 0,
            shadow_start_fns: 0,
            shadow_start_ns: 0,
            shadow_start_sec_l: 0,
            shadow_period_fns: 0,
            enabled: false,
            locked: false,
            error: false,
            running: false,
            schedule_base: 0,
            slot_index: 0,
            in_slot_ns: 0,
            active: false,
            last_now: None,
        })
    }

    // ── Status ───────────────────────────────────────────────────────

    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn error(&self) -> bool {
        self.error
    }

    /// Level output: inside the active window of the current timeslot.
    pub fn timeslot_active(&self) -> bool {
        self.active
    }

    pub fn timeslot_index(&self) -> u16 {
        self.slot_index
    }

    /// Nanoseconds elapsed inside the current timeslot.
    pub fn time_in_slot(&self) -> u64 {
        self.in_slot_ns
    }

    /// Number of timeslots per schedule; 0 while unarmed.
    pub fn timeslot_count(&self) -> u16 {
        if !self.armed() {
            return 0;
        }
        let count = self.raw_slot_count();
        if count > self.max_slots() {
            0
        } else {
            count as u16
        }
    }

    fn armed(&self) -> bool {
        self.period > 0 && self.ts_period > 0
    }

    fn max_slots(&self) -> u64 {
        1 << self.max_index_bits
    }

    fn eff_ts_period(&self) -> u64 {
        (self.ts_period as u64).min(self.period)
    }

    fn eff_active_period(&self) -> u64 {
        (self.active_period as u64).min(self.eff_ts_period())
    }

    fn raw_slot_count(&self) -> u64 {
        (self.period / self.eff_ts_period()).max(1)
    }

    // ── Time feed ────────────────────────────────────────────────────

    /// Consume one time-of-day sample. `step` flags a clock discontinuity
    /// reported by the time source; a jump larger than one timeslot
    /// period drops the lock and forces re-alignment.
    pub fn advance(&mut self, now: TodTime, step: bool) -> TickEvents {
        let now = now.nanos();
        let mut ev = TickEvents::default();

        if step
            && let Some(prev) = self.last_now
            && self.locked
            && now.abs_diff(prev) > self.eff_ts_period().max(1) as u128
        {
            self.error = true;
            self.locked = false;
            self.running = false;
            self.active = false;
            self.last_now = Some(now);
            // The deasserted gate is observable for this sample; the next
            // advance recomputes alignment and may re-lock.
            return ev;
        }
        self.last_now = Some(now);

        if !self.enabled || !self.armed() {
            self.locked = false;
            self.running = false;
            self.active = false;
            return ev;
        }

        if self.raw_slot_count() > self.max_slots() {
            // Schedule asks for more slots than the gate can index:
            // refuse to arm.
            self.error = true;
            self.locked = false;
            self.running = false;
            self.active = false;
            return ev;
        }

        if !self.running {
            self.schedule_base = self.align(now);
            self.running = true;
            self.slot_index = 0;
            self.active = false;
        }
        if now < self.schedule_base {
            self.active = false;
            return ev;
        }
        if !self.locked {
            self.locked = true;
            self.error = false;
            ev.schedule_start = true;
            ev.timeslot_start = true;
            self.slot_index = 0;
        }

        let period = self.period as u128;
        let mut offset = now - self.schedule_base;
        if offset >= period {
            let rolls = offset / period;
            self.schedule_base += rolls * period;
            offset -= rolls * period;
            ev.schedule_start = true;
            ev.timeslot_end = true;
            ev.timeslot_start = true;
            self.slot_index = 0;
        }

        let ts = self.eff_ts_period() as u128;
        let count = self.raw_slot_count();
        let slot = ((offset / ts).min(count as u128 - 1)) as u16;
        if slot != self.slot_index {
            ev.timeslot_end = true;
            ev.timeslot_start = true;
            self.slot_index = slot;
        }
        let in_slot = offset - slot as u128 * ts;
        self.in_slot_ns = in_slot as u64;
        self.active = in_slot < self.eff_active_period() as u128;
        ev
    }

    /// Effective schedule base for the current time: the start itself if
    /// it lies in the future, otherwise its phase carried into the
    /// present period (`start mod period + now - now mod period`). The
    /// carried base may sit in the recent past, in which case the gate
    /// locks mid-schedule at the slot that instant falls in.
    fn align(&self, now: u128) -> u128 {
        if self.start >= now {
            return self.start;
        }
        let period = self.period as u128;
        self.start % period + now - now % period
    }

    // ── Register surface ─────────────────────────────────────────────

    pub fn ctrl_read(&self, offset: u32) -> Result<u32, Error> {
        match offset {
            REG_TYPE => Ok(RB_TYPE),
            REG_VERSION => Ok(RB_VERSION),
            REG_NEXT_PTR => Ok(0),
            REG_CTRL => {
                let mut val = self.enabled as u32;
                if self.locked {
                    val |= CTRL_LOCKED;
                }
                if self.error {
                    val |= CTRL_ERROR;
                }
                val |= (self.timeslot_count() as u32) << 16;
                Ok(val)
            }
            REG_SCH_START_FNS => Ok(self.shadow_start_fns),
            REG_SCH_START_NS => Ok((self.start % NS_PER_SEC as u128) as u32),
            REG_SCH_START_SEC_L => Ok((self.start / NS_PER_SEC as u128) as u32),
            REG_SCH_START_SEC_H => Ok(((self.start / NS_PER_SEC as u128) >> 32) as u32),
            REG_SCH_PERIOD_FNS => Ok(self.shadow_period_fns),
            REG_SCH_PERIOD_NS => Ok(self.period as u32),
            REG_TS_PERIOD_NS => Ok(self.ts_period),
            REG_ACTIVE_PERIOD_NS => Ok(self.active_period),
            _ => Err(Error::InvalidRegister(offset)),
        }
    }

    pub fn ctrl_write(&mut self, offset: u32, value: u32) -> Result<(), Error> {
        match offset {
            REG_TYPE | REG_VERSION | REG_NEXT_PTR => Ok(()),
            REG_CTRL => {
                let enable = value & CTRL_ENABLE != 0;
                if enable && !self.enabled {
                    // Fresh arm: realign on the next advance.
                    self.running = false;
                    self.error = false;
                }
                self.enabled = enable;
                Ok(())
            }
            REG_SCH_START_FNS => {
                self.shadow_start_fns = value;
                Ok(())
            }
            REG_SCH_START_NS => {
                self.shadow_start_ns = value;
                Ok(())
            }
            REG_SCH_START_SEC_L => {
                self.shadow_start_sec_l = value;
                Ok(())
            }
            REG_SCH_START_SEC_H => {
                let sec = self.shadow_start_sec_l as u64 | (value as u64) << 32;
                self.start =
                    sec as u128 * NS_PER_SEC as u128 + self.shadow_start_ns as u128;
                self.running = false;
                Ok(())
            }
            REG_SCH_PERIOD_FNS => {
                self.shadow_period_fns = value;
                Ok(())
            }
            REG_SCH_PERIOD_NS => {
                self.period = value as u64;
                self.running = false;
                Ok(())
            }
            REG_TS_PERIOD_NS => {
                self.ts_period = value;
                Ok(())
            }
            REG_ACTIVE_PERIOD_NS => {
                self.active_period = value;
                Ok(())
            }
            _ => Err(Error::InvalidRegister(offset)),
        }
    }
}
