//! TDMA BER measurement controller.
//!
//! Consumes timeslot boundaries from the gate plus per-PHY-channel error
//! counts from the serdes PRBS checkers, and maintains total and
//! per-timeslot bit/error accumulators. The PRBS generator and checker
//! circuits themselves are external; this block only owns their enable
//! masks and the accounting.

use crate::error::Error;
use crate::timeslot::TimeslotGate;

/// Register block type for the TDMA BER controller.
pub const RB_TYPE: u32 = 0x0000_C061;
pub const RB_VERSION: u32 = 0x0000_0100;

pub const REG_TYPE: u32 = 0x00;
pub const REG_VERSION: u32 = 0x04;
pub const REG_NEXT_PTR: u32 = 0x08;
/// RO: [15:8] channel count, [31:16] bits per update.
pub const REG_CONFIG: u32 = 0x0C;
pub const REG_TX_PRBS_EN: u32 = 0x10;
pub const REG_RX_PRBS_EN: u32 = 0x14;
/// bit 0 accumulate, bit 1 slice mode.
pub const REG_CTRL: u32 = 0x1C;
pub const REG_SLICE_TIME: u32 = 0x20;
pub const REG_SLICE_OFFSET: u32 = 0x24;
pub const REG_SLICE_SHIFT: u32 = 0x28;
/// Write: select the timeslot visible through the per-channel slot
/// counters; bit 31 clears that slot instead.
pub const REG_TS_SELECT: u32 = 0x2C;
pub const REG_CYCLE_COUNT: u32 = 0x30;

pub const REG_CH_BASE: u32 = 0x40;
pub const REG_CH_STRIDE: u32 = 0x10;
pub const REG_CH_BITS: u32 = 0x0;
pub const REG_CH_ERRORS: u32 = 0x4;
pub const REG_CH_TS_BITS: u32 = 0x8;
pub const REG_CH_TS_ERRORS: u32 = 0xC;

pub const CTRL_ACCUMULATE: u32 = 1 << 0;
pub const CTRL_SLICES: u32 = 1 << 1;

#[derive(Debug, Clone, Copy, Default)]
struct BerCounters {
    bits: u32,
    errors: u32,
}

/// The BER controller block.
pub struct TdmaBer {
    channel_count: usize,
    bits_per_update: u32,
    ram_slots: usize,

    tx_prbs_en: u32,
    rx_prbs_en: u32,
    accumulate: bool,
    slices: bool,
    slice_time: u32,
    slice_offset: u32,
    slice_shift: u32,
    ts_select: u32,
    cycle_count: u32,

    totals: Vec<BerCounters>,
    /// Per-(slot-or-slice) accumulators, one row per RAM index.
    ram: Vec<Vec<BerCounters>>,
}

impl TdmaBer {
    /// `ram_slots` bounds the per-timeslot accumulator RAM (slot indexes,
    /// multiplied by slices when slice mode is on).
    pub fn new(channel_count: usize, bits_per_update: u32, ram_slots: usize) -> Result<Self, Error> {
        if channel_count == 0 || channel_count > 32 {
            return Err(Error::Config(
                "channel_count must be in 1..=32 (enable masks are 32-bit)".into(),
            ));
        }
        if bits_per_update == 0 || bits_per_update > u16::MAX as u32 {
            return Err(Error::Config("bits_per_update must be in 1..=65535".into()));
        }
        if ram_slots == 0 {
            return Err(Error::Config("ram_slots must be > 0".into()));
        }
        Ok(Self {
            channel_count,
            bits_per_update,
            ram_slots,
            tx_prbs_en: 0,
            rx_prbs_en: 0,
            accumulate: false,
            slices: false,
            slice_time: 0,
            slice_offset: 0,
            slice_shift: 0,
            ts_select: 0,
            cycle_count: 0,
            totals: vec![BerCounters::default(); channel_count],
            ram: vec![vec![BerCounters::default(); channel_count]; ram_slots],
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Consume one measurement update: `errors[ch]` is the checker's error
    /// count for this interval. Totals advance for every enabled channel;
    /// the slot RAM advances only inside a locked, active timeslot.
    pub fn update(&mut self, gate: &TimeslotGate, errors: &[u32]) {
        if !self.accumulate {
            return;
        }
        self.cycle_count = self.cycle_count.wrapping_add(1);

        let slot_index = self.accumulator_index(gate);
        for ch in 0..self.channel_count.min(errors.len()) {
            if self.rx_prbs_en & (1 << ch) == 0 {
                continue;
            }
            let totals = &mut self.totals[ch];
            totals.bits = totals.bits.wrapping_add(self.bits_per_update);
            totals.errors = totals.errors.wrapping_add(errors[ch]);

            if let Some(index) = slot_index {
                let slot = &mut self.ram[index][ch];
                slot.bits = slot.bits.wrapping_add(self.bits_per_update);
                slot.errors = slot.errors.wrapping_add(errors[ch]);
            }
        }
    }

    /// RAM row for the current gate position, if any.
    fn accumulator_index(&self, gate: &TimeslotGate) -> Option<usize> {
        if !gate.locked() || !gate.timeslot_active() {
            return None;
        }
        let slot = gate.timeslot_index() as usize;
        let index = if self.slices {
            if self.slice_time == 0 {
                return None;
            }
            let in_slot = gate.time_in_slot();
            if in_slot < self.slice_offset as u64 {
                return None;
            }
            let slice = ((in_slot - self.slice_offset as u64) / self.slice_time as u64) as usize;
            let slices_per_slot = 1usize << self.slice_shift;
            if slice >= slices_per_slot {
                return None;
            }
            slot * slices_per_slot + slice
        } else {
            slot
        };
        (index < self.ram_slots).then_some(index)
    }

    // ── Register surface ─────────────────────────────────────────────

    pub fn ctrl_read(&self, offset: u32) -> Result<u32, Error> {
        match offset {
            REG_TYPE => Ok(RB_TYPE),
            REG_VERSION => Ok(RB_VERSION),
            REG_NEXT_PTR => Ok(0),
            REG_CONFIG => {
                Ok((self.channel_count as u32) << 8 | self.bits_per_update << 16)
            }
            REG_TX_PRBS_EN => Ok(self.tx_prbs_en),
            REG_RX_PRBS_EN => Ok(self.rx_prbs_en),
            REG_CTRL => {
                Ok(self.accumulate as u32 * CTRL_ACCUMULATE | self.slices as u32 * CTRL_SLICES)
            }
            REG_SLICE_TIME => Ok(self.slice_time),
            REG_SLICE_OFFSET => Ok(self.slice_offset),
            REG_SLICE_SHIFT => Ok(self.slice_shift),
            REG_TS_SELECT => Ok(self.ts_select),
            REG_CYCLE_COUNT => Ok(self.cycle_count),
            _ => {
                let (ch, reg) = self.channel_reg(offset)?;
                let selected = self
                    .ram
                    .get(self.ts_select as usize)
                    .map(|row| row[ch])
                    .unwrap_or_default();
                match reg {
                    REG_CH_BITS => Ok(self.totals[ch].bits),
                    REG_CH_ERRORS => Ok(self.totals[ch].errors),
                    REG_CH_TS_BITS => Ok(selected.bits),
                    REG_CH_TS_ERRORS => Ok(selected.errors),
                    _ => Err(Error::InvalidRegister(offset)),
                }
            }
        }
    }

    pub fn ctrl_write(&mut self, offset: u32, value: u32) -> Result<(), Error> {
        match offset {
            REG_TYPE | REG_VERSION | REG_NEXT_PTR | REG_CONFIG | REG_CYCLE_COUNT => Ok(()),
            REG_TX_PRBS_EN => {
                self.tx_prbs_en = value;
                Ok(())
            }
            REG_RX_PRBS_EN => {
                self.rx_prbs_en = value;
                Ok(())
            }
            REG_CTRL => {
                self.accumulate = value & CTRL_ACCUMULATE != 0;
                self.slices = value & CTRL_SLICES != 0;
                Ok(())
            }
            REG_SLICE_TIME => {
                self.slice_time = value;
                Ok(())
            }
            REG_SLICE_OFFSET => {
                self.slice_offset = value;
                Ok(())
            }
            REG_SLICE_SHIFT => {
                self.slice_shift = value & 0xf;
                Ok(())
            }
            REG_TS_SELECT => {
                let index = value & 0x7fff_ffff;
                if value & 0x8000_0000 != 0 {
                    if let Some(row) = self.ram.get_mut(index as usize) {
                        row.fill(BerCounters::default());
                    }
                } else {
                    self.ts_select = index;
                }
                Ok(())
            }
            _ => {
                // Channel counters are read-only; acknowledge known
                // offsets, reject unmapped ones.
                self.channel_reg(offset).map(|_| ())
            }
        }
    }

    fn channel_reg(&self, offset: u32) -> Result<(usize, u32), Error> {
        if offset < REG_CH_BASE || offset % 4 != 0 {
            return Err(Error::InvalidRegister(offset));
        }
        let ch = ((offset - REG_CH_BASE) / REG_CH_STRIDE) as usize;
        if ch >= self.channel_count {
            return Err(Error::InvalidRegister(offset));
        }
        Ok((ch, (offset - REG_CH_BASE) % REG_CH_STRIDE))
    }
}
