//! Control register block for the round-robin scheduler.
//!
//! The block starts with the standard header (type, version, next-block
//! pointer) so host-side walkers can enumerate it, followed by the
//! scheduler identification registers and one 16-byte window per channel.
//! Per-queue command registers live in a separate region whose offset is
//! reported at [`REG_OFFSET`]; access to that region goes through the
//! pipeline via `post_queue_write` / `post_queue_read`.

use crate::error::Error;
use crate::sched::TxScheduler;

/// Register block type for the round-robin TX scheduler.
pub const RB_TYPE: u32 = 0x0000_C040;
/// Register block version (major.minor.patch.meta).
pub const RB_VERSION: u32 = 0x0000_0200;

pub const REG_TYPE: u32 = 0x00;
pub const REG_VERSION: u32 = 0x04;
pub const REG_NEXT_PTR: u32 = 0x08;
/// Offset from the block base to the queue command region.
pub const REG_OFFSET: u32 = 0x0C;
pub const REG_QUEUE_COUNT: u32 = 0x10;
pub const REG_QUEUE_STRIDE: u32 = 0x14;
/// bit 0: enable (RW); bit 16: active (RO).
pub const REG_CTRL: u32 = 0x18;
/// [7:0] TC count, [15:8] port count, [23:16] FC scale exponent.
pub const REG_CFG: u32 = 0x1C;

pub const REG_CH_BASE: u32 = 0x20;
pub const REG_CH_STRIDE: u32 = 0x10;
/// Channel ctrl/status: bit 0 enable; RO status bits 16 active,
/// 17 fetch-active, 18 fc-available, 19 primed.
pub const REG_CH_CTRL: u32 = 0x0;
/// [15:0] dest, [31:16] packet budget.
pub const REG_CH_FC1: u32 = 0x4;
/// [15:0] data budget (credits), [31:16] packet limit.
pub const REG_CH_FC2: u32 = 0x8;
/// Data limit (credits).
pub const REG_CH_FC3: u32 = 0xC;

pub const CH_CTRL_ENABLE: u32 = 1 << 0;
pub const CH_CTRL_ACTIVE: u32 = 1 << 16;
pub const CH_CTRL_FETCH_ACTIVE: u32 = 1 << 17;
pub const CH_CTRL_FC_AVAILABLE: u32 = 1 << 18;
pub const CH_CTRL_PRIMED: u32 = 1 << 19;

// Queue command register opcodes (top byte selects the command class).
pub const CMD_SET_PORT_TC: u32 = 0x8001_0000;
pub const CMD_SET_PORT_ENABLE: u32 = 0x8002_0000;
pub const CMD_SET_PORT_PAUSE: u32 = 0x8003_0000;
pub const CMD_SET_QUEUE_ENABLE: u32 = 0x4000_0100;
pub const CMD_SET_QUEUE_PAUSE: u32 = 0x4000_0200;

// Packed queue status word bits.
pub const QUEUE_STATUS_PORT_TC: u32 = 0x7;
pub const QUEUE_STATUS_PORT_ENABLE: u32 = 1 << 3;
pub const QUEUE_STATUS_PORT_PAUSE: u32 = 1 << 4;
pub const QUEUE_STATUS_PORT_SCHEDULED: u32 = 1 << 5;
pub const QUEUE_STATUS_ENABLE: u32 = 1 << 6;
pub const QUEUE_STATUS_PAUSE: u32 = 1 << 7;
pub const QUEUE_STATUS_ACTIVE: u32 = 1 << 14;

impl TxScheduler {
    /// Read a control block register.
    pub fn ctrl_read(&self, offset: u32) -> Result<u32, Error> {
        let config = self.config();
        match offset {
            REG_TYPE => Ok(RB_TYPE),
            REG_VERSION => Ok(RB_VERSION),
            REG_NEXT_PTR => Ok(config.rb_next_ptr),
            REG_OFFSET => Ok(config.queue_region_offset),
            REG_QUEUE_COUNT => Ok(config.queue_count() as u32),
            REG_QUEUE_STRIDE => Ok(4),
            REG_CTRL => {
                let mut val = self.enabled as u32;
                if self.active() {
                    val |= 1 << 16;
                }
                Ok(val)
            }
            REG_CFG => Ok(config.tc_count as u32
                | (config.port_count as u32) << 8
                | (config.fc_scale_bits as u32) << 16),
            _ => {
                let (ch, reg) = self.channel_reg(offset)?;
                let fc = self.fc.channel(ch);
                match reg {
                    REG_CH_CTRL => {
                        let mut val = fc.enabled as u32;
                        if fc.active() {
                            val |= CH_CTRL_ACTIVE;
                        }
                        if fc.pkts_in_fetch() > 0 {
                            val |= CH_CTRL_FETCH_ACTIVE;
                        }
                        if fc.fc_available() {
                            val |= CH_CTRL_FC_AVAILABLE;
                        }
                        if fc.enabled && self.enabled && self.gate() && fc.fc_available() {
                            val |= CH_CTRL_PRIMED;
                        }
                        Ok(val)
                    }
                    REG_CH_FC1 => Ok(fc.dest as u32 | (fc.pkt_budget as u32) << 16),
                    REG_CH_FC2 => Ok(fc.data_budget as u32 | (fc.pkt_limit as u32) << 16),
                    REG_CH_FC3 => Ok(fc.data_limit),
                    _ => Err(Error::InvalidRegister(offset)),
                }
            }
        }
    }

    /// Write a control block register. Writes to read-only identification
    /// registers are acknowledged and ignored.
    pub fn ctrl_write(&mut self, offset: u32, value: u32) -> Result<(), Error> {
        match offset {
            REG_TYPE | REG_VERSION | REG_NEXT_PTR | REG_OFFSET | REG_QUEUE_COUNT
            | REG_QUEUE_STRIDE | REG_CFG => Ok(()),
            REG_CTRL => {
                self.enabled = value & 1 != 0;
                Ok(())
            }
            _ => {
                let (ch, reg) = self.channel_reg(offset)?;
                let fc = self.fc.channel_mut(ch);
                match reg {
                    REG_CH_CTRL => fc.enabled = value & CH_CTRL_ENABLE != 0,
                    REG_CH_FC1 => {
                        fc.dest = value as u16;
                        fc.pkt_budget = (value >> 16) as u16;
                    }
                    REG_CH_FC2 => {
                        fc.data_budget = value as u16;
                        fc.pkt_limit = (value >> 16) as u16;
                    }
                    REG_CH_FC3 => fc.data_limit = value,
                    _ => return Err(Error::InvalidRegister(offset)),
                }
                Ok(())
            }
        }
    }

    fn channel_reg(&self, offset: u32) -> Result<(u16, u32), Error> {
        if offset < REG_CH_BASE || offset % 4 != 0 {
            return Err(Error::InvalidRegister(offset));
        }
        let ch = (offset - REG_CH_BASE) / REG_CH_STRIDE;
        if ch as usize >= self.config().channel_count() {
            return Err(Error::InvalidRegister(offset));
        }
        Ok((ch as u16, (offset - REG_CH_BASE) % REG_CH_STRIDE))
    }

    fn ch_offset(&self, ch: u16, reg: u32) -> Result<u32, Error> {
        if ch as usize >= self.config().channel_count() {
            return Err(Error::InvalidChannel(ch as u32));
        }
        Ok(REG_CH_BASE + ch as u32 * REG_CH_STRIDE + reg)
    }

    // ── Host-style convenience accessors ─────────────────────────────

    /// Set the register-file enable bit.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Clear the register-file enable bit. In-flight operations drain;
    /// the active status holds until they do.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn channel_enable(&mut self, ch: u16) -> Result<(), Error> {
        let offset = self.ch_offset(ch, REG_CH_CTRL)?;
        self.ctrl_write(offset, CH_CTRL_ENABLE)
    }

    pub fn channel_disable(&mut self, ch: u16) -> Result<(), Error> {
        let offset = self.ch_offset(ch, REG_CH_CTRL)?;
        self.ctrl_write(offset, 0)
    }

    pub fn set_channel_dest(&mut self, ch: u16, dest: u16) -> Result<(), Error> {
        let offset = self.ch_offset(ch, REG_CH_FC1)?;
        let old = self.ctrl_read(offset)?;
        self.ctrl_write(offset, (old & 0xffff_0000) | dest as u32)
    }

    pub fn channel_dest(&self, ch: u16) -> Result<u16, Error> {
        let offset = self.ch_offset(ch, REG_CH_FC1)?;
        Ok(self.ctrl_read(offset)? as u16)
    }

    pub fn set_channel_pkt_budget(&mut self, ch: u16, pkts: u16) -> Result<(), Error> {
        let offset = self.ch_offset(ch, REG_CH_FC1)?;
        let old = self.ctrl_read(offset)?;
        self.ctrl_write(offset, (old & 0x0000_ffff) | (pkts as u32) << 16)
    }

    pub fn channel_pkt_budget(&self, ch: u16) -> Result<u16, Error> {
        let offset = self.ch_offset(ch, REG_CH_FC1)?;
        Ok((self.ctrl_read(offset)? >> 16) as u16)
    }

    pub fn set_channel_pkt_limit(&mut self, ch: u16, pkts: u16) -> Result<(), Error> {
        let offset = self.ch_offset(ch, REG_CH_FC2)?;
        let old = self.ctrl_read(offset)?;
        self.ctrl_write(offset, (old & 0x0000_ffff) | (pkts as u32) << 16)
    }

    pub fn channel_pkt_limit(&self, ch: u16) -> Result<u16, Error> {
        let offset = self.ch_offset(ch, REG_CH_FC2)?;
        Ok((self.ctrl_read(offset)? >> 16) as u16)
    }

    /// Set the per-fetch data budget in bytes (rounded up to credits).
    pub fn set_channel_data_budget_bytes(&mut self, ch: u16, bytes: u32) -> Result<(), Error> {
        let credits = self.fc.credits_for(bytes).min(u16::MAX as u32);
        let offset = self.ch_offset(ch, REG_CH_FC2)?;
        let old = self.ctrl_read(offset)?;
        self.ctrl_write(offset, (old & 0xffff_0000) | credits)
    }

    pub fn channel_data_budget_bytes(&self, ch: u16) -> Result<u32, Error> {
        let offset = self.ch_offset(ch, REG_CH_FC2)?;
        let credits = self.ctrl_read(offset)? & 0xffff;
        Ok(credits << self.config().fc_scale_bits)
    }

    /// Set the in-flight data limit in bytes (rounded up to credits).
    pub fn set_channel_data_limit_bytes(&mut self, ch: u16, bytes: u32) -> Result<(), Error> {
        let credits = self.fc.credits_for(bytes);
        let offset = self.ch_offset(ch, REG_CH_FC3)?;
        self.ctrl_write(offset, credits)
    }

    pub fn channel_data_limit_bytes(&self, ch: u16) -> Result<u64, Error> {
        let offset = self.ch_offset(ch, REG_CH_FC3)?;
        Ok((self.ctrl_read(offset)? as u64) << self.config().fc_scale_bits)
    }
}
