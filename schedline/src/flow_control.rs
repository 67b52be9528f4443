//! Per-channel flow-control accounting.
//!
//! A channel is one (port, traffic class) pair. The accountant tracks
//! packets between fetch issue and fetch completion, packets and byte
//! credits between fetch completion and transmit finish, and refreshes a
//! small grant window each cycle. All counters are wrapping; in-flight
//! figures are modular differences, so the counters themselves never
//! saturate or go negative.

/// Grant window sizes tried from largest to smallest on each refresh.
const GRANT_STEPS: [u16; 4] = [8, 4, 2, 1];

/// Flow-control state for a single channel.
#[derive(Debug, Clone)]
pub(crate) struct ChannelFc {
    pub enabled: bool,
    /// Destination hint carried on TX requests issued through this channel.
    pub dest: u16,
    /// Packet budget register. Write/read only: the original device carries
    /// this register without consuming it, and it is preserved here with
    /// the same (absent) behavior.
    pub pkt_budget: u16,
    /// Estimated credits per fetch, used to bound speculative fetches.
    pub data_budget: u16,
    /// Maximum packets in flight (fetch + tx windows).
    pub pkt_limit: u16,
    /// Maximum credits in the tx window.
    pub data_limit: u32,

    // Wrapping event counters.
    fetch_issue: u16,
    fetch_done: u16,
    tx_start: u16,
    tx_done: u16,
    credits_start: u32,
    credits_done: u32,

    // Grant window: consumed count and refreshed limit.
    fetch_fc_cnt: u16,
    fetch_fc_lim: u16,
}

impl ChannelFc {
    fn new(dest: u16, data_budget: u16) -> Self {
        Self {
            enabled: false,
            dest,
            pkt_budget: 0,
            data_budget,
            pkt_limit: u16::MAX,
            data_limit: u32::MAX,
            fetch_issue: 0,
            fetch_done: 0,
            tx_start: 0,
            tx_done: 0,
            credits_start: 0,
            credits_done: 0,
            fetch_fc_cnt: 0,
            fetch_fc_lim: 0,
        }
    }

    /// Packets in the fetch window (issued, not yet dequeued/started).
    #[inline]
    pub fn pkts_in_fetch(&self) -> u16 {
        self.fetch_issue.wrapping_sub(self.fetch_done)
    }

    /// Packets in the tx window (started, not yet finished).
    #[inline]
    pub fn pkts_in_tx(&self) -> u16 {
        self.tx_start.wrapping_sub(self.tx_done)
    }

    /// Credits in the tx window.
    #[inline]
    pub fn credits_in_tx(&self) -> u32 {
        self.credits_start.wrapping_sub(self.credits_done)
    }

    /// Whether the grant window allows another fetch.
    #[inline]
    pub fn fc_available(&self) -> bool {
        self.fetch_fc_lim.wrapping_sub(self.fetch_fc_cnt) as i16 > 0
    }

    /// Recompute the grant window: the largest step k such that k more
    /// fetches stay within both the packet and the data limit. The data
    /// side charges `data_budget` credits per speculative fetch on top of
    /// what the tx window already holds.
    pub fn refresh(&mut self) {
        let in_fetch = self.pkts_in_fetch() as u64;
        let in_tx = self.pkts_in_tx() as u64;
        let credits = self.credits_in_tx() as u64;
        let mut grant = 0u16;
        for &k in &GRANT_STEPS {
            let pkts_ok = in_fetch + in_tx + k as u64 <= self.pkt_limit as u64;
            let data_ok =
                (in_fetch + k as u64) * self.data_budget as u64 + credits <= self.data_limit as u64;
            if pkts_ok && data_ok {
                grant = k;
                break;
            }
        }
        self.fetch_fc_lim = self.fetch_fc_cnt.wrapping_add(grant);
    }

    /// A request was admitted: one fetch enters the window.
    pub fn fetch_consume(&mut self) {
        self.fetch_issue = self.fetch_issue.wrapping_add(1);
        self.fetch_fc_cnt = self.fetch_fc_cnt.wrapping_add(1);
    }

    /// The fetch produced nothing on the wire (schedule fail, dequeue
    /// fail, or fetch error): return the reservation.
    pub fn fetch_release(&mut self) {
        self.fetch_done = self.fetch_done.wrapping_add(1);
    }

    /// A fetch started moving bytes: shift accounting from the fetch
    /// window to the tx window and capture the actual length.
    pub fn tx_consume(&mut self, credits: u32) {
        self.fetch_done = self.fetch_done.wrapping_add(1);
        self.tx_start = self.tx_start.wrapping_add(1);
        self.credits_start = self.credits_start.wrapping_add(credits);
    }

    /// A frame finished: return its packet and credits.
    pub fn tx_release(&mut self, credits: u32) {
        self.tx_done = self.tx_done.wrapping_add(1);
        self.credits_done = self.credits_done.wrapping_add(credits);
    }

    /// Any packets in flight on this channel.
    #[inline]
    pub fn active(&self) -> bool {
        self.pkts_in_fetch() > 0 || self.pkts_in_tx() > 0
    }
}

/// Accountant over all channels of one scheduler.
pub(crate) struct FlowControl {
    channels: Vec<ChannelFc>,
    fc_scale_bits: u8,
}

impl FlowControl {
    pub fn new(channel_count: usize, fc_scale_bits: u8, dest_default: u16, max_tx_size: u32) -> Self {
        let mut fc = Self {
            channels: Vec::with_capacity(channel_count),
            fc_scale_bits,
        };
        let budget = fc.credits_for(max_tx_size).min(u16::MAX as u32) as u16;
        for _ in 0..channel_count {
            fc.channels.push(ChannelFc::new(dest_default, budget));
        }
        fc
    }

    /// Convert a byte length to whole credits, rounding up.
    #[inline]
    pub fn credits_for(&self, bytes: u32) -> u32 {
        let scale = 1u32 << self.fc_scale_bits;
        bytes.div_ceil(scale)
    }

    #[inline]
    pub fn channel(&self, ch: u16) -> &ChannelFc {
        &self.channels[ch as usize]
    }

    #[inline]
    pub fn channel_mut(&mut self, ch: u16) -> &mut ChannelFc {
        &mut self.channels[ch as usize]
    }

    /// Per-cycle grant window refresh for every channel.
    pub fn refresh(&mut self) {
        for ch in &mut self.channels {
            ch.refresh();
        }
    }
}
