/// Configuration for a scheduler instance.
#[derive(Clone)]
pub struct Config {
    /// Queue index width in bits. The scheduler manages 2^queue_index_bits queues.
    pub queue_index_bits: u32,
    /// Arbiter pipeline depth. Admit and commit are separated by
    /// `pipeline - 1` cycles. Minimum 2.
    pub pipeline: usize,
    /// Number of operation table slots (maximum concurrent in-flight requests).
    pub op_table_size: usize,
    /// Traffic classes per port.
    pub tc_count: u8,
    /// Number of egress ports this scheduler feeds.
    pub port_count: u8,
    /// Flow-control credit scale exponent: 1 credit = 2^fc_scale_bits bytes.
    pub fc_scale_bits: u8,
    /// Maximum transmit frame size in bytes. Seeds the per-channel data
    /// budget (rounded up to whole credits).
    pub max_tx_size: u32,
    /// Destination hint carried on TX requests for channels whose dest
    /// register has not been written.
    pub req_dest_default: u16,
    /// Doorbell input FIFO depth.
    pub doorbell_fifo: usize,
    /// Control stream input FIFO depth.
    pub ctrl_fifo: usize,
    /// Value reported by the register block's offset register (distance
    /// from the block base to the queue command region).
    pub queue_region_offset: u32,
    /// Next-pointer reported in the register block header. 0 = end of chain.
    pub rb_next_ptr: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_index_bits: 6,
            pipeline: 3,
            op_table_size: 32,
            tc_count: 1,
            port_count: 1,
            fc_scale_bits: 6,
            max_tx_size: 9216,
            req_dest_default: 0,
            doorbell_fifo: 256,
            ctrl_fifo: 64,
            queue_region_offset: 0x1000,
            rb_next_ptr: 0,
        }
    }
}

impl Config {
    /// Number of queues (2^queue_index_bits).
    pub fn queue_count(&self) -> usize {
        1 << self.queue_index_bits
    }

    /// Number of flow-control channels (port_count * tc_count).
    pub fn channel_count(&self) -> usize {
        self.port_count as usize * self.tc_count as usize
    }

    /// Validate configuration values. Returns an error if any value is out of range.
    pub fn validate(&self) -> Result<(), crate::error::Error> {
        if self.queue_index_bits == 0 || self.queue_index_bits > 16 {
            return Err(crate::error::Error::Config(
                "queue_index_bits must be in 1..=16".into(),
            ));
        }
        if self.pipeline < 2 || self.pipeline > 8 {
            return Err(crate::error::Error::Config(
                "pipeline must be in 2..=8".into(),
            ));
        }
        if self.op_table_size < 2 || self.op_table_size > u16::MAX as usize {
            return Err(crate::error::Error::Config(
                "op_table_size must be in 2..=65535".into(),
            ));
        }
        if self.tc_count == 0 || self.tc_count > 8 {
            return Err(crate::error::Error::Config(
                "tc_count must be in 1..=8".into(),
            ));
        }
        if self.port_count == 0 || self.port_count > 4 {
            return Err(crate::error::Error::Config(
                "port_count must be in 1..=4 (packed status carries one byte per port)".into(),
            ));
        }
        if self.fc_scale_bits > 15 {
            return Err(crate::error::Error::Config(
                "fc_scale_bits must be <= 15".into(),
            ));
        }
        if self.max_tx_size == 0 {
            return Err(crate::error::Error::Config(
                "max_tx_size must be > 0".into(),
            ));
        }
        if self.doorbell_fifo == 0 || self.ctrl_fifo == 0 {
            return Err(crate::error::Error::Config(
                "input FIFO depths must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`Config`] with discoverable methods and `build()` validation.
///
/// # Example
///
/// ```rust
/// use schedline::ConfigBuilder;
///
/// let config = ConfigBuilder::default()
///     .queue_index_bits(4)
///     .ports(1, 1)
///     .pipeline(2)
///     .op_table_size(16)
///     .fc_scale_bits(6)
///     .build()
///     .expect("invalid config");
/// ```
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default config values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the queue index width in bits (queue count is 2^bits).
    pub fn queue_index_bits(mut self, bits: u32) -> Self {
        self.config.queue_index_bits = bits;
        self
    }

    /// Set the arbiter pipeline depth.
    pub fn pipeline(mut self, depth: usize) -> Self {
        self.config.pipeline = depth;
        self
    }

    /// Set the operation table size (maximum in-flight requests).
    pub fn op_table_size(mut self, n: usize) -> Self {
        self.config.op_table_size = n;
        self
    }

    /// Set the port and traffic-class fan-out.
    pub fn ports(mut self, port_count: u8, tc_count: u8) -> Self {
        self.config.port_count = port_count;
        self.config.tc_count = tc_count;
        self
    }

    /// Set the flow-control credit scale exponent.
    pub fn fc_scale_bits(mut self, bits: u8) -> Self {
        self.config.fc_scale_bits = bits;
        self
    }

    /// Set the maximum transmit frame size in bytes.
    pub fn max_tx_size(mut self, bytes: u32) -> Self {
        self.config.max_tx_size = bytes;
        self
    }

    /// Set the default TX request destination hint.
    pub fn req_dest_default(mut self, dest: u16) -> Self {
        self.config.req_dest_default = dest;
        self
    }

    /// Set the doorbell input FIFO depth.
    pub fn doorbell_fifo(mut self, depth: usize) -> Self {
        self.config.doorbell_fifo = depth;
        self
    }

    /// Set the control stream input FIFO depth.
    pub fn ctrl_fifo(mut self, depth: usize) -> Self {
        self.config.ctrl_fifo = depth;
        self
    }

    /// Set the reported queue region offset.
    pub fn queue_region_offset(mut self, offset: u32) -> Self {
        self.config.queue_region_offset = offset;
        self
    }

    /// Set the register block next-pointer.
    pub fn rb_next_ptr(mut self, ptr: u32) -> Self {
        self.config.rb_next_ptr = ptr;
        self
    }

    /// Get mutable access to the underlying config for fields not covered
    /// by builder methods.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Validate and build the final [`Config`].
    pub fn build(self) -> Result<Config, crate::error::Error> {
        self.config.validate()?;
        Ok(self.config)
    }
}
