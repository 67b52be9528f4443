use thiserror::Error;

/// Errors returned by the scheduler core.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration validation failed.
    #[error("config: {0}")]
    Config(String),
    /// Queue index outside the configured queue count.
    #[error("invalid queue index {0}")]
    InvalidQueue(u32),
    /// Channel index outside port_count * tc_count.
    #[error("invalid channel index {0}")]
    InvalidChannel(u32),
    /// Register offset does not map to any register in the block.
    #[error("invalid register offset {0:#x}")]
    InvalidRegister(u32),
    /// Doorbell input FIFO is full; the producer must retry.
    #[error("doorbell FIFO full")]
    DoorbellFifoFull,
    /// Control stream input FIFO is full; the producer must retry.
    #[error("control FIFO full")]
    CtrlFifoFull,
    /// A status input FIFO is full; the producer must retry.
    #[error("status FIFO full")]
    StatusFifoFull,
    /// A register access is already posted and not yet drained.
    #[error("register access in flight")]
    RegisterBusy,
}
