use thiserror::Error;

/// Errors returned by the TDMA overlay blocks.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration validation failed.
    #[error("config: {0}")]
    Config(String),
    /// Register offset does not map to any register in the block.
    #[error("invalid register offset {0:#x}")]
    InvalidRegister(u32),
    /// Control channel index outside the configured count.
    #[error("invalid control channel {0}")]
    InvalidChannel(u32),
    /// Forwarding into the scheduler control stream failed.
    #[error("scheduler control stream: {0}")]
    Sched(#[from] schedline::Error),
}
