use strand_kernel::{KernelError, ThreadHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("thread {0} is already being joined")]
    AlreadyJoined(ThreadHandle),

    #[error("no such thread: {0}")]
    NoSuchThread(ThreadHandle),

    #[error("thread {0} cannot join itself")]
    JoinSelf(ThreadHandle),

    #[error("thread library is not initialized")]
    NotInitialized,

    #[error("thread library is already initialized")]
    AlreadyInitialized,

    #[error("invalid stack size: {0}")]
    InvalidStackSize(usize),

    #[error("kernel error: {0}")]
    Kernel(#[from] KernelError),
}

impl ThreadError {
    /// Negative status code for callers that speak integers.
    pub fn code(&self) -> i32 {
        match self {
            ThreadError::AlreadyJoined(_) => -1,
            ThreadError::NoSuchThread(_) => -2,
            ThreadError::JoinSelf(_) => -3,
            ThreadError::NotInitialized => -4,
            ThreadError::AlreadyInitialized => -5,
            ThreadError::InvalidStackSize(_) => -6,
            ThreadError::Kernel(_) => -7,
        }
    }
}
