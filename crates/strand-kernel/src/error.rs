use crate::types::ThreadHandle;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KernelError {
    #[error("no such thread: {0}")]
    NoSuchThread(ThreadHandle),

    #[error("thread {0} is not descheduled")]
    NotBlocked(ThreadHandle),

    #[error("thread creation failed: {0}")]
    Spawn(#[from] std::io::Error),
}
