use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerPoolError {
    #[error("worker pool is not running")]
    NotRunning,
    #[error("worker pool queue is at capacity; job dropped")]
    QueueFull,
}

pub type Result<T> = std::result::Result<T, WorkerPoolError>;
