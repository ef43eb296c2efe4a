//! Transcode job execution.
//!
//! The orchestrator accepts jobs, the worker pool bounds how many run at
//! once, and the invoker drives ffmpeg for a single job. Job state lives
//! entirely in the database; nothing here holds job state in memory.

pub mod invoker;
pub mod orchestrator;
pub mod pool;
pub mod profile;

pub use invoker::EncodeInvoker;
pub use orchestrator::JobOrchestrator;
pub use pool::WorkerPool;
