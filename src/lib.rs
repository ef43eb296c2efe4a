//! Vidmill: asynchronous video transcode job orchestration.
//!
//! Callers upload videos and submit transcode jobs over HTTP; jobs queue
//! through a bounded worker pool and run ffmpeg synchronously on worker
//! threads, with all job state persisted in SQLite.

pub mod config;
pub mod probe;
pub mod server;
pub mod transcode;
