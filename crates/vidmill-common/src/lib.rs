//! Shared building blocks for vidmill.
//!
//! This crate holds the pieces every other crate needs: the common error
//! type, typed ID wrappers, and the transcode target value types.

pub mod error;
pub mod ids;
pub mod types;

pub use error::{Error, Result};
pub use ids::{JobId, UserId, VideoId};
pub use types::{TargetResolution, TargetSpec, VideoFormat};
