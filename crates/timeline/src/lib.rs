use thiserror::Error;

mod ids;
pub use ids::*;
mod rational;
pub use rational::*;
mod clip;
pub use clip::*;
mod mutation;
pub use mutation::*;
mod pending;
pub use pending::*;
mod occlusion;
pub use occlusion::*;
mod edit_operations;
pub use edit_operations::*;
mod timing;
pub use timing::*;
mod notify;
pub use notify::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("invalid frame rate {num}/{den}")]
    InvalidRate { num: i64, den: i64 },
    #[error("cannot express {frames} frames at {from} in {to} without rounding")]
    RateConversion { frames: i64, from: Rate, to: Rate },
    #[error("frame arithmetic overflow")]
    Overflow,
    #[error("invalid operation: {0}")]
    Validation(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("clip not found: {0}")]
    ClipNotFound(ClipId),
}

/// A frame count in a sequence's rate. Always non-negative when used as a position.
pub type Frame = i64;
