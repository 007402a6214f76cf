use serde::{Deserialize, Serialize};

use crate::{Frame, Rate, RationalTime, RoundingMode, TimelineError};

/// A time value as a caller supplied it, before it is pinned to a rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingInput {
    /// Frames in whatever rate the value is resolved against.
    Frames(Frame),
    /// Wall-clock milliseconds, rounded to the nearest frame on resolve.
    Milliseconds(i64),
    Rational(RationalTime),
}

impl TimingInput {
    pub fn from_frames(frames: Frame) -> Self {
        TimingInput::Frames(frames)
    }

    pub fn from_milliseconds(millis: i64) -> Self {
        TimingInput::Milliseconds(millis)
    }

    /// Pins the value to `rate`. Rational inputs must convert exactly.
    pub fn resolve(&self, rate: Rate) -> Result<RationalTime, TimelineError> {
        match *self {
            TimingInput::Frames(frames) => Ok(RationalTime::at(frames, rate)),
            TimingInput::Milliseconds(millis) => {
                RationalTime::from_milliseconds(millis, rate, RoundingMode::Nearest)
            }
            TimingInput::Rational(time) => time.rescale_to(rate),
        }
    }

    pub fn resolve_frames(&self, rate: Rate) -> Result<Frame, TimelineError> {
        Ok(self.resolve(rate)?.frames())
    }
}

impl From<RationalTime> for TimingInput {
    fn from(time: RationalTime) -> Self {
        TimingInput::Rational(time)
    }
}
