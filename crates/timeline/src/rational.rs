//! Exact frame-based time values.
//!
//! A `RationalTime` is a frame count at a rational frame rate, so
//! `frames * rate_den / rate_num` seconds. Conversions between rates are
//! exact or they fail; rounding only happens when a caller asks for it.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;

use crate::{Frame, TimelineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRate")]
pub struct Rate {
    num: i32,
    den: i32,
}

#[derive(Deserialize)]
struct RawRate {
    num: i32,
    den: i32,
}

impl TryFrom<RawRate> for Rate {
    type Error = TimelineError;

    fn try_from(raw: RawRate) -> Result<Self, Self::Error> {
        Rate::new(raw.num, raw.den)
    }
}

impl Rate {
    pub const FPS_23_976: Rate = Rate { num: 24000, den: 1001 };
    pub const FPS_24: Rate = Rate { num: 24, den: 1 };
    pub const FPS_25: Rate = Rate { num: 25, den: 1 };
    pub const FPS_29_97: Rate = Rate { num: 30000, den: 1001 };
    pub const FPS_30: Rate = Rate { num: 30, den: 1 };
    pub const FPS_60: Rate = Rate { num: 60, den: 1 };
    pub const AUDIO_48K: Rate = Rate { num: 48000, den: 1 };

    pub fn new(num: i32, den: i32) -> Result<Self, TimelineError> {
        if num <= 0 || den <= 0 {
            return Err(TimelineError::InvalidRate {
                num: num as i64,
                den: den as i64,
            });
        }
        Ok(Self { num, den })
    }

    /// Validates rates read back from storage, where columns are 64-bit.
    pub fn from_columns(num: i64, den: i64) -> Result<Self, TimelineError> {
        match (i32::try_from(num), i32::try_from(den)) {
            (Ok(n), Ok(d)) => Rate::new(n, d),
            _ => Err(TimelineError::InvalidRate { num, den }),
        }
    }

    pub const fn num(&self) -> i32 {
        self.num
    }

    pub const fn den(&self) -> i32 {
        self.den
    }

    /// Frames per second, for display only.
    pub fn fps(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// How to land on a frame boundary when a conversion is not exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Refuse any conversion that would drop precision.
    #[default]
    Exact,
    /// Nearest frame, halves away from negative infinity.
    Nearest,
    Floor,
    Ceil,
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "RawRationalTime")]
pub struct RationalTime {
    frames: Frame,
    rate_num: i32,
    rate_den: i32,
}

#[derive(Deserialize)]
struct RawRationalTime {
    frames: i64,
    rate_num: i32,
    rate_den: i32,
}

impl TryFrom<RawRationalTime> for RationalTime {
    type Error = TimelineError;

    fn try_from(raw: RawRationalTime) -> Result<Self, Self::Error> {
        RationalTime::new(raw.frames, raw.rate_num, raw.rate_den)
    }
}

impl RationalTime {
    pub fn new(frames: Frame, rate_num: i32, rate_den: i32) -> Result<Self, TimelineError> {
        let rate = Rate::new(rate_num, rate_den)?;
        Ok(Self::at(frames, rate))
    }

    pub const fn at(frames: Frame, rate: Rate) -> Self {
        Self {
            frames,
            rate_num: rate.num,
            rate_den: rate.den,
        }
    }

    pub const fn zero(rate: Rate) -> Self {
        Self::at(0, rate)
    }

    /// Milliseconds to frames at `rate`, rounded with `mode`.
    pub fn from_milliseconds(
        millis: i64,
        rate: Rate,
        mode: RoundingMode,
    ) -> Result<Self, TimelineError> {
        let numer = millis as i128 * rate.num as i128;
        let denom = 1000i128 * rate.den as i128;
        let frames = divide(numer, denom, mode).ok_or(TimelineError::RateConversion {
            frames: millis,
            from: Rate { num: 1000, den: 1 },
            to: rate,
        })?;
        let frames = Frame::try_from(frames).map_err(|_| TimelineError::Overflow)?;
        Ok(Self::at(frames, rate))
    }

    pub const fn frames(&self) -> Frame {
        self.frames
    }

    pub const fn rate(&self) -> Rate {
        Rate {
            num: self.rate_num,
            den: self.rate_den,
        }
    }

    pub const fn rate_num(&self) -> i32 {
        self.rate_num
    }

    pub const fn rate_den(&self) -> i32 {
        self.rate_den
    }

    pub fn is_zero(&self) -> bool {
        self.frames == 0
    }

    pub fn is_negative(&self) -> bool {
        self.frames < 0
    }

    /// Same rate, `delta` frames later.
    pub fn offset(&self, delta: Frame) -> Result<Self, TimelineError> {
        let frames = self
            .frames
            .checked_add(delta)
            .ok_or(TimelineError::Overflow)?;
        Ok(self.with_frames(frames))
    }

    /// Same rate, a different frame count.
    pub fn with_frames(&self, frames: Frame) -> Self {
        Self::at(frames, self.rate())
    }

    pub fn rescale(&self, num: i32, den: i32) -> Result<Self, TimelineError> {
        self.rescale_with(Rate::new(num, den)?, RoundingMode::Exact)
    }

    pub fn rescale_to(&self, rate: Rate) -> Result<Self, TimelineError> {
        self.rescale_with(rate, RoundingMode::Exact)
    }

    /// Re-expresses the same instant at `rate`.
    pub fn rescale_with(&self, rate: Rate, mode: RoundingMode) -> Result<Self, TimelineError> {
        if rate == self.rate() {
            return Ok(*self);
        }
        let numer = self.frames as i128 * rate.num as i128 * self.rate_den as i128;
        let denom = self.rate_num as i128 * rate.den as i128;
        let frames = divide(numer, denom, mode).ok_or(TimelineError::RateConversion {
            frames: self.frames,
            from: self.rate(),
            to: rate,
        })?;
        let frames = Frame::try_from(frames).map_err(|_| TimelineError::Overflow)?;
        Ok(Self::at(frames, rate))
    }

    /// `self + other`, with `other` first rescaled exactly to `self`'s rate.
    pub fn try_add(&self, other: RationalTime) -> Result<Self, TimelineError> {
        let other = other.rescale_to(self.rate())?;
        let frames = self
            .frames
            .checked_add(other.frames)
            .ok_or(TimelineError::Overflow)?;
        Ok(self.with_frames(frames))
    }

    /// `self - other`, with `other` first rescaled exactly to `self`'s rate.
    pub fn try_sub(&self, other: RationalTime) -> Result<Self, TimelineError> {
        let other = other.rescale_to(self.rate())?;
        let frames = self
            .frames
            .checked_sub(other.frames)
            .ok_or(TimelineError::Overflow)?;
        Ok(self.with_frames(frames))
    }

    /// Seconds as a float, for display only.
    pub fn seconds(&self) -> f64 {
        self.frames as f64 * self.rate_den as f64 / self.rate_num as f64
    }

    fn cross(&self, other: &RationalTime) -> (i128, i128) {
        let lhs = self.frames as i128 * self.rate_den as i128 * other.rate_num as i128;
        let rhs = other.frames as i128 * other.rate_den as i128 * self.rate_num as i128;
        (lhs, rhs)
    }
}

fn divide(numer: i128, denom: i128, mode: RoundingMode) -> Option<i128> {
    let quotient = numer.div_euclid(denom);
    let remainder = numer.rem_euclid(denom);
    if remainder == 0 {
        return Some(quotient);
    }
    match mode {
        RoundingMode::Exact => None,
        RoundingMode::Floor => Some(quotient),
        RoundingMode::Ceil => Some(quotient + 1),
        RoundingMode::Nearest => {
            if remainder * 2 >= denom {
                Some(quotient + 1)
            } else {
                Some(quotient)
            }
        }
    }
}

impl PartialEq for RationalTime {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RationalTime {}

impl PartialOrd for RationalTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RationalTime {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs) = self.cross(other);
        lhs.cmp(&rhs)
    }
}

impl Neg for RationalTime {
    type Output = RationalTime;

    fn neg(self) -> Self::Output {
        self.with_frames(self.frames.saturating_neg())
    }
}

impl fmt::Debug for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.frames, self.rate_num, self.rate_den)
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescale_to_integer_multiple_is_exact() {
        let t = RationalTime::new(1, 24, 1).unwrap();
        assert_eq!(t.rescale(48, 1).unwrap().frames(), 2);

        let audio = RationalTime::new(3, 24, 1)
            .unwrap()
            .rescale_to(Rate::AUDIO_48K)
            .unwrap();
        assert_eq!(audio.frames(), 6000);
    }

    #[test]
    fn rescale_to_same_rate_is_identity() {
        let t = RationalTime::new(1, 24000, 1001).unwrap();
        assert_eq!(t.rescale(24000, 1001).unwrap().frames(), 1);
    }

    #[test]
    fn lossy_rescale_fails_unless_rounding_requested() {
        let t = RationalTime::new(1, 24000, 1001).unwrap();
        let err = t.rescale(30, 1).unwrap_err();
        assert!(matches!(err, TimelineError::RateConversion { .. }));

        let nearest = t.rescale_with(Rate::FPS_30, RoundingMode::Nearest).unwrap();
        assert_eq!(nearest.frames(), 1);
        let floor = t.rescale_with(Rate::FPS_30, RoundingMode::Floor).unwrap();
        assert_eq!(floor.frames(), 1);
        let ceil = t.rescale_with(Rate::FPS_30, RoundingMode::Ceil).unwrap();
        assert_eq!(ceil.frames(), 2);
    }

    #[test]
    fn arithmetic_rescales_right_operand_to_left_rate() {
        let a = RationalTime::new(10, 48, 1).unwrap();
        let b = RationalTime::new(2, 24, 1).unwrap();
        let sum = a.try_add(b).unwrap();
        assert_eq!(sum.frames(), 14);
        assert_eq!(sum.rate(), Rate::new(48, 1).unwrap());
        assert_eq!(a.try_sub(b).unwrap().frames(), 6);
        assert_eq!((-b).frames(), -2);
    }

    #[test]
    fn offset_reports_overflow() {
        let t = RationalTime::at(40, Rate::FPS_30);
        assert_eq!(t.offset(-45).unwrap().frames(), -5);
        assert_eq!(t.offset(Frame::MAX), Err(TimelineError::Overflow));
        assert_eq!(
            RationalTime::at(-1, Rate::FPS_30).offset(Frame::MIN),
            Err(TimelineError::Overflow)
        );
    }

    #[test]
    fn comparison_is_by_instant() {
        let a = RationalTime::new(1, 24, 1).unwrap();
        let b = RationalTime::new(2, 48, 1).unwrap();
        let c = RationalTime::new(3, 48, 1).unwrap();
        assert_eq!(a, b);
        assert!(a < c);
        assert!(c > b);
        assert!(a <= b && a >= b);
    }

    #[test]
    fn invalid_rates_are_rejected() {
        assert!(RationalTime::new(1, 0, 1).is_err());
        assert!(RationalTime::new(1, 24, -1).is_err());
        let parsed: Result<RationalTime, _> =
            serde_json::from_str(r#"{"frames": 5, "rate_num": 0, "rate_den": 1}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn milliseconds_resolve_with_requested_rounding() {
        let t = RationalTime::from_milliseconds(1000, Rate::FPS_30, RoundingMode::Exact).unwrap();
        assert_eq!(t.frames(), 30);
        assert!(RationalTime::from_milliseconds(10, Rate::FPS_30, RoundingMode::Exact).is_err());
        let t = RationalTime::from_milliseconds(50, Rate::FPS_30, RoundingMode::Nearest).unwrap();
        assert_eq!(t.frames(), 2);
    }
}
