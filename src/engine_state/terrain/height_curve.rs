//! Keyframe curve used to remap normalized noise into heights.
//!
//! The curve is a plain value: evaluating it never mutates anything, so worker threads can
//! share one instance freely.

use serde::{Deserialize, Serialize};

/// A single keyframe of a `HeightCurve`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Input value at which the key sits.
    pub time: f32,
    /// Output value at `time`.
    pub value: f32,
}

impl CurveKey {
    /// Creates a keyframe.
    pub fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

/// Piecewise-linear curve through a sorted list of keys.
///
/// Inputs before the first key or after the last key evaluate to that key's value. An empty
/// curve evaluates to zero everywhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeightCurve {
    keys: Vec<CurveKey>,
}

impl Default for HeightCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl HeightCurve {
    /// Creates a curve from keys in any order.
    pub fn new(keys: Vec<CurveKey>) -> Self {
        let mut curve = Self { keys };
        curve.validate();
        curve
    }

    /// The identity ramp from (0, 0) to (1, 1).
    pub fn linear() -> Self {
        Self::new(vec![CurveKey::new(0.0, 0.0), CurveKey::new(1.0, 1.0)])
    }

    /// A curve returning `value` for every input.
    pub fn constant(value: f32) -> Self {
        Self::new(vec![CurveKey::new(0.0, value)])
    }

    /// The keys, sorted by time.
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Drops non-finite keys and sorts the rest by time.
    ///
    /// Deserialized curves must be validated before `evaluate` is called.
    pub fn validate(&mut self) {
        self.keys
            .retain(|key| key.time.is_finite() && key.value.is_finite());
        self.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    /// Evaluates the curve at `time`.
    pub fn evaluate(&self, time: f32) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        // First key strictly after `time`; guaranteed to be in 1..len by the checks above.
        let upper = self.keys.partition_point(|key| key.time <= time);
        let a = self.keys[upper - 1];
        let b = self.keys[upper];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return b.value;
        }
        let t = (time - a.time) / span;
        a.value + (b.value - a.value) * t
    }
}
