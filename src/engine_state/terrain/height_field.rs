//! Immutable 2D grid of heights.

/// A `width` x `height` window of scalar samples plus the extremes observed in it.
///
/// Samples are addressed by `(x, y)` with `x` along the window's width. Reads outside the
/// window return `None` rather than panicking.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    values: Vec<f32>,
    min_value: f32,
    max_value: f32,
}

impl HeightField {
    /// Builds a field from row-major values (`values[y * width + x]`).
    ///
    /// Missing values are filled with zero and surplus values are dropped, so the field
    /// always covers exactly `width * height` samples.
    pub fn from_values(width: usize, height: usize, mut values: Vec<f32>) -> Self {
        values.resize(width * height, 0.0);
        let (min_value, max_value) = values
            .iter()
            .fold((f32::MAX, f32::MIN), |(min, max), &v| (min.min(v), max.max(v)));
        Self {
            width,
            height,
            values,
            min_value,
            max_value,
        }
    }

    /// A field where every sample is `value`.
    pub fn flat(width: usize, height: usize, value: f32) -> Self {
        Self::from_values(width, height, vec![value; width * height])
    }

    /// Number of samples along x.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of samples along y.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Smallest sample in the window.
    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    /// Largest sample in the window.
    pub fn max_value(&self) -> f32 {
        self.max_value
    }

    /// All samples in row-major order.
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// The sample at `(x, y)`, or `None` outside the window.
    pub fn get(&self, x: i32, y: i32) -> Option<f32> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.values[y as usize * self.width + x as usize])
    }

    /// The sample at `(x, y)`, or `0.0` outside the window.
    pub fn get_or_zero(&self, x: i32, y: i32) -> f32 {
        self.get(x, y).unwrap_or(0.0)
    }

    /// Position `(x, y)` of the largest sample. Ties resolve to the first in row-major order.
    pub fn argmax(&self) -> (usize, usize) {
        let index = self
            .values
            .iter()
            .enumerate()
            .fold(0, |best, (i, &v)| if v > self.values[best] { i } else { best });
        match self.width {
            0 => (0, 0),
            width => (index % width, index / width),
        }
    }

    /// Applies `f` to every sample, recomputing the extremes.
    pub fn map(&self, mut f: impl FnMut(usize, usize, f32) -> f32) -> HeightField {
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(i, &v)| f(i % self.width.max(1), i / self.width.max(1), v))
            .collect();
        Self::from_values(self.width, self.height, values)
    }
}
