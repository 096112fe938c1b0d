use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HeightMapError {
    #[error("height map must be at least 1x1, got {width}x{height}")]
    Empty { width: usize, height: usize },
    #[error("height map of {width}x{height} needs {expected} samples, got {actual}")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected: usize,
        actual: usize,
    },
}

/// Row-major grid of heights in meters covering one tile. Row 0 is the
/// northern edge and column 0 the western edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightMap {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl HeightMap {
    pub fn new(width: usize, height: usize, samples: Vec<f32>) -> Result<Self, HeightMapError> {
        if width == 0 || height == 0 {
            return Err(HeightMapError::Empty { width, height });
        }
        let expected = width * height;
        if samples.len() != expected {
            return Err(HeightMapError::SizeMismatch {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }
    pub fn flat(width: usize, height: usize, value: f32) -> Result<Self, HeightMapError> {
        Self::new(width, height, vec![value; width * height])
    }
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }

    fn at(&self, column: usize, row: usize) -> f64 {
        let index = row.min(self.height - 1) * self.width + column.min(self.width - 1);
        self.samples.get(index).copied().map(f64::from).unwrap_or(0.0)
    }

    /// Bilinear sample at `u` (west to east) and `v` (north to south), both
    /// clamped to `[0, 1]`.
    pub fn sample(&self, u: f64, v: f64) -> f64 {
        let x = u.clamp(0.0, 1.0) * (self.width - 1) as f64;
        let y = v.clamp(0.0, 1.0) * (self.height - 1) as f64;
        let column = x.floor() as usize;
        let row = y.floor() as usize;
        let fx = x - column as f64;
        let fy = y - row as f64;
        let top = self.at(column, row) * (1.0 - fx) + self.at(column + 1, row) * fx;
        let bottom = self.at(column, row + 1) * (1.0 - fx) + self.at(column + 1, row + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }
}
