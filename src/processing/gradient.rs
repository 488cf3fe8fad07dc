use serde::{Deserialize, Serialize};

use crate::state::grid_buffer::GridBuffer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradientDirection {
    /// Values ramp with the row index `x`.
    #[default]
    X,
    /// Values ramp with the in-row index `y`.
    Y,
}

/// Linear ramp from `z_min` at the first row/column to `z_max` at the last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientSpec {
    pub z_min: f64,
    pub z_max: f64,
    pub direction: GradientDirection,
}

impl GradientSpec {
    pub fn new(z_min: f64, z_max: f64, direction: GradientDirection) -> Self {
        Self { z_min, z_max, direction }
    }

    /// Value at position `i` of `n` along the ramp. A ramp of one step is flat at `z_min`.
    pub fn value_at(&self, i: usize, n: usize) -> f64 {
        if n <= 1 {
            return self.z_min;
        }
        self.z_min + i as f64 * (self.z_max - self.z_min) / (n - 1) as f64
    }

    /// Overwrite every addressable cell of `grid` with the ramp.
    pub fn fill(&self, grid: &mut GridBuffer) {
        let (width, height) = (grid.width(), grid.height());
        let data = grid.as_mut_slice();
        for x in 0..width {
            for y in 0..height {
                let Some(cell) = data.get_mut(x * height + y) else {
                    return;
                };
                *cell = match self.direction {
                    GradientDirection::X => self.value_at(x, width),
                    GradientDirection::Y => self.value_at(y, height),
                };
            }
        }
    }
}
