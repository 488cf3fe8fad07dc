use crate::error::{MatrixError, Result};

/// Sentinel stored in cells that hold no data.
pub const BLANK: f64 = f64::NAN;

/// A cell is blank when it holds NaN, an infinity, or the [`BLANK`] sentinel.
/// Blank cells stay addressable but never contribute to aggregates.
#[inline]
pub fn is_blank(value: f64) -> bool {
    !value.is_finite()
}

/// Owned row-major sample storage for a matrix.
///
/// `width` counts rows and `height` counts cells per row, so cell `(x, y)`
/// lives at `x * height + y`. The allocated sample count (`capacity`) is the
/// true length of the storage; `width * height` is the desired logical size
/// and may differ from it after a truncated load.
#[derive(Debug, Clone, Default)]
pub struct GridBuffer {
    data: Vec<f64>,
    width: usize,
    height: usize,
}

impl GridBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a buffer from already laid out samples. `data.len()` becomes the capacity.
    pub fn from_parts(width: usize, height: usize, data: Vec<f64>) -> Self {
        Self { data, width, height }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of samples actually allocated.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Desired logical size, `width * height`.
    pub fn logical_len(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// True when the allocation matches the logical shape.
    pub fn is_consistent(&self) -> bool {
        self.width.checked_mul(self.height) == Some(self.data.len())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Flat offset of cell `(x, y)`, or `None` when the cell is outside the
    /// current dimensions or past the allocated samples.
    pub fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let index = x.checked_mul(self.height)?.checked_add(y)?;
        (index < self.data.len()).then_some(index)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        self.index(x, y).map(|i| self.data[i])
    }

    pub fn set(&mut self, x: usize, y: usize, value: f64) -> Result<()> {
        match self.index(x, y) {
            Some(i) => {
                self.data[i] = value;
                Ok(())
            }
            None => Err(MatrixError::InvalidIndex {
                x: x as i64,
                y: y as i64,
                width: self.width,
                height: self.height,
            }),
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    /// Reallocate to exactly `new_size` samples, ignoring the shape.
    ///
    /// Growing zero-fills the new tail when `reinitialize` is set and leaves it
    /// blank otherwise. Shrinking never touches the surviving samples. On
    /// allocation failure the buffer is unchanged.
    pub fn resize_capacity(&mut self, new_size: usize, reinitialize: bool) -> Result<()> {
        if new_size > self.data.len() {
            self.grow_to(new_size, reinitialize)
        } else {
            self.shrink_to(new_size);
            Ok(())
        }
    }

    /// Change both dimensions, keeping the value at every `(x, y)` that exists
    /// in the old and the new shape.
    ///
    /// When the buffer is not consistent (see [`Self::is_consistent`]) the rows
    /// cannot be trusted, so only the allocation is adjusted. Cells that are
    /// new to the shape read as zero with `reinitialize` and blank without it.
    pub fn reshape(&mut self, new_width: usize, new_height: usize, reinitialize: bool) -> Result<()> {
        let invalid = MatrixError::InvalidDimensions {
            width: new_width,
            height: new_height,
        };
        if new_width == 0 || new_height == 0 {
            return Err(invalid);
        }
        let new_size = new_width.checked_mul(new_height).ok_or(invalid)?;

        let old_width = self.width;
        let old_height = self.height;
        let valid = self.is_consistent();

        // grow before moving rows so every destination exists
        if new_size > self.data.len() {
            self.grow_to(new_size, reinitialize)?;
        }

        let rows = new_width.min(old_width);
        let cols = new_height.min(old_height);

        if valid && old_height > 0 && new_height != old_height {
            // Row 0 never moves. Taller rows move last-first and shorter rows
            // first-last so no row lands on source data not yet copied.
            if new_height > old_height {
                for row in (1..rows).rev() {
                    let src = row * old_height;
                    self.data.copy_within(src..src + cols, row * new_height);
                }
            } else {
                for row in 1..rows {
                    let src = row * old_height;
                    self.data.copy_within(src..src + cols, row * new_height);
                }
            }
        }

        // cells new to the shape may still hold copies of moved rows
        if valid {
            let fill = if reinitialize { 0.0 } else { BLANK };
            for row in 0..rows {
                let start = row * new_height;
                self.data[start + cols..start + new_height].fill(fill);
            }
            self.data[rows * new_height..new_size].fill(fill);
        }

        // shrink only after the rows have been moved down
        if new_size < self.data.len() {
            self.shrink_to(new_size);
        }

        self.width = new_width;
        self.height = new_height;
        tracing::debug!(
            width = new_width,
            height = new_height,
            relocated = valid,
            "reshaped grid buffer"
        );
        Ok(())
    }

    fn grow_to(&mut self, new_size: usize, reinitialize: bool) -> Result<()> {
        let additional = new_size - self.data.len();
        if self.data.try_reserve_exact(additional).is_err() {
            tracing::error!(requested = new_size, current = self.data.len(), "matrix resize failed");
            return Err(MatrixError::OutOfMemory { requested: new_size });
        }
        let fill = if reinitialize { 0.0 } else { BLANK };
        self.data.resize(new_size, fill);
        Ok(())
    }

    fn shrink_to(&mut self, new_size: usize) {
        self.data.truncate(new_size);
        self.data.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential(width: usize, height: usize) -> GridBuffer {
        let data = (0..width * height).map(|i| i as f64 + 1.0).collect();
        GridBuffer::from_parts(width, height, data)
    }

    #[test]
    fn test_index_row_major() {
        let grid = sequential(2, 3);
        assert_eq!(grid.index(0, 0), Some(0));
        assert_eq!(grid.index(0, 2), Some(2));
        assert_eq!(grid.index(1, 0), Some(3));
        assert_eq!(grid.get(1, 1), Some(5.0));
    }

    #[test]
    fn test_index_out_of_range() {
        let grid = sequential(2, 3);
        assert_eq!(grid.index(2, 0), None);
        assert_eq!(grid.index(0, 3), None);
        assert_eq!(GridBuffer::new().index(0, 0), None);
    }

    #[test]
    fn test_index_past_capacity() {
        let grid = GridBuffer::from_parts(4, 4, vec![0.0; 10]);
        assert_eq!(grid.index(2, 1), Some(9));
        assert_eq!(grid.index(2, 2), None);
        assert!(!grid.is_consistent());
    }

    #[test]
    fn test_set_rejects_invalid_cell() {
        let mut grid = sequential(2, 2);
        let err = grid.set(2, 0, 9.0).unwrap_err();
        assert!(matches!(err, MatrixError::InvalidIndex { x: 2, y: 0, .. }));
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_reshape_more_rows() {
        let mut grid = sequential(2, 3);
        grid.reshape(3, 3, true).unwrap();
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_reshape_taller_rows() {
        let mut grid = sequential(3, 2);
        grid.reshape(3, 4, true).unwrap();
        assert_eq!(
            grid.as_slice(),
            &[1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0, 5.0, 6.0, 0.0, 0.0]
        );
    }

    #[test]
    fn test_reshape_shorter_rows() {
        let mut grid = sequential(3, 3);
        grid.reshape(3, 2, true).unwrap();
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 4.0, 5.0, 7.0, 8.0]);
        assert_eq!(grid.capacity(), 6);
    }

    #[test]
    fn test_reshape_taller_rows_without_reinitialize_blanks_new_cells() {
        let mut grid = sequential(3, 2);
        grid.reshape(3, 4, false).unwrap();
        for x in 0..3 {
            assert_eq!(grid.get(x, 0), Some(2.0 * x as f64 + 1.0));
            assert_eq!(grid.get(x, 1), Some(2.0 * x as f64 + 2.0));
            assert!(is_blank(grid.get(x, 2).unwrap()), "({x}, 2)");
            assert!(is_blank(grid.get(x, 3).unwrap()), "({x}, 3)");
        }
    }

    #[test]
    fn test_reshape_without_reinitialize_blanks_new_rows() {
        let mut grid = sequential(3, 3);
        grid.reshape(4, 2, false).unwrap();
        assert_eq!(&grid.as_slice()[..6], &[1.0, 2.0, 4.0, 5.0, 7.0, 8.0]);
        assert!(grid.as_slice()[6..].iter().all(|v| is_blank(*v)));
    }

    #[test]
    fn test_reshape_same_size_new_columns_zeroed() {
        let mut grid = sequential(3, 2);
        grid.reshape(2, 3, true).unwrap();
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 0.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_reshape_preserves_shared_cells() {
        let shapes = [(1, 1), (1, 4), (4, 1), (2, 5), (5, 2), (3, 3), (4, 6)];
        for &(w0, h0) in &shapes {
            for &(w1, h1) in &shapes {
                let original = sequential(w0, h0);
                let mut grid = original.clone();
                grid.reshape(w1, h1, true).unwrap();
                assert_eq!(grid.capacity(), w1 * h1);
                for x in 0..w1 {
                    for y in 0..h1 {
                        let expected = if x < w0 && y < h0 {
                            original.get(x, y).unwrap()
                        } else {
                            0.0
                        };
                        assert_eq!(grid.get(x, y), Some(expected), "{w0}x{h0} -> {w1}x{h1} at ({x}, {y})");
                    }
                }
            }
        }
    }

    #[test]
    fn test_reshape_rejects_zero_dimension() {
        let mut grid = sequential(2, 2);
        assert!(matches!(
            grid.reshape(0, 3, true),
            Err(MatrixError::InvalidDimensions { width: 0, height: 3 })
        ));
        assert_eq!(grid.width(), 2);
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_reshape_allocation_failure_leaves_buffer() {
        let mut grid = sequential(2, 2);
        let err = grid.reshape(usize::MAX / 16, 2, true).unwrap_err();
        assert!(matches!(err, MatrixError::OutOfMemory { .. }));
        assert_eq!((grid.width(), grid.height()), (2, 2));
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_reshape_inconsistent_buffer_only_resizes() {
        let mut grid = GridBuffer::from_parts(4, 4, vec![1.0; 10]);
        grid.reshape(2, 8, true).unwrap();
        assert_eq!(grid.capacity(), 16);
        assert!(grid.as_slice()[..10].iter().all(|&v| v == 1.0));
        assert!(grid.as_slice()[10..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_resize_capacity() {
        let mut grid = sequential(2, 2);
        grid.resize_capacity(6, true).unwrap();
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 3.0, 4.0, 0.0, 0.0]);

        grid.resize_capacity(8, false).unwrap();
        assert!(grid.as_slice()[6..].iter().all(|v| is_blank(*v)));

        grid.resize_capacity(3, true).unwrap();
        assert_eq!(grid.as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!((grid.width(), grid.height()), (2, 2));
    }

    #[test]
    fn test_resize_capacity_failure_is_atomic() {
        let mut grid = sequential(2, 2);
        let err = grid.resize_capacity(usize::MAX / 4, true).unwrap_err();
        assert!(matches!(err, MatrixError::OutOfMemory { .. }));
        assert_eq!(grid.capacity(), 4);
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(BLANK));
        assert!(is_blank(f64::INFINITY));
        assert!(is_blank(f64::NEG_INFINITY));
        assert!(!is_blank(0.0));
        assert!(!is_blank(-1e300));
    }
}
