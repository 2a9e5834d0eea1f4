//! Raster data generators with predictable, verifiable values.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that grid[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50); // 10 * 5
/// assert_eq!(grid[0], 0.0);   // col=0, row=0 -> 0*1000 + 0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0 -> 1*1000 + 0
/// assert_eq!(grid[10], 1.0);  // col=0, row=1 -> 0*1000 + 1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates an elevation-like grid rising west to east.
///
/// Value is `base + col * step` so every column is distinct.
pub fn create_elevation_grid(width: usize, height: usize, base: f32, step: f32) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for _row in 0..height {
        for col in 0..width {
            data.push(base + col as f32 * step);
        }
    }
    data
}

/// Creates a grid with every cell set to `value`.
pub fn create_constant_grid(width: usize, height: usize, value: f32) -> Vec<f32> {
    vec![value; width * height]
}

/// Replaces the cells of one row with `nodata`.
pub fn with_nodata_row(mut data: Vec<f32>, width: usize, row: usize, nodata: f32) -> Vec<f32> {
    let start = row * width;
    if let Some(cells) = data.get_mut(start..start + width) {
        cells.fill(nodata);
    }
    data
}
