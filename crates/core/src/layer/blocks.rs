//! Block-wise traversal of raster layers

use crate::config::BlockConfig;
use crate::error::{Error, Result};
use crate::layer::provider::RasterProvider;
use crate::raster::{Extent, GeoTransform};
use ndarray::Array2;

/// A rectangular pixel window of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    /// Column offset in the source layer
    pub col: usize,
    /// Row offset in the source layer
    pub row: usize,
    /// Number of columns in this block
    pub cols: usize,
    /// Number of rows in this block
    pub rows: usize,
}

impl BlockWindow {
    pub fn new(col: usize, row: usize, cols: usize, rows: usize) -> Self {
        Self { col, row, cols, rows }
    }

    /// Number of cells in the window
    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Geographic rectangle covered by this window
    pub fn extent(&self, transform: &GeoTransform) -> Extent {
        transform.window_extent(self.col, self.row, self.cols, self.rows)
    }

    /// Convert block-local coordinates to source layer coordinates
    pub fn to_source_coords(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row + local_row, self.col + local_col)
    }
}

/// One decoded block. Ephemeral: consumed within a single iteration step.
#[derive(Debug, Clone)]
pub struct Block<T> {
    pub window: BlockWindow,
    pub values: Array2<T>,
}

/// Row-major iterator over the block windows covering a grid.
///
/// Blocks are `block_cols` x `block_rows` except along the right and bottom
/// edges, where they are clipped to the remaining width and height.
#[derive(Debug, Clone)]
pub struct BlockGrid {
    total_cols: usize,
    total_rows: usize,
    block_cols: usize,
    block_rows: usize,
    current_col: usize,
    current_row: usize,
}

impl BlockGrid {
    pub fn new(width: usize, height: usize, config: &BlockConfig) -> Self {
        Self {
            total_cols: width,
            total_rows: height,
            block_cols: config.block_cols.max(1),
            block_rows: config.block_rows.max(1),
            current_col: 0,
            current_row: 0,
        }
    }

    fn remaining(&self) -> usize {
        if self.total_cols == 0 || self.current_row >= self.total_rows {
            return 0;
        }
        let per_row = self.total_cols.div_ceil(self.block_cols);
        let rows_left = (self.total_rows - self.current_row).div_ceil(self.block_rows);
        let done_in_row = self.current_col / self.block_cols;
        per_row * rows_left - done_in_row
    }
}

impl Iterator for BlockGrid {
    type Item = BlockWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.total_cols == 0 || self.current_row >= self.total_rows {
            return None;
        }

        let cols = self.block_cols.min(self.total_cols - self.current_col);
        let rows = self.block_rows.min(self.total_rows - self.current_row);
        let window = BlockWindow::new(self.current_col, self.current_row, cols, rows);

        self.current_col += self.block_cols;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.block_rows;
        }

        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for BlockGrid {}

/// Observer notified once per decoded block.
///
/// Returning an error stops the traversal before the next block is read;
/// [`Error::Cancelled`] is the conventional value for a user abort.
pub trait Progress {
    fn block_read(&mut self) -> Result<()>;
}

/// Progress observer that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn block_read(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F> Progress for F
where
    F: FnMut() -> Result<()>,
{
    fn block_read(&mut self) -> Result<()> {
        self()
    }
}

/// Read the block of `layer` under `window`.
///
/// Used for lockstep reads of layers aligned with the one being traversed.
pub fn read_window<P: RasterProvider + ?Sized>(layer: &P, window: &BlockWindow) -> Result<Array2<P::Cell>> {
    let read_error = |reason: String| Error::LayerRead {
        col: window.col,
        row: window.row,
        cols: window.cols,
        rows: window.rows,
        reason,
    };

    let extent = window.extent(&layer.transform());
    let values = layer
        .read_block(&extent, window.cols, window.rows)
        .map_err(|e| match e {
            Error::LayerRead { .. } | Error::Configuration(_) => e,
            other => read_error(other.to_string()),
        })?;

    if values.dim() != (window.rows, window.cols) {
        let (r, c) = values.dim();
        return Err(read_error(format!("provider returned a {}x{} block", c, r)));
    }

    Ok(values)
}

/// Lazy sequence of blocks over one layer.
///
/// Finite and not restartable: call [`iter_blocks`] again to start over from
/// the top-left block. After the first error the stream ends.
pub struct BlockStream<'a, P: RasterProvider + ?Sized> {
    layer: &'a P,
    grid: BlockGrid,
    progress: &'a mut dyn Progress,
    /// Reported in place of the first block
    rejected: Option<Error>,
    finished: bool,
}

impl<P: RasterProvider + ?Sized> Iterator for BlockStream<'_, P> {
    type Item = Result<Block<P::Cell>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(e) = self.rejected.take() {
            self.finished = true;
            return Some(Err(e));
        }
        let window = self.grid.next()?;

        let values = match read_window(self.layer, &window) {
            Ok(values) => values,
            Err(e) => {
                self.finished = true;
                return Some(Err(e));
            }
        };

        if let Err(e) = self.progress.block_read() {
            self.finished = true;
            return Some(Err(e));
        }

        Some(Ok(Block { window, values }))
    }
}

/// Start a block traversal of `layer`.
///
/// A layer with a rotated geotransform yields a single
/// [`Error::Configuration`] instead of any block.
pub fn iter_blocks<'a, P: RasterProvider + ?Sized>(
    layer: &'a P,
    config: &BlockConfig,
    progress: &'a mut dyn Progress,
) -> BlockStream<'a, P> {
    let transform = layer.transform();
    let rejected = transform.is_rotated().then(|| {
        Error::Configuration(format!(
            "rotated geotransforms are not supported (rotation terms {}, {})",
            transform.row_rotation, transform.col_rotation
        ))
    });

    BlockStream {
        layer,
        grid: BlockGrid::new(layer.width(), layer.height(), config),
        progress,
        rejected,
        finished: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::MemoryLayer;
    use crate::raster::Raster;
    use ndarray::Array2;

    #[test]
    fn test_block_grid_order_and_clipping() {
        let windows: Vec<_> = BlockGrid::new(5, 3, &BlockConfig::square(2)).collect();
        let origins: Vec<_> = windows.iter().map(|w| (w.col, w.row, w.cols, w.rows)).collect();

        assert_eq!(
            origins,
            vec![
                (0, 0, 2, 2),
                (2, 0, 2, 2),
                (4, 0, 1, 2),
                (0, 2, 2, 1),
                (2, 2, 2, 1),
                (4, 2, 1, 1),
            ]
        );
    }

    #[test]
    fn test_block_grid_coverage() {
        let (rows, cols) = (100, 77);
        let mut covered = vec![vec![0u8; cols]; rows];
        let grid = BlockGrid::new(cols, rows, &BlockConfig::square(32));
        assert_eq!(grid.len(), 12);

        for w in grid {
            for r in w.row..w.row + w.rows {
                for c in w.col..w.col + w.cols {
                    covered[r][c] += 1;
                }
            }
        }

        // Every cell covered exactly once
        for r in 0..rows {
            for c in 0..cols {
                assert_eq!(covered[r][c], 1, "Cell ({}, {}) covered {} times", r, c, covered[r][c]);
            }
        }
    }

    #[test]
    fn test_empty_grid_yields_nothing() {
        assert_eq!(BlockGrid::new(0, 10, &BlockConfig::default()).count(), 0);
        assert_eq!(BlockGrid::new(10, 0, &BlockConfig::default()).count(), 0);
    }

    #[test]
    fn test_progress_called_once_per_block() {
        let data = Array2::from_shape_fn((5, 7), |(r, c)| (r * 7 + c) as u16);
        let layer = MemoryLayer::new(Raster::from_array(data.clone()));

        let mut calls = 0usize;
        let mut count = || -> Result<()> {
            calls += 1;
            Ok(())
        };
        let blocks: Vec<_> = iter_blocks(&layer, &BlockConfig::square(3), &mut count)
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(blocks.len(), 6);
        assert_eq!(calls, 6);

        let last = blocks.last().unwrap();
        assert_eq!(last.window, BlockWindow::new(6, 3, 1, 2));
        assert_eq!(last.values[[1, 0]], data[[4, 6]]);
    }

    #[test]
    fn test_progress_error_stops_stream() {
        let layer = MemoryLayer::new(Raster::<u8>::new(4, 4));
        let mut seen = 0;
        let mut cancel_after_one = || -> Result<()> {
            seen += 1;
            if seen > 1 {
                Err(Error::Cancelled)
            } else {
                Ok(())
            }
        };

        let results: Vec<_> = iter_blocks(&layer, &BlockConfig::square(2), &mut cancel_after_one).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(Error::Cancelled)));
    }

    #[test]
    fn test_rotated_layer_rejected_before_reading() {
        let mut raster = Raster::<u8>::new(4, 4);
        raster.set_transform(GeoTransform::from_gdal([0.0, 1.0, 0.2, 4.0, 0.0, -1.0]));
        let layer = MemoryLayer::new(raster);

        let mut calls = 0usize;
        let mut count = || -> Result<()> {
            calls += 1;
            Ok(())
        };
        let results: Vec<_> = iter_blocks(&layer, &BlockConfig::square(2), &mut count).collect();

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::Configuration(_))));
        assert_eq!(calls, 0);
    }
}
