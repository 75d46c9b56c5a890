//! Single-pass interval change metrics

use super::area::percent;
use super::pair::{traverse_pair, Side};
use super::{class_index, MAX_TRANSITION_CLASS};
use lulc_core::config::BlockConfig;
use lulc_core::layer::{MaskLayer, Progress, RasterProvider};
use lulc_core::raster::RasterElement;
use lulc_core::{Error, Result};
use ndarray::{Array2, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tracing::debug;

/// Change statistics of one (t0, t1) interval.
///
/// `matrix[[from, to]]` counts valid pixels of class `from` at t0 and `to` at
/// t1. Gain, loss and the changed/total counters are exact consequences of
/// the matrix:
/// - `sum(matrix) == total_valid_pixels`
/// - `trace(matrix) == total_valid_pixels - changed_pixels`
/// - `gain[c] == column_sum(c) - matrix[[c, c]]`
/// - `loss[c] == row_sum(c) - matrix[[c, c]]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalChange {
    pub max_class: usize,
    pub gain: Vec<u64>,
    pub loss: Vec<u64>,
    pub matrix: Array2<u64>,
    pub changed_pixels: u64,
    pub total_valid_pixels: u64,
}

impl IntervalChange {
    /// Finalize from a flat `(from * n + to)` histogram
    fn from_histogram(max_class: usize, histogram: Vec<u64>) -> Result<Self> {
        let n = max_class + 1;
        let matrix = Array2::from_shape_vec((n, n), histogram).map_err(|e| Error::Other(e.to_string()))?;

        let diagonal = matrix.diag().to_owned();
        let col_sums = matrix.sum_axis(Axis(0));
        let row_sums = matrix.sum_axis(Axis(1));

        let gain: Vec<u64> = col_sums.iter().zip(&diagonal).map(|(s, d)| s - d).collect();
        let loss: Vec<u64> = row_sums.iter().zip(&diagonal).map(|(s, d)| s - d).collect();
        let total_valid_pixels = matrix.sum();
        let changed_pixels = total_valid_pixels - diagonal.sum();

        Ok(Self {
            max_class,
            gain,
            loss,
            matrix,
            changed_pixels,
            total_valid_pixels,
        })
    }

    /// Number of valid pixels whose class did not change
    pub fn unchanged_pixels(&self) -> u64 {
        self.total_valid_pixels - self.changed_pixels
    }

    /// Net and gross change per class `0..=max_class`
    pub fn net_gross(&self, cell_area: f64) -> Vec<NetGrossRow> {
        let cell_area = cell_area.abs();
        (0..=self.max_class)
            .map(|class_id| {
                let gain = self.gain[class_id];
                let loss = self.loss[class_id];
                let net = gain as i64 - loss as i64;
                let gross = gain + loss;
                NetGrossRow {
                    class_id,
                    gain_pixels: gain,
                    loss_pixels: loss,
                    net_pixels: net,
                    gross_pixels: gross,
                    net_area: net as f64 * cell_area,
                    gross_area: gross as f64 * cell_area,
                }
            })
            .collect()
    }

    /// Changed pixels as a percentage of valid pixels
    pub fn percent_changed(&self) -> f64 {
        percent(self.changed_pixels, self.total_valid_pixels)
    }
}

/// One line of the net/gross change table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetGrossRow {
    pub class_id: usize,
    pub gain_pixels: u64,
    pub loss_pixels: u64,
    pub net_pixels: i64,
    pub gross_pixels: u64,
    pub net_area: f64,
    pub gross_area: f64,
}

/// Accumulate the transition matrix of `layer0 -> layer1` in one lockstep pass.
///
/// A pixel invalid at either date (or outside the AOI) is left out of every
/// counter. Every valid pixel lands in one histogram bin
/// `t0 * (max_class + 1) + t1`; gain, loss and the counters are derived from
/// the finished matrix.
///
/// # Arguments
/// * `layer0`, `layer1` - Aligned layers at the start and end of the interval
/// * `nodata0`, `nodata1` - Their NoData sentinels
/// * `aoi` - Optional rasterized area of interest
/// * `max_class` - Series-wide maximum class id; sizes the matrix
#[allow(clippy::too_many_arguments)]
pub fn compute_interval_metrics<P0, P1>(
    layer0: &P0,
    layer1: &P1,
    nodata0: Option<f64>,
    nodata1: Option<f64>,
    aoi: Option<MaskLayer<'_>>,
    max_class: usize,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<IntervalChange>
where
    P0: RasterProvider + ?Sized,
    P1: RasterProvider + ?Sized,
{
    if max_class > MAX_TRANSITION_CLASS {
        return Err(Error::InvalidParameter {
            name: "max_class",
            value: max_class.to_string(),
            reason: format!("transition matrix supports class ids up to {}", MAX_TRANSITION_CLASS),
        });
    }

    let n = max_class + 1;
    let mut histogram = vec![0u64; n * n];

    let bin = |v: f64| -> Result<usize> {
        let c = class_index(v)?;
        if c > max_class {
            return Err(Error::InvalidClassValue { value: v });
        }
        Ok(c)
    };

    traverse_pair(
        Side { layer: layer0, nodata: nodata0 },
        Side { layer: layer1, nodata: nodata1 },
        aoi,
        config,
        progress,
        |block| {
            let mut failure = None;
            Zip::from(&block.t0)
                .and(&block.t1)
                .and(&block.valid)
                .for_each(|&a, &b, &ok| {
                    if !ok || failure.is_some() {
                        return;
                    }
                    let from = a.to_f64().unwrap_or(f64::NAN);
                    let to = b.to_f64().unwrap_or(f64::NAN);
                    match (bin(from), bin(to)) {
                        (Ok(i), Ok(j)) => histogram[i * n + j] += 1,
                        (Err(e), _) | (_, Err(e)) => failure = Some(e),
                    }
                });
            match failure {
                Some(e) => Err(e),
                None => Ok(ControlFlow::Continue(())),
            }
        },
    )?;

    let result = IntervalChange::from_histogram(max_class, histogram)?;
    debug!(
        "Interval metrics: {} of {} valid pixels changed",
        result.changed_pixels, result.total_valid_pixels
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lulc_core::layer::{MemoryLayer, NoProgress};
    use lulc_core::raster::GeoTransform;

    fn layer(rows: Vec<Vec<u8>>) -> MemoryLayer<u8> {
        MemoryLayer::from_rows(rows, GeoTransform::default()).unwrap()
    }

    #[test]
    fn test_matrix_and_counters() {
        let t0 = layer(vec![vec![0, 1], vec![1, 2]]);
        let t1 = layer(vec![vec![0, 2], vec![1, 1]]);

        let r = compute_interval_metrics(&t0, &t1, None, None, None, 2, &BlockConfig::square(1), &mut NoProgress)
            .unwrap();

        assert_eq!(r.total_valid_pixels, 4);
        assert_eq!(r.changed_pixels, 2);
        assert_eq!(r.matrix[[1, 2]], 1);
        assert_eq!(r.matrix[[2, 1]], 1);
        assert_eq!(r.gain, vec![0, 1, 1]);
        assert_eq!(r.loss, vec![0, 1, 1]);
    }

    #[test]
    fn test_net_gross_rows() {
        let t0 = layer(vec![vec![1, 1, 1]]);
        let t1 = layer(vec![vec![1, 2, 2]]);
        let r = compute_interval_metrics(&t0, &t1, None, None, None, 2, &BlockConfig::default(), &mut NoProgress)
            .unwrap();

        let rows = r.net_gross(0.5);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].net_pixels, -2);
        assert_eq!(rows[2].net_pixels, 2);
        assert_eq!(rows[2].gross_pixels, 2);
        assert_eq!(rows[1].net_area, -1.0);
    }

    #[test]
    fn test_class_above_max_rejected() {
        let t0 = layer(vec![vec![1, 5]]);
        let t1 = layer(vec![vec![1, 1]]);
        let result = compute_interval_metrics(&t0, &t1, None, None, None, 2, &BlockConfig::default(), &mut NoProgress);
        assert!(matches!(result, Err(Error::InvalidClassValue { .. })));
    }

    #[test]
    fn test_dense_matrix_limit() {
        let t0 = layer(vec![vec![1]]);
        let result = compute_interval_metrics(
            &t0,
            &t0,
            None,
            None,
            None,
            MAX_TRANSITION_CLASS + 1,
            &BlockConfig::default(),
            &mut NoProgress,
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }
}
