//! Bounded sampling of changed pixels for density estimation

use super::pair::{traverse_pair, Side};
use lulc_core::config::BlockConfig;
use lulc_core::layer::{MaskLayer, Progress, RasterProvider};
use lulc_core::raster::{Raster, RasterElement};
use lulc_core::vector::{PointSet, WeightedPoint};
use lulc_core::Result;
use ndarray::Zip;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use std::ops::ControlFlow;
use tracing::{debug, warn};

/// Parameters for hotspot sampling
#[derive(Debug, Clone)]
pub struct HotspotParams {
    /// Maximum number of points returned
    pub max_points: usize,
    /// Seed for the subsampling RNG; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for HotspotParams {
    fn default() -> Self {
        Self {
            max_points: 50_000,
            seed: None,
        }
    }
}

/// Changed-pixel centers collected for one interval
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotspotSample {
    pub points: PointSet,
    /// The budget ran out before the whole extent was scanned. The sample
    /// then covers only the raster-scan prefix read so far.
    pub truncated: bool,
    /// Changed pixels found in the blocks that were read
    pub changed_seen: u64,
}

/// Collect the centers of changed pixels, at most `params.max_points`.
///
/// Blocks are scanned in raster order and every changed pixel is kept until
/// a block holds more changed pixels than the remaining budget. That block is
/// subsampled uniformly without replacement to fill the budget and the
/// traversal stops, so a truncated sample is not uniform over the whole
/// raster. Each point has weight 1.
#[allow(clippy::too_many_arguments)]
pub fn sample_changed_points<P0, P1>(
    layer0: &P0,
    layer1: &P1,
    nodata0: Option<f64>,
    nodata1: Option<f64>,
    aoi: Option<MaskLayer<'_>>,
    params: &HotspotParams,
    config: &BlockConfig,
    progress: &mut dyn Progress,
) -> Result<HotspotSample>
where
    P0: RasterProvider + ?Sized,
    P1: RasterProvider + ?Sized,
{
    let transform = layer0.transform();
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut sample = HotspotSample::default();

    traverse_pair(
        Side { layer: layer0, nodata: nodata0 },
        Side { layer: layer1, nodata: nodata1 },
        aoi,
        config,
        progress,
        |block| {
            let mut changed: Vec<(usize, usize)> = Vec::new();
            Zip::indexed(&block.t0)
                .and(&block.t1)
                .and(&block.valid)
                .for_each(|(r, c), &a, &b, &ok| {
                    if ok && a.to_f64() != b.to_f64() {
                        changed.push((r, c));
                    }
                });
            sample.changed_seen += changed.len() as u64;

            let to_point = |&(r, c): &(usize, usize)| {
                let (row, col) = block.window.to_source_coords(r, c);
                WeightedPoint::at_pixel(&transform, col, row, 1.0)
            };

            let remaining = params.max_points - sample.points.len();
            if changed.len() <= remaining {
                for cell in &changed {
                    sample.points.push(to_point(cell));
                }
                return Ok(ControlFlow::Continue(()));
            }

            let mut picked = index::sample(&mut rng, changed.len(), remaining).into_vec();
            picked.sort_unstable();
            for i in picked {
                sample.points.push(to_point(&changed[i]));
            }
            sample.truncated = true;
            Ok(ControlFlow::Break(()))
        },
    )?;

    if sample.truncated {
        warn!(
            "Hotspot budget of {} points reached; sample covers only the raster-scan prefix",
            params.max_points
        );
    } else if sample.points.is_empty() {
        debug!("No changed pixels found for hotspot sampling");
    }

    Ok(sample)
}

/// All-zero density raster on the grid of `like`, written when no changed
/// pixel was found.
pub fn blank_density_raster<P: RasterProvider + ?Sized>(like: &P) -> Raster<f32> {
    let mut raster = Raster::new(like.height(), like.width());
    raster.set_transform(like.transform());
    raster.set_crs(like.crs().cloned());
    raster
}

#[cfg(test)]
mod tests {
    use super::*;
    use lulc_core::layer::{MemoryLayer, NoProgress};
    use lulc_core::raster::GeoTransform;

    fn pair() -> (MemoryLayer<u8>, MemoryLayer<u8>) {
        let gt = GeoTransform::new(0.0, 40.0, 10.0, -10.0);
        let t0 = MemoryLayer::from_rows(vec![vec![1; 4]; 4], gt).unwrap();
        let t1 = MemoryLayer::from_rows(
            vec![vec![2, 1, 1, 2], vec![1, 1, 1, 1], vec![2, 2, 1, 1], vec![1, 1, 1, 2]],
            gt,
        )
        .unwrap();
        (t0, t1)
    }

    #[test]
    fn test_all_points_when_budget_large() {
        let (t0, t1) = pair();
        let params = HotspotParams {
            max_points: 100,
            seed: Some(1),
        };
        let sample =
            sample_changed_points(&t0, &t1, None, None, None, &params, &BlockConfig::square(2), &mut NoProgress)
                .unwrap();

        assert!(!sample.truncated);
        assert_eq!(sample.points.len(), 5);
        assert_eq!(sample.changed_seen, 5);

        let first = sample.points.iter().next().unwrap();
        assert_eq!((first.col, first.row), (0, 0));
        assert_eq!((first.x(), first.y()), (5.0, 35.0));
        assert!(sample.points.iter().all(|p| p.weight == 1.0));
    }

    #[test]
    fn test_budget_truncates() {
        let (t0, t1) = pair();
        let params = HotspotParams {
            max_points: 2,
            seed: Some(7),
        };
        let sample =
            sample_changed_points(&t0, &t1, None, None, None, &params, &BlockConfig::square(4), &mut NoProgress)
                .unwrap();

        assert!(sample.truncated);
        assert_eq!(sample.points.len(), 2);
        // Subsampled points keep raster-scan order
        let order: Vec<_> = sample.points.iter().map(|p| (p.row, p.col)).collect();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let (t0, t1) = pair();
        let params = HotspotParams {
            max_points: 3,
            seed: Some(42),
        };
        let run = || {
            sample_changed_points(&t0, &t1, None, None, None, &params, &BlockConfig::default(), &mut NoProgress)
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_blank_raster_matches_grid() {
        let (t0, _) = pair();
        let blank = blank_density_raster(&t0);
        assert_eq!(blank.shape(), (4, 4));
        assert!(blank.data().iter().all(|&v| v == 0.0));
        assert_eq!(blank.transform(), t0.raster().transform());
    }
}
