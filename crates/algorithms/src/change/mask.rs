//! Per-block validity masks

use lulc_core::layer::{read_window, BlockWindow, MaskLayer};
use lulc_core::raster::RasterElement;
use lulc_core::{Error, Result};
use ndarray::{Array2, ArrayView2, Zip};

/// Build the validity grid of one block.
///
/// A cell is valid when it differs from `nodata` (exact comparison; NaN is
/// never valid) and, if an AOI block is given, the AOI cell equals 1.
pub fn validity_mask<T: RasterElement>(
    values: ArrayView2<'_, T>,
    nodata: Option<f64>,
    aoi: Option<ArrayView2<'_, u8>>,
) -> Result<Array2<bool>> {
    let mut valid = values.map(|v| !v.is_nodata(nodata));

    if let Some(aoi) = aoi {
        if aoi.dim() != valid.dim() {
            return Err(Error::SizeMismatch {
                er: valid.nrows(),
                ec: valid.ncols(),
                ar: aoi.nrows(),
                ac: aoi.ncols(),
            });
        }
        Zip::from(&mut valid).and(&aoi).for_each(|v, &m| *v &= m == 1);
    }

    Ok(valid)
}

/// Narrow `acc` to cells also valid in `other`.
pub fn conjunct(acc: &mut Array2<bool>, other: &Array2<bool>) -> Result<()> {
    if acc.dim() != other.dim() {
        return Err(Error::SizeMismatch {
            er: acc.nrows(),
            ec: acc.ncols(),
            ar: other.nrows(),
            ac: other.ncols(),
        });
    }
    Zip::from(acc).and(other).for_each(|a, &b| *a &= b);
    Ok(())
}

/// Read the AOI block under `window`, if an AOI is active.
pub fn read_aoi_block(aoi: Option<MaskLayer<'_>>, window: &BlockWindow) -> Result<Option<Array2<u8>>> {
    aoi.map(|layer| read_window(layer, window)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_no_nodata_all_valid() {
        let values = array![[0u8, 1], [2, 255]];
        let valid = validity_mask(values.view(), None, None).unwrap();
        assert!(valid.iter().all(|&v| v));
    }

    #[test]
    fn test_nodata_exact_match() {
        let values = array![[0u8, 1], [2, 255]];
        let valid = validity_mask(values.view(), Some(255.0), None).unwrap();
        assert_eq!(valid, array![[true, true], [true, false]]);

        // No tolerance around the sentinel
        let floats = array![[1.0f32, 1.0001]];
        let valid = validity_mask(floats.view(), Some(1.0), None).unwrap();
        assert_eq!(valid, array![[false, true]]);
    }

    #[test]
    fn test_nan_always_invalid() {
        let values = array![[f64::NAN, 2.0]];
        let valid = validity_mask(values.view(), None, None).unwrap();
        assert_eq!(valid, array![[false, true]]);
    }

    #[test]
    fn test_aoi_requires_one() {
        let values = array![[1u16, 2, 3]];
        let aoi = array![[1u8, 0, 2]];
        let valid = validity_mask(values.view(), None, Some(aoi.view())).unwrap();
        assert_eq!(valid, array![[true, false, false]]);
    }

    #[test]
    fn test_conjunct_and_shape_check() {
        let mut a = array![[true, true], [false, true]];
        let b = array![[true, false], [true, true]];
        conjunct(&mut a, &b).unwrap();
        assert_eq!(a, array![[true, false], [false, true]]);

        let wrong = array![[true]];
        assert!(conjunct(&mut a, &wrong).is_err());
    }
}
