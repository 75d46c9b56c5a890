//! Raster element trait for generic cell values

use num_traits::{NumCast, Zero};
use std::fmt::Debug;

/// Trait for types that can be stored in a class raster cell.
///
/// Providers decode blocks to one of the sample types a GeoTIFF can carry
/// (8/16/32/64-bit integers, 32/64-bit floats). NoData comparison is an exact
/// equality test on the value widened to `f64`, which is lossless for every
/// integer width a class raster uses in practice.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Human readable sample type name
    fn type_name() -> &'static str;

    /// Whether this type is a floating point type
    fn is_float() -> bool;

    /// Whether this particular value can never be a valid cell (float NaN)
    fn is_nan(&self) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }

    /// Check if this value matches the NoData sentinel, if any.
    ///
    /// No epsilon is applied: class rasters are integer valued.
    fn is_nodata(&self, nodata: Option<f64>) -> bool {
        if self.is_nan() {
            return true;
        }
        match (nodata, self.to_f64()) {
            (Some(nd), Some(v)) => v == nd,
            _ => false,
        }
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $name:expr) => {
        impl RasterElement for $t {
            fn type_name() -> &'static str {
                $name
            }

            fn is_float() -> bool {
                false
            }

            fn is_nan(&self) -> bool {
                false
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $name:expr) => {
        impl RasterElement for $t {
            fn type_name() -> &'static str {
                $name
            }

            fn is_float() -> bool {
                true
            }

            fn is_nan(&self) -> bool {
                <$t>::is_nan(*self)
            }
        }
    };
}

impl_raster_element_int!(i8, "Int8");
impl_raster_element_int!(i16, "Int16");
impl_raster_element_int!(i32, "Int32");
impl_raster_element_int!(i64, "Int64");
impl_raster_element_int!(u8, "Byte");
impl_raster_element_int!(u16, "UInt16");
impl_raster_element_int!(u32, "UInt32");
impl_raster_element_int!(u64, "UInt64");
impl_raster_element_float!(f32, "Float32");
impl_raster_element_float!(f64, "Float64");
