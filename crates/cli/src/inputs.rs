//! Input series, legend and layer opening

use anyhow::{bail, Context, Result};
use lulc_core::config::parse_nodata_override;
use lulc_core::layer::LayerInfo;
use lulc_core::validate::{check_nodata_consistency, NodataCheck};
use lulc_core::{MaskLayer, NodataMode, RasterProvider};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Class layer as seen by the engine
pub type ClassLayer = Box<dyn RasterProvider<Cell = f64>>;

/// Rasterized AOI mask
pub type AoiLayer = Box<dyn RasterProvider<Cell = u8>>;

/// One raster of the time series
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesInput {
    pub path: PathBuf,
    pub name: String,
    pub year: i32,
}

/// First `19xx` or `20xx` token in `text`
pub fn infer_year(text: &str) -> Option<i32> {
    let bytes = text.as_bytes();
    bytes.windows(4).find_map(|w| {
        let century_ok = matches!((w[0], w[1]), (b'1', b'9') | (b'2', b'0'));
        if century_ok && w[2].is_ascii_digit() && w[3].is_ascii_digit() {
            std::str::from_utf8(w).ok()?.parse().ok()
        } else {
            None
        }
    })
}

/// Attach a year to every input and sort the series by year.
///
/// Explicit `years` take precedence; otherwise each year is read from the
/// file stem.
pub fn resolve_series(paths: &[PathBuf], years: Option<&[i32]>) -> Result<Vec<SeriesInput>> {
    if paths.is_empty() {
        bail!("No rasters selected");
    }
    if let Some(years) = years {
        if years.len() != paths.len() {
            bail!("Got {} years for {} rasters", years.len(), paths.len());
        }
    }

    let mut series = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let year = match years {
                Some(years) => years[i],
                None => infer_year(&name).with_context(|| {
                    format!("Cannot infer a year from '{}'; pass --years", name)
                })?,
            };
            Ok(SeriesInput {
                path: path.clone(),
                name,
                year,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    series.sort_by_key(|s| s.year);
    Ok(series)
}

/// Class id to label mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Legend(BTreeMap<usize, String>);

impl Legend {
    /// Parse `id=label` pairs separated by commas
    pub fn parse(text: &str) -> Result<Self> {
        let mut labels = BTreeMap::new();
        for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (id, label) = entry
                .split_once('=')
                .with_context(|| format!("Legend entry '{}' is not id=label", entry))?;
            let id: usize = id
                .trim()
                .parse()
                .with_context(|| format!("Invalid class id in legend entry '{}'", entry))?;
            labels.insert(id, label.trim().to_string());
        }
        Ok(Self(labels))
    }

    pub fn label(&self, class_id: usize) -> &str {
        self.0.get(&class_id).map(String::as_str).unwrap_or("")
    }
}

/// An opened, year-sorted series with its resolved NoData values
pub struct Series {
    pub inputs: Vec<SeriesInput>,
    pub layers: Vec<ClassLayer>,
    pub nodata: Vec<Option<f64>>,
    pub aoi: Option<AoiLayer>,
    pub mode: NodataMode,
}

impl Series {
    /// Open every raster of the series and the optional AOI mask.
    pub fn open(
        paths: &[PathBuf],
        years: Option<&[i32]>,
        nodata: Option<&str>,
        aoi: Option<&Path>,
    ) -> Result<Self> {
        let inputs = resolve_series(paths, years)?;
        let mode = match nodata {
            Some(text) => NodataMode::Override(parse_nodata_override(text)?),
            None => NodataMode::FromRaster,
        };

        let layers = inputs
            .iter()
            .map(|input| open_class_layer(&input.path))
            .collect::<Result<Vec<_>>>()?;
        let nodata = layers.iter().map(|l| mode.resolve(l.nodata())).collect();
        let aoi = aoi.map(open_aoi_layer).transpose()?;

        Ok(Self {
            inputs,
            layers,
            nodata,
            aoi,
            mode,
        })
    }

    /// Borrowed layers in year order
    pub fn layer_refs(&self) -> Vec<&dyn RasterProvider<Cell = f64>> {
        self.layers.iter().map(|l| &**l).collect()
    }

    pub fn aoi(&self) -> Option<MaskLayer<'_>> {
        self.aoi.as_deref()
    }

    /// Grid geometry of every layer, with the NoData value the run will use
    pub fn layer_infos(&self) -> Vec<LayerInfo> {
        self.inputs
            .iter()
            .zip(&self.layers)
            .zip(&self.nodata)
            .map(|((input, layer), &nodata)| LayerInfo {
                nodata,
                ..LayerInfo::of(input.name.clone(), &**layer)
            })
            .collect()
    }

    /// Layer infos followed by the AOI, which must share the grid
    pub fn alignment_infos(&self) -> Vec<LayerInfo> {
        let mut infos = self.layer_infos();
        if let Some(aoi) = self.aoi() {
            infos.push(LayerInfo::of("AOI", aoi));
        }
        infos
    }

    pub fn nodata_check(&self) -> NodataCheck {
        let declared: Vec<LayerInfo> = self
            .inputs
            .iter()
            .zip(&self.layers)
            .map(|(input, layer)| LayerInfo::of(input.name.clone(), &**layer))
            .collect();
        check_nodata_consistency(&declared, self.mode)
    }

    pub fn first(&self) -> &dyn RasterProvider<Cell = f64> {
        &*self.layers[0]
    }
}

#[cfg(not(feature = "gdal"))]
pub fn open_class_layer(path: &Path) -> Result<ClassLayer> {
    use lulc_core::io::GeoTiffLayer;

    let layer = GeoTiffLayer::<f64>::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(layer))
}

#[cfg(feature = "gdal")]
pub fn open_class_layer(path: &Path) -> Result<ClassLayer> {
    use lulc_core::io::GdalLayer;

    let layer = GdalLayer::<f64>::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(layer))
}

#[cfg(not(feature = "gdal"))]
pub fn open_aoi_layer(path: &Path) -> Result<AoiLayer> {
    use lulc_core::io::GeoTiffLayer;

    let layer = GeoTiffLayer::<u8>::open(path).with_context(|| format!("Failed to open AOI {}", path.display()))?;
    Ok(Box::new(layer))
}

#[cfg(feature = "gdal")]
pub fn open_aoi_layer(path: &Path) -> Result<AoiLayer> {
    use lulc_core::io::GdalLayer;

    let layer = GdalLayer::<u8>::open(path).with_context(|| format!("Failed to open AOI {}", path.display()))?;
    Ok(Box::new(layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_year() {
        assert_eq!(infer_year("lulc_2015_v2"), Some(2015));
        assert_eq!(infer_year("cover1998"), Some(1998));
        assert_eq!(infer_year("map_1850"), None);
        assert_eq!(infer_year("x12019"), Some(2019));
        assert_eq!(infer_year("none"), None);
    }

    #[test]
    fn test_series_sorted_by_year() {
        let paths = vec![PathBuf::from("a/lc_2020.tif"), PathBuf::from("a/lc_2000.tif")];
        let series = resolve_series(&paths, None).unwrap();
        assert_eq!(series[0].year, 2000);
        assert_eq!(series[1].name, "lc_2020");

        let explicit = resolve_series(&paths, Some(&[2010, 2005])).unwrap();
        assert_eq!(explicit[0].path, PathBuf::from("a/lc_2000.tif"));
        assert_eq!(explicit[0].year, 2005);

        assert!(resolve_series(&[PathBuf::from("nodate.tif")], None).is_err());
        assert!(resolve_series(&paths, Some(&[2000])).is_err());
    }

    #[test]
    fn test_legend() {
        let legend = Legend::parse("1=Forest, 2 = Crop,,3=Urban area").unwrap();
        assert_eq!(legend.label(1), "Forest");
        assert_eq!(legend.label(2), "Crop");
        assert_eq!(legend.label(3), "Urban area");
        assert_eq!(legend.label(9), "");
        assert!(Legend::parse("forest").is_err());
        assert!(Legend::parse("x=Forest").is_err());
    }
}
