//! Regular-grid (raster) intensity source

use std::collections::BTreeMap;

use super::{IntensityProvider, IntensitySample};
use crate::core::error::{ExposureError, Result};
use crate::core::types::Coordinate;

/// Generic 2D grid anchored at its lower-left corner
#[derive(Debug, Clone)]
pub struct Grid<T: Clone + Default> {
    pub width: usize,
    pub height: usize,
    pub cell_size: f64,
    pub origin: Coordinate,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: usize, height: usize, cell_size: f64, origin: Coordinate) -> Self {
        Self {
            width,
            height,
            cell_size,
            origin,
            data: vec![T::default(); width * height],
        }
    }

    /// Grid over existing row-major data (row 0 is the southernmost row)
    pub fn from_data(
        width: usize,
        height: usize,
        cell_size: f64,
        origin: Coordinate,
        data: Vec<T>,
    ) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            cell_size,
            origin,
            data,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x < self.width && y < self.height {
            Some(&self.data[y * self.width + x])
        } else {
            None
        }
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: T) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// Convert a position to cell coordinates; `None` outside the grid
    #[inline]
    pub fn world_to_cell(&self, pos: Coordinate) -> Option<(usize, usize)> {
        let x = ((pos.lon - self.origin.lon) / self.cell_size).floor();
        let y = ((pos.lat - self.origin.lat) / self.cell_size).floor();
        if x < 0.0 || y < 0.0 || x >= self.width as f64 || y >= self.height as f64 {
            return None;
        }
        Some((x as usize, y as usize))
    }

    /// Sample grid at a position
    pub fn sample(&self, pos: Coordinate) -> Option<&T> {
        let (x, y) = self.world_to_cell(pos)?;
        self.get(x, y)
    }

    /// Cell center in world coordinates
    pub fn cell_center(&self, x: usize, y: usize) -> Coordinate {
        Coordinate::new(
            self.origin.lon + (x as f64 + 0.5) * self.cell_size,
            self.origin.lat + (y as f64 + 0.5) * self.cell_size,
        )
    }
}

#[derive(Debug, Clone)]
struct RasterLayer {
    unit: String,
    grid: Grid<f64>,
}

/// Intensity fields stored as co-registered rasters.
///
/// A position outside the raster, or a cell holding the nodata marker,
/// reads `0.0` (unit kept), the same policy as the point index.
#[derive(Debug, Clone)]
pub struct RasterIntensityIndex {
    layers: BTreeMap<String, RasterLayer>,
    nodata: Option<f64>,
}

impl RasterIntensityIndex {
    pub fn new(nodata: Option<f64>) -> Self {
        Self {
            layers: BTreeMap::new(),
            nodata,
        }
    }

    /// Add a field layer
    pub fn add_layer(
        &mut self,
        field: impl Into<String>,
        unit: impl Into<String>,
        grid: Grid<f64>,
    ) -> Result<()> {
        let field = field.into();
        if grid.width == 0 || grid.height == 0 || !(grid.cell_size > 0.0) {
            return Err(ExposureError::InvalidReference(format!(
                "raster layer {:?} has an empty extent",
                field
            )));
        }
        self.layers.insert(
            field,
            RasterLayer {
                unit: unit.into(),
                grid,
            },
        );
        Ok(())
    }

    fn is_nodata(&self, value: f64) -> bool {
        value.is_nan() || self.nodata.is_some_and(|nodata| value == nodata)
    }
}

impl IntensityProvider for RasterIntensityIndex {
    fn nearest(&self, lon: f64, lat: f64) -> IntensitySample {
        let pos = Coordinate::new(lon, lat);
        let mut sample = IntensitySample::new();
        for (field, layer) in &self.layers {
            let value = layer
                .grid
                .sample(pos)
                .copied()
                .filter(|v| !self.is_nodata(*v))
                .unwrap_or(0.0);
            sample.insert(field.clone(), value, layer.unit.clone());
        }
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_raster() -> RasterIntensityIndex {
        // 3 x 2 cells of 0.5 degrees starting at (10, 20)
        let grid = Grid::from_data(
            3,
            2,
            0.5,
            Coordinate::new(10.0, 20.0),
            vec![1.0, 2.0, -9999.0, 4.0, 5.0, 6.0],
        )
        .unwrap();
        let mut raster = RasterIntensityIndex::new(Some(-9999.0));
        raster.add_layer("MWH", "m", grid).unwrap();
        raster
    }

    #[test]
    fn test_sample_inside() {
        let raster = depth_raster();
        assert_eq!(raster.nearest(10.1, 20.1).value("MWH"), Some(1.0));
        assert_eq!(raster.nearest(10.7, 20.9).value("MWH"), Some(5.0));
        assert_eq!(raster.nearest(10.7, 20.9).unit("MWH"), Some("m"));
    }

    #[test]
    fn test_nodata_reads_zero() {
        let raster = depth_raster();
        assert_eq!(raster.nearest(11.2, 20.2).value("MWH"), Some(0.0));
    }

    #[test]
    fn test_outside_reads_zero_with_unit() {
        let raster = depth_raster();
        let sample = raster.nearest(9.0, 20.0);
        assert_eq!(sample.value("MWH"), Some(0.0));
        assert_eq!(sample.unit("MWH"), Some("m"));
        assert_eq!(raster.nearest(11.5, 20.0).value("MWH"), Some(0.0));
    }

    #[test]
    fn test_from_data_checks_size() {
        assert!(Grid::from_data(2, 2, 1.0, Coordinate::default(), vec![0.0; 3]).is_none());
    }

    #[test]
    fn test_cell_center() {
        let grid: Grid<f64> = Grid::new(2, 2, 1.0, Coordinate::new(5.0, 5.0));
        assert_eq!(grid.cell_center(1, 0), Coordinate::new(6.5, 5.5));
    }

    #[test]
    fn test_empty_layer_rejected() {
        let mut raster = RasterIntensityIndex::new(None);
        let grid: Grid<f64> = Grid::new(0, 2, 1.0, Coordinate::default());
        assert!(raster.add_layer("PGA", "g", grid).is_err());
    }
}
