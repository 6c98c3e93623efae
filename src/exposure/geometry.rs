//! Cell geometry in GeoJSON coordinate layout.
//!
//! Only the centroid is ever used; it is computed with `geo`.

use geo::Centroid;
use geo_types::{Geometry, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::core::types::Coordinate;

/// Geometry of an exposure cell, tagged like a GeoJSON geometry object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum CellGeometry {
    Point([f64; 2]),
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

impl CellGeometry {
    pub fn point(lon: f64, lat: f64) -> Self {
        CellGeometry::Point([lon, lat])
    }

    /// Convert into a `geo` geometry
    pub fn to_geo(&self) -> Geometry<f64> {
        match self {
            CellGeometry::Point([x, y]) => Geometry::Point(Point::new(*x, *y)),
            CellGeometry::Polygon(rings) => Geometry::Polygon(rings_to_polygon(rings)),
            CellGeometry::MultiPolygon(polygons) => Geometry::MultiPolygon(MultiPolygon::new(
                polygons.iter().map(|rings| rings_to_polygon(rings)).collect(),
            )),
        }
    }

    /// Centroid of the geometry; `None` for empty polygons
    pub fn centroid(&self) -> Option<Coordinate> {
        self.to_geo()
            .centroid()
            .map(|p| Coordinate::new(p.x(), p.y()))
    }
}

fn rings_to_polygon(rings: &[Vec<[f64; 2]>]) -> Polygon<f64> {
    let mut rings = rings.iter().map(|ring| LineString::from(ring.clone()));
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, rings.collect())
}
